//! Record store: persistence for execution records.
//!
//! Records are append-only JSON documents under the log directory:
//!
//! ```text
//! <log_dir>/
//!   └── <task>/
//!       └── <version>/
//!           └── <YYYYMMDDTHHMMSS.mmmZ>_<run_id>.json
//! ```

use std::path::{Path, PathBuf};

use crate::context::ServiceContext;
use crate::record::ExecutionRecord;

/// Persistence layer for execution records.
///
/// All I/O goes through `ctx.fs`, so the store works with live and
/// scripted adapters alike.
pub struct RecordStore<'a> {
    ctx: &'a ServiceContext,
    root: PathBuf,
}

impl<'a> RecordStore<'a> {
    /// Creates a store rooted at the log directory.
    #[must_use]
    pub fn new(ctx: &'a ServiceContext, root: &Path) -> Self {
        Self { ctx, root: root.to_path_buf() }
    }

    /// Writes a record to a new file and returns its path.
    ///
    /// Never overwrites: the run id in the file name keeps concurrent runs
    /// apart, and an existing file is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file creation fails.
    pub fn append(&self, record: &ExecutionRecord) -> Result<PathBuf, String> {
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| format!("Failed to serialize record {}: {e}", record.run_id))?;
        let path = self.record_path(record);
        self.ctx
            .fs
            .create_new(&path, &json)
            .map_err(|e| format!("Failed to write record {}: {e}", path.display()))?;
        Ok(path)
    }

    /// Loads stored records, newest first, optionally for one task only.
    ///
    /// Files that do not parse as records are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be listed.
    pub fn list(&self, task: Option<&str>) -> Result<Vec<ExecutionRecord>, String> {
        if !self.ctx.fs.is_dir(&self.root) {
            return Ok(Vec::new());
        }
        let tasks = match task {
            Some(task) => vec![task.to_string()],
            None => self.entries(&self.root)?,
        };
        let mut records = Vec::new();
        for task in tasks {
            let task_dir = self.root.join(&task);
            if !self.ctx.fs.is_dir(&task_dir) {
                continue;
            }
            for version in self.entries(&task_dir)? {
                let version_dir = task_dir.join(version);
                for file in self.entries(&version_dir)? {
                    if !file.ends_with(".json") {
                        continue;
                    }
                    let path = version_dir.join(file);
                    match self.read(&path) {
                        Ok(record) => records.push(record),
                        Err(e) => {
                            tracing::warn!(path = %path.display(), error = %e, "skipping record");
                        }
                    }
                }
            }
        }
        records.sort_by(|a, b| {
            b.started_at.cmp(&a.started_at).then_with(|| b.run_id.cmp(&a.run_id))
        });
        Ok(records)
    }

    fn read(&self, path: &Path) -> Result<ExecutionRecord, String> {
        let contents = self.ctx.fs.read_to_string(path).map_err(|e| e.to_string())?;
        serde_json::from_str(&contents).map_err(|e| e.to_string())
    }

    fn entries(&self, dir: &Path) -> Result<Vec<String>, String> {
        self.ctx
            .fs
            .list_dir(dir)
            .map_err(|e| format!("Failed to list {}: {e}", dir.display()))
    }

    fn record_path(&self, record: &ExecutionRecord) -> PathBuf {
        let stamp = record.started_at.format("%Y%m%dT%H%M%S%.3fZ");
        self.root
            .join(&record.task)
            .join(&record.version)
            .join(format!("{stamp}_{}.json", record.run_id))
    }
}
