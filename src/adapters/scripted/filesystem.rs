//! In-memory filesystem.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::lock;
use crate::ports::{FileSystem, PortError};

/// Files held in memory; directories exist implicitly as path prefixes.
#[derive(Clone, Default)]
pub struct MemFileSystem {
    files: Arc<Mutex<BTreeMap<PathBuf, String>>>,
}

impl MemFileSystem {
    /// Creates an empty filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a file.
    pub fn insert(&self, path: impl Into<PathBuf>, contents: &str) {
        lock(&self.files).insert(path.into(), contents.to_string());
    }

    /// Paths of every stored file, sorted.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        lock(&self.files).keys().cloned().collect()
    }

    /// Contents of a stored file.
    #[must_use]
    pub fn contents(&self, path: &Path) -> Option<String> {
        lock(&self.files).get(path).cloned()
    }
}

impl FileSystem for MemFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, PortError> {
        self.contents(path).ok_or_else(|| format!("{}: no such file", path.display()).into())
    }

    fn create_new(&self, path: &Path, contents: &str) -> Result<(), PortError> {
        let mut files = lock(&self.files);
        if files.contains_key(path) {
            return Err(format!("{}: file exists", path.display()).into());
        }
        files.insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        lock(&self.files).contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        lock(&self.files).keys().any(|file| file != path && file.starts_with(path))
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>, PortError> {
        if !self.is_dir(path) {
            return Err(format!("{}: not a directory", path.display()).into());
        }
        let mut names: Vec<String> = lock(&self.files)
            .keys()
            .filter_map(|file| file.strip_prefix(path).ok())
            .filter_map(|rest| rest.components().next())
            .map(|first| first.as_os_str().to_string_lossy().into_owned())
            .collect();
        names.dedup();
        Ok(names)
    }
}
