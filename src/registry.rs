//! Skill discovery under the skills directory.
//!
//! Each skill lives in its own directory, named after the skill:
//!
//! ```text
//! <skills_dir>/
//!   └── <name>/
//!       └── skill.json | skill.yaml | skill.yml
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::context::ServiceContext;
use crate::definition::TaskDefinition;
use crate::loader::{self, Format, SchemaError};

/// File names probed in a skill directory, in order.
pub const DEFINITION_FILES: &[&str] = &["skill.json", "skill.yaml", "skill.yml"];

/// Errors raised while locating or loading a skill.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No definition file for the name.
    #[error("skill `{name}` not found in {}", .dir.display())]
    NotFound {
        /// Requested skill name.
        name: String,
        /// Skills directory searched.
        dir: PathBuf,
    },
    /// The definition file exists but cannot be read.
    #[error("cannot read {}: {message}", .path.display())]
    Read {
        /// Definition file.
        path: PathBuf,
        /// Underlying error.
        message: String,
    },
    /// The definition failed validation.
    #[error("{}: {source}", .path.display())]
    Schema {
        /// Definition file.
        path: PathBuf,
        /// Validation error.
        #[source]
        source: SchemaError,
    },
    /// The definition's name differs from its directory.
    #[error("{}: skill is named `{name}` but lives in directory `{dir}`", .path.display())]
    NameMismatch {
        /// Definition file.
        path: PathBuf,
        /// Directory name.
        dir: String,
        /// Name inside the document.
        name: String,
    },
}

/// A discovered skill: its directory name, file and load result.
#[derive(Debug)]
pub struct Discovered {
    /// Directory name.
    pub name: String,
    /// Definition file.
    pub path: PathBuf,
    /// The validated definition, or why it is invalid.
    pub definition: Result<TaskDefinition, RegistryError>,
}

/// Reads skill definitions through the filesystem port.
pub struct Registry<'a> {
    ctx: &'a ServiceContext,
    root: PathBuf,
}

impl<'a> Registry<'a> {
    /// Creates a registry over a skills directory.
    #[must_use]
    pub fn new(ctx: &'a ServiceContext, root: &Path) -> Self {
        Self { ctx, root: root.to_path_buf() }
    }

    /// Every skill directory holding a definition file, sorted by name.
    ///
    /// Invalid definitions are included with their error; directories
    /// without a definition file are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the skills directory exists but cannot be listed.
    pub fn discover(&self) -> Result<Vec<Discovered>, RegistryError> {
        if !self.ctx.fs.is_dir(&self.root) {
            return Ok(Vec::new());
        }
        let names = self.ctx.fs.list_dir(&self.root).map_err(|e| RegistryError::Read {
            path: self.root.clone(),
            message: e.to_string(),
        })?;
        Ok(names
            .into_iter()
            .filter_map(|name| {
                let path = self.definition_file(&name)?;
                let definition = self.load_file(&name, &path);
                Some(Discovered { name, path, definition })
            })
            .collect())
    }

    /// Loads one skill by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the skill is missing, unreadable, or invalid.
    pub fn load(&self, name: &str) -> Result<(TaskDefinition, PathBuf), RegistryError> {
        let path = self.definition_file(name).ok_or_else(|| RegistryError::NotFound {
            name: name.to_string(),
            dir: self.root.clone(),
        })?;
        let definition = self.load_file(name, &path)?;
        Ok((definition, path))
    }

    fn definition_file(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return None;
        }
        let dir = self.root.join(name);
        DEFINITION_FILES.iter().map(|file| dir.join(file)).find(|path| self.ctx.fs.is_file(path))
    }

    fn load_file(&self, dir: &str, path: &Path) -> Result<TaskDefinition, RegistryError> {
        let text = self.ctx.fs.read_to_string(path).map_err(|e| RegistryError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let definition = loader::load_str(&text, Format::from_path(path))
            .map_err(|source| RegistryError::Schema { path: path.to_path_buf(), source })?;
        if definition.name != dir {
            return Err(RegistryError::NameMismatch {
                path: path.to_path_buf(),
                dir: dir.to_string(),
                name: definition.name,
            });
        }
        tracing::debug!(skill = %definition.name, path = %path.display(), "skill loaded");
        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::scripted::MemFileSystem;

    const BUILD: &str = r#"{
        "name": "build",
        "version": "1.0.0",
        "description": "Build the project",
        "autonomy": "delegated",
        "steps": [{"id": "make", "type": "shell", "cmd": "make"}]
    }"#;

    const LINT_YAML: &str = "name: lint\nversion: 0.2.0\nautonomy: copilot\nsteps:\n  - id: run\n    type: shell\n    cmd: cargo clippy\n";

    fn registry_fs() -> MemFileSystem {
        let fs = MemFileSystem::new();
        fs.insert("/skills/build/skill.json", BUILD);
        fs.insert("/skills/lint/skill.yaml", LINT_YAML);
        fs.insert("/skills/broken/skill.json", r#"{"name": "broken"}"#);
        fs.insert("/skills/renamed/skill.json", BUILD);
        fs.insert("/skills/notes/README.md", "not a skill");
        fs
    }

    #[test]
    fn discover_reports_valid_and_invalid_skills() {
        let ctx = ServiceContext { fs: Box::new(registry_fs()), ..ServiceContext::scripted() };
        let found = Registry::new(&ctx, Path::new("/skills")).discover().unwrap();

        let names: Vec<_> = found.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["broken", "build", "lint", "renamed"]);
        assert!(matches!(found[0].definition, Err(RegistryError::Schema { .. })));
        assert_eq!(found[1].definition.as_ref().unwrap().version, "1.0.0");
        assert_eq!(found[2].definition.as_ref().unwrap().steps.len(), 1);
        assert!(matches!(found[3].definition, Err(RegistryError::NameMismatch { .. })));
    }

    #[test]
    fn load_by_name() {
        let ctx = ServiceContext { fs: Box::new(registry_fs()), ..ServiceContext::scripted() };
        let registry = Registry::new(&ctx, Path::new("/skills"));

        let (def, path) = registry.load("lint").unwrap();
        assert_eq!(def.name, "lint");
        assert_eq!(path, PathBuf::from("/skills/lint/skill.yaml"));
        assert!(matches!(registry.load("deploy"), Err(RegistryError::NotFound { .. })));
        assert!(matches!(registry.load("../build"), Err(RegistryError::NotFound { .. })));
    }

    #[test]
    fn missing_skills_dir_is_empty() {
        let ctx = ServiceContext::scripted();
        assert!(Registry::new(&ctx, Path::new("/none")).discover().unwrap().is_empty());
    }
}
