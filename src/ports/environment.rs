//! Environment port: variables and executable lookup.

use std::path::PathBuf;

/// Read-only view of the process environment.
pub trait Environment: Send + Sync {
    /// Returns the value of an environment variable, if set.
    fn var(&self, name: &str) -> Option<String>;

    /// Locates an executable on `PATH`.
    fn find_executable(&self, name: &str) -> Option<PathBuf>;
}
