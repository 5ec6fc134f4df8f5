//! Filesystem port used by checks, the registry and the record store.

use std::path::Path;

use super::PortError;

/// Provides filesystem access.
///
/// Step commands touch the disk through their own processes; this port only
/// covers what the engine itself reads and writes.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or is not valid UTF-8.
    fn read_to_string(&self, path: &Path) -> Result<String, PortError>;

    /// Creates a new file with `contents`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file already exists or cannot be written.
    fn create_new(&self, path: &Path, contents: &str) -> Result<(), PortError>;

    /// Returns `true` if anything exists at the path.
    fn exists(&self, path: &Path) -> bool;

    /// Returns `true` if the path is a regular file.
    fn is_file(&self, path: &Path) -> bool;

    /// Returns `true` if the path is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Lists entry names in a directory, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not a directory or cannot be read.
    fn list_dir(&self, path: &Path) -> Result<Vec<String>, PortError>;
}
