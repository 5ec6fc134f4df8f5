//! Rollback action type.

use std::time::Duration;

/// Timeout applied to a rollback action when the definition names none.
pub const DEFAULT_ROLLBACK_TIMEOUT: Duration = Duration::from_secs(60);

/// A cleanup command run after a failed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackAction {
    /// Identifier, unique among rollback actions.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Command template run with `sh -c`.
    pub cmd: String,
    /// Working directory template, relative to the workspace.
    pub working_dir: Option<String>,
    /// Maximum wall-clock time for the command.
    pub timeout: Duration,
    /// When set, the action only runs if this step completed successfully.
    pub undoes: Option<String>,
}
