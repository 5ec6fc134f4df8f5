//! Process execution port for shell and scripted steps.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use super::PortError;

/// Boxed future returned by [`ShellExecutor::run`].
pub type ShellFuture<'a> = Pin<Box<dyn Future<Output = Result<ShellOutput, PortError>> + Send + 'a>>;

/// A fully resolved process invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Executable to spawn.
    pub program: String,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Working directory; inherits the caller's when `None`.
    pub working_dir: Option<PathBuf>,
    /// Extra environment variables.
    pub env: BTreeMap<String, String>,
}

impl CommandRequest {
    /// `sh -c <cmd>`.
    #[must_use]
    pub fn shell(cmd: &str) -> Self {
        Self::script("sh", cmd)
    }

    /// `<interpreter> -c <code>`.
    #[must_use]
    pub fn script(interpreter: &str, code: &str) -> Self {
        Self {
            program: interpreter.to_string(),
            args: vec!["-c".to_string(), code.to_string()],
            working_dir: None,
            env: BTreeMap::new(),
        }
    }

    /// Sets the working directory.
    #[must_use]
    pub fn in_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    /// Adds environment variables.
    #[must_use]
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env.extend(env);
        self
    }

    /// The code or command text, for matching and display.
    #[must_use]
    pub fn payload(&self) -> &str {
        self.args.last().map_or("", String::as_str)
    }
}

/// The output of a finished process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellOutput {
    /// The exit code of the process; `-1` when killed by a signal.
    pub exit_code: i32,
    /// The captured standard output.
    pub stdout: String,
    /// The captured standard error.
    pub stderr: String,
}

/// Runs processes.
///
/// Dropping the returned future must terminate the child process; the
/// engine enforces step timeouts by dropping it.
pub trait ShellExecutor: Send + Sync {
    /// Spawns the command and waits for it to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned.
    fn run(&self, request: &CommandRequest) -> ShellFuture<'_>;
}
