//! CLI-facing error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::RunFailure;
use crate::registry::RegistryError;

/// Anything that ends a command with a non-zero exit code.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad command-line usage.
    #[error("{0}")]
    Usage(String),
    /// `skillrun.yaml` could not be used.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A skill could not be found or loaded.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// A JSON command-line argument did not parse.
    #[error("invalid {flag}: {source}")]
    Json {
        /// The flag that carried the JSON.
        flag: &'static str,
        /// Parse error.
        #[source]
        source: serde_json::Error,
    },
    /// The run failed; the record has already been written.
    #[error(transparent)]
    Run(#[from] RunFailure),
    /// Reading records or preparing the runtime failed.
    #[error("{0}")]
    Io(String),
}

impl Error {
    /// Process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Run(failure) => failure.exit_code(),
            _ => 1,
        }
    }
}
