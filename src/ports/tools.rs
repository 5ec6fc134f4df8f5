//! External tool port for `external_call` steps.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::PortError;

/// Boxed future returned by [`ExternalTools::invoke`].
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<ToolResult, PortError>> + Send + 'a>>;

/// A resolved tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool name.
    pub tool: String,
    /// Resolved arguments.
    pub args: BTreeMap<String, String>,
}

/// What a tool reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool considers the call successful.
    pub success: bool,
    /// Tool output, stored as the step's `output`.
    #[serde(default)]
    pub output: Value,
}

/// Invokes named external tools.
pub trait ExternalTools: Send + Sync {
    /// Calls a tool.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown tools or transport failures.
    fn invoke(&self, call: &ToolCall) -> ToolFuture<'_>;
}
