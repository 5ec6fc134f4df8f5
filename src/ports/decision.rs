//! Decision port for agent-decision steps.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::PortError;

/// Boxed future returned by [`DecisionResolver::decide`].
pub type DecisionFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, PortError>> + Send + 'a>>;

/// A decision the orchestrating caller must supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRequest {
    /// Task name.
    pub task: String,
    /// Step asking.
    pub step_id: String,
    /// Resolved prompt.
    pub prompt: String,
    /// Allowed outcomes; empty means unconstrained.
    pub options: Vec<String>,
}

/// Supplies decisions. The engine records them and never judges them.
pub trait DecisionResolver: Send + Sync {
    /// Returns the decision value for the request.
    ///
    /// # Errors
    ///
    /// Returns an error if no decision can be produced.
    fn decide(&self, request: &DecisionRequest) -> DecisionFuture<'_>;
}
