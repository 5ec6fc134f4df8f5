//! Human approval port for checkpoints and autonomy gating.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::PortError;

/// Boxed future returned by [`ApprovalChannel::request`].
pub type ApprovalFuture<'a> = Pin<Box<dyn Future<Output = Result<Approval, PortError>> + Send + 'a>>;

/// Why approval is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalReason {
    /// A checkpoint step.
    Checkpoint,
    /// `assistant` autonomy gates every step.
    ConfirmEach,
    /// `copilot` autonomy gates a step flagged `major`.
    ConfirmMajor,
}

impl fmt::Display for ApprovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Checkpoint => "checkpoint",
            Self::ConfirmEach => "confirm each step",
            Self::ConfirmMajor => "major step",
        })
    }
}

/// What the approver is asked about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Task name.
    pub task: String,
    /// Step awaiting approval.
    pub step_id: String,
    /// Resolved message (checkpoint text or step description).
    pub message: String,
    /// Why the request was raised.
    pub reason: ApprovalReason,
}

/// The approver's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "response", rename_all = "snake_case")]
pub enum Approval {
    /// Continue.
    Approve,
    /// Abort the run at this step.
    Reject {
        /// Optional explanation.
        #[serde(default)]
        reason: Option<String>,
    },
    /// Replace some inputs and re-enter the step.
    Modify {
        /// New input values, merged over the current ones.
        inputs: Map<String, Value>,
    },
}

/// Delivers approval requests to a human and awaits the answer.
///
/// Awaiting has no timeout; other runs keep progressing while one waits.
pub trait ApprovalChannel: Send + Sync {
    /// Asks for approval.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is closed or the answer is unreadable.
    fn request(&self, request: &ApprovalRequest) -> ApprovalFuture<'_>;
}
