//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the run engine and an external
//! collaborator (time, filesystem, processes, environment, approvals,
//! decisions, tools, IDs). Implementations live in `src/adapters/`.

pub mod approval;
pub mod clock;
pub mod decision;
pub mod environment;
pub mod filesystem;
pub mod id_gen;
pub mod shell;
pub mod tools;

pub use approval::{Approval, ApprovalChannel, ApprovalFuture, ApprovalReason, ApprovalRequest};
pub use clock::Clock;
pub use decision::{DecisionFuture, DecisionRequest, DecisionResolver};
pub use environment::Environment;
pub use filesystem::FileSystem;
pub use id_gen::IdGenerator;
pub use shell::{CommandRequest, ShellExecutor, ShellFuture, ShellOutput};
pub use tools::{ExternalTools, ToolCall, ToolFuture, ToolResult};

/// Error type returned across every port boundary.
pub type PortError = Box<dyn std::error::Error + Send + Sync>;
