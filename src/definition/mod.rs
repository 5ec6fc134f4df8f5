//! Typed model of a skill definition.
//!
//! These types are produced by [`crate::loader`] after validation and are
//! never constructed from untrusted input directly. Serializing any of them
//! yields the document format the loader reads.

mod check;
mod input;
mod rollback;
mod step;
mod task;

pub use check::{Check, CheckKind, CHECK_KINDS};
pub use input::{InputSpec, InputType};
pub use rollback::{RollbackAction, DEFAULT_ROLLBACK_TIMEOUT};
pub use step::{
    CheckpointStep, DecisionStep, ExecutionLimits, ExternalCallStep, ScriptedStep, ShellStep,
    Step, StepKind, StepKindName, DEFAULT_INTERPRETER, DEFAULT_STEP_TIMEOUT,
};
pub use task::{Autonomy, TaskDefinition};
