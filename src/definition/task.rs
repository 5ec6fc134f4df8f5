//! Top-level task definition type.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::check::Check;
use super::input::InputSpec;
use super::rollback::RollbackAction;
use super::step::Step;
use crate::loader::document::TaskDocument;

/// How often the approval channel is consulted during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Autonomy {
    /// Only explicit checkpoint steps ask for approval.
    #[serde(rename = "delegated")]
    Autonomous,
    /// Checkpoints plus every step flagged `major`.
    #[serde(rename = "copilot")]
    ConfirmMajor,
    /// Checkpoints plus every other step.
    #[serde(rename = "assistant")]
    ConfirmEach,
}

impl Autonomy {
    /// The canonical wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Autonomous => "delegated",
            Self::ConfirmMajor => "copilot",
            Self::ConfirmEach => "assistant",
        }
    }
}

impl fmt::Display for Autonomy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Autonomy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delegated" | "delegado" => Ok(Self::Autonomous),
            "copilot" | "co-pilot" => Ok(Self::ConfirmMajor),
            "assistant" | "asistente" => Ok(Self::ConfirmEach),
            other => Err(format!(
                "unknown autonomy level `{other}`, expected one of delegated, copilot, assistant"
            )),
        }
    }
}

/// A validated skill definition.
///
/// Produced only by [`crate::loader`]; immutable afterwards and safe to share
/// across concurrent runs. Serializes back to the same document format the
/// loader accepts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "TaskDocument")]
pub struct TaskDefinition {
    /// Unique skill name (also its directory name in the registry).
    pub name: String,
    /// Semantic version string.
    pub version: String,
    /// Human-readable description.
    pub description: String,
    /// Approval policy.
    pub autonomy: Autonomy,
    /// External documentation references; carried through, never interpreted.
    pub context_refs: Vec<String>,
    /// Environment assertions evaluated before any step.
    pub preconditions: Vec<Check>,
    /// Declared inputs by name.
    pub inputs: BTreeMap<String, InputSpec>,
    /// Ordered steps; never empty.
    pub steps: Vec<Step>,
    /// Postconditions evaluated after all steps succeed.
    pub verification: Vec<Check>,
    /// Cleanup actions, run in reverse order on failure.
    pub rollback: Vec<RollbackAction>,
    /// Free-form metadata.
    pub metadata: Map<String, Value>,
}

impl TaskDefinition {
    /// Looks up a step by identifier.
    #[must_use]
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|step| step.id == id)
    }
}
