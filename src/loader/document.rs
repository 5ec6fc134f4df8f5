//! Wire-format documents for skill definitions.
//!
//! Element documents are loose on purpose: every kind-specific field is
//! optional here, and [`super::load_value`] decides which fields a given
//! kind requires or forbids so that errors can name the exact field path.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::definition::{Check, InputSpec, RollbackAction, Step, StepKind, TaskDefinition};

/// A whole skill definition as written on disk.
#[derive(Debug, Clone, Serialize)]
pub struct TaskDocument {
    /// Skill name.
    pub name: String,
    /// Semantic version.
    pub version: String,
    /// Description.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Autonomy wire name.
    pub autonomy: String,
    /// Opaque documentation references.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub context_refs: Vec<String>,
    /// Preconditions.
    pub preconditions: Vec<PreconditionDocument>,
    /// Declared inputs.
    pub inputs: BTreeMap<String, InputSpec>,
    /// Steps.
    pub steps: Vec<StepDocument>,
    /// Verification checks.
    pub verification: Vec<VerificationDocument>,
    /// Rollback actions.
    pub rollback: Vec<RollbackDocument>,
    /// Free-form metadata.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// A step entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(missing_docs)]
pub struct StepDocument {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<u32>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub major: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_exit: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<BTreeMap<String, String>>,
}

impl StepDocument {
    /// Names of the kind-specific fields that are present.
    #[must_use]
    pub fn present_payload_fields(&self) -> Vec<&'static str> {
        [
            ("timeout", self.timeout.is_some()),
            ("retry", self.retry.is_some()),
            ("cmd", self.cmd.is_some()),
            ("expect_exit", self.expect_exit.is_some()),
            ("working_dir", self.working_dir.is_some()),
            ("env", self.env.is_some()),
            ("code", self.code.is_some()),
            ("interpreter", self.interpreter.is_some()),
            ("prompt", self.prompt.is_some()),
            ("options", self.options.is_some()),
            ("message", self.message.is_some()),
            ("tool", self.tool.is_some()),
            ("args", self.args.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect()
    }
}

/// A precondition entry: `{check, args, expect?, error_message?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(missing_docs)]
pub struct PreconditionDocument {
    pub check: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// A verification entry: `{type, args, expect?, error_message?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(missing_docs)]
pub struct VerificationDocument {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// A rollback entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(missing_docs)]
pub struct RollbackDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undoes: Option<String>,
}

impl From<TaskDefinition> for TaskDocument {
    fn from(def: TaskDefinition) -> Self {
        Self {
            name: def.name,
            version: def.version,
            description: def.description,
            autonomy: def.autonomy.as_str().to_string(),
            context_refs: def.context_refs,
            preconditions: def.preconditions.iter().map(PreconditionDocument::from).collect(),
            inputs: def.inputs,
            steps: def.steps.iter().map(StepDocument::from).collect(),
            verification: def.verification.iter().map(VerificationDocument::from).collect(),
            rollback: def.rollback.iter().map(RollbackDocument::from).collect(),
            metadata: def.metadata,
        }
    }
}

impl From<&Step> for StepDocument {
    fn from(step: &Step) -> Self {
        let mut doc = Self {
            id: step.id.clone(),
            kind: step.kind_name().as_str().to_string(),
            description: step.description.clone(),
            major: step.major,
            ..Self::default()
        };
        if let Some(limits) = step.limits() {
            doc.timeout = Some(limits.timeout.as_secs_f64());
            doc.retry = Some(limits.retry);
        }
        match &step.kind {
            StepKind::Shell(s) => {
                doc.cmd = Some(s.cmd.clone());
                doc.expect_exit = Some(s.expect_exit);
                doc.working_dir.clone_from(&s.working_dir);
                doc.env = (!s.env.is_empty()).then(|| s.env.clone());
            }
            StepKind::Scripted(s) => {
                doc.code = Some(s.code.clone());
                doc.interpreter = Some(s.interpreter.clone());
                doc.working_dir.clone_from(&s.working_dir);
                doc.env = (!s.env.is_empty()).then(|| s.env.clone());
            }
            StepKind::AgentDecision(s) => {
                doc.prompt = Some(s.prompt.clone());
                doc.options = (!s.options.is_empty()).then(|| s.options.clone());
            }
            StepKind::Checkpoint(s) => doc.message = Some(s.message.clone()),
            StepKind::ExternalCall(s) => {
                doc.tool = Some(s.tool.clone());
                doc.args = Some(s.args.clone());
            }
        }
        doc
    }
}

impl From<&Check> for PreconditionDocument {
    fn from(check: &Check) -> Self {
        Self {
            check: check.kind.name().to_string(),
            args: check.kind.args().into_iter().map(String::from).collect(),
            expect: check.kind.expect(),
            error_message: check.error_message.clone(),
        }
    }
}

impl From<&Check> for VerificationDocument {
    fn from(check: &Check) -> Self {
        Self {
            kind: check.kind.name().to_string(),
            args: check.kind.args().into_iter().map(String::from).collect(),
            expect: check.kind.expect(),
            error_message: check.error_message.clone(),
        }
    }
}

impl From<&RollbackAction> for RollbackDocument {
    fn from(action: &RollbackAction) -> Self {
        Self {
            id: action.id.clone(),
            description: action.description.clone(),
            cmd: action.cmd.clone(),
            working_dir: action.working_dir.clone(),
            timeout: Some(action.timeout.as_secs_f64()),
            undoes: action.undoes.clone(),
        }
    }
}
