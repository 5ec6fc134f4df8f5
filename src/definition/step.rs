//! Step types: a closed set of kinds, each with only its own payload.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timeout applied to a step when the definition names none.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(300);

/// Interpreter used for scripted steps when none is named.
pub const DEFAULT_INTERPRETER: &str = "python3";

/// Time budget and retry policy for steps that run against a collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Maximum wall-clock time per attempt; always positive.
    pub timeout: Duration,
    /// Extra attempts after the first failure.
    pub retry: u32,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self { timeout: DEFAULT_STEP_TIMEOUT, retry: 0 }
    }
}

/// A shell command step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellStep {
    /// Command template run with `sh -c`.
    pub cmd: String,
    /// Exit code that counts as success.
    pub expect_exit: i32,
    /// Working directory template, relative to the workspace.
    pub working_dir: Option<String>,
    /// Extra environment variables (values are templates).
    pub env: BTreeMap<String, String>,
    /// Timeout and retry policy.
    pub limits: ExecutionLimits,
}

/// A code payload handed to an interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedStep {
    /// Code template passed as `<interpreter> -c <code>`.
    pub code: String,
    /// Interpreter executable.
    pub interpreter: String,
    /// Working directory template, relative to the workspace.
    pub working_dir: Option<String>,
    /// Extra environment variables (values are templates).
    pub env: BTreeMap<String, String>,
    /// Timeout and retry policy.
    pub limits: ExecutionLimits,
}

/// A decision supplied by the orchestrating caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionStep {
    /// Prompt template describing what must be decided.
    pub prompt: String,
    /// Allowed outcomes; empty means any value.
    pub options: Vec<String>,
    /// Timeout and retry policy.
    pub limits: ExecutionLimits,
}

/// A human approval gate. Blocks until answered; has no timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointStep {
    /// Message template shown to the approver.
    pub message: String,
}

/// A call to a named external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCallStep {
    /// Tool name as known to the tool port.
    pub tool: String,
    /// Arguments; values are templates.
    pub args: BTreeMap<String, String>,
    /// Timeout and retry policy.
    pub limits: ExecutionLimits,
}

/// Kind-specific step payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    /// Run a shell command.
    Shell(ShellStep),
    /// Run code in an interpreter.
    Scripted(ScriptedStep),
    /// Ask the caller for a decision.
    AgentDecision(DecisionStep),
    /// Wait for human approval.
    Checkpoint(CheckpointStep),
    /// Invoke an external tool.
    ExternalCall(ExternalCallStep),
}

/// Wire name of a step kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKindName {
    /// `shell` (alias `bash`).
    Shell,
    /// `scripted` (alias `python`).
    Scripted,
    /// `agent_decision` (alias `agent`).
    AgentDecision,
    /// `checkpoint`.
    Checkpoint,
    /// `external_call` (alias `mcp`).
    ExternalCall,
}

impl StepKindName {
    /// Parses a wire name or one of its aliases.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "shell" | "bash" => Some(Self::Shell),
            "scripted" | "python" => Some(Self::Scripted),
            "agent_decision" | "agent" => Some(Self::AgentDecision),
            "checkpoint" => Some(Self::Checkpoint),
            "external_call" | "mcp" => Some(Self::ExternalCall),
            _ => None,
        }
    }

    /// The canonical wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shell => "shell",
            Self::Scripted => "scripted",
            Self::AgentDecision => "agent_decision",
            Self::Checkpoint => "checkpoint",
            Self::ExternalCall => "external_call",
        }
    }
}

impl fmt::Display for StepKindName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a task definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Identifier, unique within the definition.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Whether `copilot` autonomy asks for approval before this step.
    pub major: bool,
    /// Kind-specific payload.
    pub kind: StepKind,
}

impl Step {
    /// The wire name of this step's kind.
    #[must_use]
    pub fn kind_name(&self) -> StepKindName {
        match &self.kind {
            StepKind::Shell(_) => StepKindName::Shell,
            StepKind::Scripted(_) => StepKindName::Scripted,
            StepKind::AgentDecision(_) => StepKindName::AgentDecision,
            StepKind::Checkpoint(_) => StepKindName::Checkpoint,
            StepKind::ExternalCall(_) => StepKindName::ExternalCall,
        }
    }

    /// Timeout and retry policy; `None` for checkpoints.
    #[must_use]
    pub fn limits(&self) -> Option<&ExecutionLimits> {
        match &self.kind {
            StepKind::Shell(s) => Some(&s.limits),
            StepKind::Scripted(s) => Some(&s.limits),
            StepKind::AgentDecision(s) => Some(&s.limits),
            StepKind::ExternalCall(s) => Some(&s.limits),
            StepKind::Checkpoint(_) => None,
        }
    }

    /// Every template string carried by this step, keyed by its field path.
    #[must_use]
    pub fn templates(&self) -> Vec<(String, &str)> {
        let mut out: Vec<(String, &str)> = Vec::new();
        match &self.kind {
            StepKind::Shell(s) => {
                out.push(("cmd".into(), &s.cmd));
                if let Some(dir) = &s.working_dir {
                    out.push(("working_dir".into(), dir));
                }
                push_map(&mut out, "env", &s.env);
            }
            StepKind::Scripted(s) => {
                out.push(("code".into(), &s.code));
                if let Some(dir) = &s.working_dir {
                    out.push(("working_dir".into(), dir));
                }
                push_map(&mut out, "env", &s.env);
            }
            StepKind::AgentDecision(s) => out.push(("prompt".into(), &s.prompt)),
            StepKind::Checkpoint(s) => out.push(("message".into(), &s.message)),
            StepKind::ExternalCall(s) => push_map(&mut out, "args", &s.args),
        }
        out
    }
}

fn push_map<'a>(out: &mut Vec<(String, &'a str)>, field: &str, map: &'a BTreeMap<String, String>) {
    for (key, value) in map {
        out.push((format!("{field}.{key}"), value.as_str()));
    }
}
