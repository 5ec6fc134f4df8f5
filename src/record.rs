//! Execution records: the persisted account of one run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::definition::{Autonomy, StepKindName};

/// Captured stdout/stderr longer than this many characters is truncated.
pub const OUTPUT_LIMIT: usize = 4000;

/// Replacement for secret input values.
pub const REDACTED: &str = "[REDACTED]";

/// Key fragments that mark an input as secret.
const SECRET_KEYS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "token",
    "api_key",
    "apikey",
    "api-key",
    "private_key",
    "privatekey",
    "auth",
    "credential",
    "access_key",
    "bearer",
    "jwt",
    "session",
];

/// How a step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Completed as expected.
    Succeeded,
    /// Unexpected exit code, collaborator error, or bad decision.
    Failed,
    /// Exceeded its timeout on the final attempt.
    TimedOut,
    /// A human rejected it.
    Rejected,
}

/// The captured result of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Step identifier.
    pub step_id: String,
    /// Step kind.
    pub kind: StepKindName,
    /// Outcome.
    pub status: StepStatus,
    /// Exit code for process-backed steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Captured standard output.
    #[serde(default)]
    pub stdout: String,
    /// Captured standard error.
    #[serde(default)]
    pub stderr: String,
    /// Structured output: a decision, a tool result, or a checkpoint answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Diagnostic for any non-success status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the first attempt started.
    pub started_at: DateTime<Utc>,
    /// Wall time across all attempts.
    pub duration_ms: u64,
    /// Attempts made, at least one.
    pub attempts: u32,
}

impl StepResult {
    /// Whether the step counts as completed.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == StepStatus::Succeeded
    }

    /// Copy with stdout, stderr and textual output cut to [`OUTPUT_LIMIT`] characters.
    #[must_use]
    pub fn truncated(&self) -> Self {
        let output = match &self.output {
            Some(Value::String(text)) => Some(Value::String(truncate(text))),
            other => other.clone(),
        };
        Self {
            stdout: truncate(&self.stdout),
            stderr: truncate(&self.stderr),
            output,
            ..self.clone()
        }
    }
}

/// Result of one precondition or verification check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    /// The check as written, e.g. `file_exists out/report.json`.
    pub check: String,
    /// Whether it held.
    pub passed: bool,
    /// What was observed.
    pub message: String,
}

/// How a rollback action ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackStatus {
    /// The command exited 0.
    Succeeded,
    /// The command failed, timed out, or could not be rendered.
    Failed,
    /// The step it undoes never completed.
    Skipped,
}

/// Result of one rollback action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackOutcome {
    /// Action identifier.
    pub id: String,
    /// Outcome.
    pub status: RollbackStatus,
    /// Process exit code, when the command ran to completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Diagnostic for failed or skipped actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Wall time.
    pub duration_ms: u64,
}

/// Category of a run failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Inputs did not satisfy their declarations.
    Input,
    /// A placeholder could not be resolved.
    Template,
    /// A precondition did not hold.
    Precondition,
    /// A step failed or was rejected.
    Step,
    /// A step exceeded its timeout.
    Timeout,
    /// One or more verification checks failed.
    Verification,
}

/// Why a run failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    /// Category.
    pub kind: FailureKind,
    /// Failing step, for step and timeout failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// Failing check, for precondition failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
    /// Diagnostic.
    pub message: String,
}

/// One run, as persisted. Never modified after it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Unique run id.
    pub run_id: String,
    /// Run start.
    pub started_at: DateTime<Utc>,
    /// Run end, after rollback.
    pub finished_at: DateTime<Utc>,
    /// Task name.
    pub task: String,
    /// Task version.
    pub version: String,
    /// Autonomy level in effect.
    pub autonomy: Autonomy,
    /// Resolved inputs with secrets redacted.
    pub inputs: Map<String, Value>,
    /// Per-step results, in execution order, including the failing step.
    pub steps: Vec<StepResult>,
    /// Per-check verification outcomes.
    #[serde(default)]
    pub verification: Vec<CheckOutcome>,
    /// Whether every step and check succeeded.
    pub success: bool,
    /// Root cause of a failed run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    /// Whether rollback ran.
    pub rollback_triggered: bool,
    /// Per-action rollback outcomes, in the order they were attempted.
    #[serde(default)]
    pub rollback: Vec<RollbackOutcome>,
    /// Whether no rollback action failed.
    pub rollback_clean: bool,
    /// Wall time of the whole run.
    pub total_duration_ms: u64,
}

/// Replaces values of secret-looking keys, recursing into nested objects.
#[must_use]
pub fn redact(inputs: &Map<String, Value>) -> Map<String, Value> {
    inputs
        .iter()
        .map(|(key, value)| {
            let lower = key.to_ascii_lowercase();
            let value = if SECRET_KEYS.iter().any(|secret| lower.contains(secret)) {
                Value::String(REDACTED.to_string())
            } else if let Value::Object(nested) = value {
                Value::Object(redact(nested))
            } else {
                value.clone()
            };
            (key.clone(), value)
        })
        .collect()
}

/// Cuts `text` to [`OUTPUT_LIMIT`] characters, marking the cut.
#[must_use]
pub fn truncate(text: &str) -> String {
    match text.char_indices().nth(OUTPUT_LIMIT) {
        Some((at, _)) => format!("{}\n... (output truncated)", &text[..at]),
        None => text.to_string(),
    }
}
