//! Dry-run plans: every step resolved against inputs, nothing executed.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use super::context::PlanScope;
use super::{contained, RunFailure};
use crate::definition::{Autonomy, Step, StepKind, StepKindName, TaskDefinition};
use crate::record::{redact, CheckOutcome};
use crate::template::{references, render, Reference};

/// What a run would do, as far as it can be known before it starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DryRunPlan {
    /// Task name.
    pub task: String,
    /// Task version.
    pub version: String,
    /// Autonomy level in effect.
    pub autonomy: Autonomy,
    /// Resolved inputs with secrets redacted.
    pub inputs: Map<String, Value>,
    /// Preconditions evaluated without starting a process.
    pub preconditions: Vec<CheckOutcome>,
    /// Preconditions that run a command and were not evaluated.
    pub skipped_preconditions: Vec<String>,
    /// Steps in execution order.
    pub steps: Vec<PlannedStep>,
}

/// One step with its templates resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedStep {
    /// Step identifier.
    pub id: String,
    /// Step kind.
    #[serde(rename = "type")]
    pub kind: StepKindName,
    /// Description.
    pub description: String,
    /// Whether the step is flagged major.
    pub major: bool,
    /// Per-attempt timeout in seconds; absent for checkpoints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<f64>,
    /// Extra attempts after a failure; absent for checkpoints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<u32>,
    /// Kind-specific fields with inputs substituted.
    pub resolved: BTreeMap<String, Value>,
    /// Step references that only resolve at run time.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deferred: Vec<String>,
}

pub(super) fn build(
    def: &TaskDefinition,
    inputs: &Map<String, Value>,
    workspace: &Path,
    preconditions: Vec<CheckOutcome>,
    skipped_preconditions: Vec<String>,
) -> Result<DryRunPlan, RunFailure> {
    let steps = def
        .steps
        .iter()
        .enumerate()
        .map(|(i, step)| plan_step(i, step, inputs, workspace))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DryRunPlan {
        task: def.name.clone(),
        version: def.version.clone(),
        autonomy: def.autonomy,
        inputs: redact(inputs),
        preconditions,
        skipped_preconditions,
        steps,
    })
}

fn plan_step(
    index: usize,
    step: &Step,
    inputs: &Map<String, Value>,
    workspace: &Path,
) -> Result<PlannedStep, RunFailure> {
    let scope = PlanScope::new(inputs);
    let mut resolved = BTreeMap::new();
    let mut deferred = Vec::new();
    for (field, text) in step.templates() {
        let location = format!("steps[{index}].{field}");
        let failure =
            |message: String| RunFailure::Template { location: location.clone(), message };
        let mut value = render(text, &scope).map_err(|e| failure(e.to_string()))?;
        if field == "working_dir" && !value.contains("{{") {
            value = contained(workspace, &value).map_err(failure)?.display().to_string();
        }
        for reference in references(text).map_err(|e| failure(e.to_string()))? {
            if matches!(reference, Reference::Step { .. }) {
                deferred.push(reference.to_string());
            }
        }
        resolved.insert(field, Value::String(value));
    }
    match &step.kind {
        StepKind::Shell(s) => {
            resolved.insert("expect_exit".into(), Value::from(s.expect_exit));
        }
        StepKind::Scripted(s) => {
            resolved.insert("interpreter".into(), Value::from(s.interpreter.clone()));
        }
        StepKind::AgentDecision(s) if !s.options.is_empty() => {
            resolved.insert("options".into(), Value::from(s.options.clone()));
        }
        StepKind::ExternalCall(s) => {
            resolved.insert("tool".into(), Value::from(s.tool.clone()));
        }
        StepKind::AgentDecision(_) | StepKind::Checkpoint(_) => {}
    }
    deferred.sort();
    deferred.dedup();
    let limits = step.limits();
    Ok(PlannedStep {
        id: step.id.clone(),
        kind: step.kind_name(),
        description: step.description.clone(),
        major: step.major,
        timeout_secs: limits.map(|l| l.timeout.as_secs_f64()),
        retry: limits.map(|l| l.retry),
        resolved,
        deferred,
    })
}
