//! Per-run execution context.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::record::StepResult;
use crate::template::{render_value, Reference, Resolution, Scope, StepField};

/// Resolved inputs plus the write-once results of every step that ran,
/// including the one that failed.
///
/// Owned by exactly one run. Inputs change only through
/// [`ExecutionContext::replace_inputs`], which the executor calls for a
/// checkpoint modification.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    inputs: Map<String, Value>,
    results: BTreeMap<String, StepResult>,
}

impl ExecutionContext {
    /// Creates a context for a run.
    #[must_use]
    pub fn new(inputs: Map<String, Value>) -> Self {
        Self { inputs, results: BTreeMap::new() }
    }

    /// Current inputs.
    #[must_use]
    pub fn inputs(&self) -> &Map<String, Value> {
        &self.inputs
    }

    /// Replaces the inputs after a validated modification.
    pub fn replace_inputs(&mut self, inputs: Map<String, Value>) {
        self.inputs = inputs;
    }

    /// Stores a step's result, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns the rejected result if the step already has one.
    pub fn record(&mut self, result: StepResult) -> Result<(), Box<StepResult>> {
        if self.results.contains_key(&result.step_id) {
            return Err(Box::new(result));
        }
        self.results.insert(result.step_id.clone(), result);
        Ok(())
    }

    /// The result of a step that ran.
    #[must_use]
    pub fn result(&self, step_id: &str) -> Option<&StepResult> {
        self.results.get(step_id)
    }

    /// Whether a step completed successfully.
    #[must_use]
    pub fn completed(&self, step_id: &str) -> bool {
        self.result(step_id).is_some_and(StepResult::succeeded)
    }
}

impl Scope for ExecutionContext {
    fn resolve(&self, reference: &Reference) -> Resolution {
        let value = match reference {
            Reference::Input(name) => self.inputs.get(name).and_then(render_value),
            Reference::Step { step, field } => {
                self.results.get(step).and_then(|result| step_field(result, *field))
            }
        };
        value.map_or(Resolution::Missing, Resolution::Value)
    }
}

/// Resolves inputs and leaves step references as placeholders.
///
/// Used before any step runs: for the pre-flight check and for dry runs.
pub struct PlanScope<'a> {
    inputs: &'a Map<String, Value>,
}

impl<'a> PlanScope<'a> {
    /// Wraps resolved inputs.
    #[must_use]
    pub fn new(inputs: &'a Map<String, Value>) -> Self {
        Self { inputs }
    }
}

impl Scope for PlanScope<'_> {
    fn resolve(&self, reference: &Reference) -> Resolution {
        match reference {
            Reference::Input(name) => self
                .inputs
                .get(name)
                .and_then(render_value)
                .map_or(Resolution::Missing, Resolution::Value),
            Reference::Step { .. } => Resolution::Deferred,
        }
    }
}

/// Captured text is trimmed of trailing line breaks so it splices into commands.
fn step_field(result: &StepResult, field: StepField) -> Option<String> {
    match field {
        StepField::Stdout => Some(result.stdout.trim_end_matches(['\n', '\r']).to_string()),
        StepField::Stderr => Some(result.stderr.trim_end_matches(['\n', '\r']).to_string()),
        StepField::ExitCode => result.exit_code.map(|code| code.to_string()),
        StepField::Output => result.output.as_ref().and_then(render_value),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::definition::StepKindName;
    use crate::record::StepStatus;
    use crate::template::render;

    fn result(id: &str, stdout: &str) -> StepResult {
        StepResult {
            step_id: id.into(),
            kind: StepKindName::Shell,
            status: StepStatus::Succeeded,
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
            output: None,
            error: None,
            started_at: Utc::now(),
            duration_ms: 1,
            attempts: 1,
        }
    }

    fn inputs() -> Map<String, Value> {
        let Value::Object(map) = json!({"name": "demo", "tags": ["a", "b"]}) else {
            unreachable!()
        };
        map
    }

    #[test]
    fn renders_inputs_and_step_fields() {
        let mut ctx = ExecutionContext::new(inputs());
        ctx.record(result("build", "target/demo\n")).unwrap();

        let text = render("{{name}} {{tags}} {{steps.build.stdout}} {{steps.build.exit_code}}", &ctx)
            .unwrap();
        assert_eq!(text, "demo a b target/demo 0");
    }

    #[test]
    fn results_are_write_once() {
        let mut ctx = ExecutionContext::new(inputs());
        ctx.record(result("build", "one")).unwrap();
        assert!(ctx.record(result("build", "two")).is_err());
        assert_eq!(ctx.result("build").unwrap().stdout, "one");
    }

    #[test]
    fn missing_step_result_does_not_render() {
        let ctx = ExecutionContext::new(inputs());
        assert!(render("{{steps.build.stdout}}", &ctx).is_err());
    }

    #[test]
    fn plan_scope_defers_step_references() {
        let inputs = inputs();
        let text = render("cp {{steps.build.stdout}} {{name}}", &PlanScope::new(&inputs)).unwrap();
        assert_eq!(text, "cp {{steps.build.stdout}} demo");
        assert!(render("{{absent}}", &PlanScope::new(&inputs)).is_err());
    }
}
