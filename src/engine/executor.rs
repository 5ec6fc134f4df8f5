//! Step execution: approval gating, rendering, retries and timeouts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::time::Instant;

use super::context::ExecutionContext;
use super::{contained, elapsed_ms, inputs, RunFailure};
use crate::context::ServiceContext;
use crate::definition::{Autonomy, Step, StepKind, TaskDefinition};
use crate::ports::{
    Approval, ApprovalReason, ApprovalRequest, CommandRequest, DecisionRequest, ToolCall,
};
use crate::record::{StepResult, StepStatus};
use crate::template::{render, render_value};

/// A step rendered against the current context, ready to hand to a port.
enum Invocation {
    Process { request: CommandRequest, expect_exit: i32 },
    Decision(DecisionRequest),
    Tool(ToolCall),
    Checkpoint(String),
}

/// What one attempt observed.
struct Attempt {
    status: StepStatus,
    exit_code: Option<i32>,
    stdout: String,
    stderr: String,
    output: Option<Value>,
    error: Option<String>,
}

impl Attempt {
    fn succeeded(output: Option<Value>) -> Self {
        Self {
            status: StepStatus::Succeeded,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            output,
            error: None,
        }
    }

    fn with_status(status: StepStatus, error: String) -> Self {
        Self { status, error: Some(error), ..Self::succeeded(None) }
    }

    fn failed(error: String) -> Self {
        Self::with_status(StepStatus::Failed, error)
    }
}

pub(crate) struct StepExecutor<'a> {
    services: &'a ServiceContext,
    workspace: &'a Path,
    def: &'a TaskDefinition,
}

impl<'a> StepExecutor<'a> {
    pub(crate) fn new(
        services: &'a ServiceContext,
        workspace: &'a Path,
        def: &'a TaskDefinition,
    ) -> Self {
        Self { services, workspace, def }
    }

    /// Runs one step to completion. Never fails: every problem ends up in
    /// the returned result's status.
    pub(crate) async fn execute(&self, step: &Step, ctx: &mut ExecutionContext) -> StepResult {
        let started_at = self.services.clock.now();
        let start = Instant::now();
        tracing::info!(step = %step.id, kind = %step.kind_name(), "step started");

        let invocation = loop {
            let invocation = match self.prepare(step, ctx) {
                Ok(invocation) => invocation,
                Err(error) => return finish(step, started_at, start, Attempt::failed(error), 1),
            };
            let Some(reason) = gate(step, self.def.autonomy) else { break invocation };
            let request = ApprovalRequest {
                task: self.def.name.clone(),
                step_id: step.id.clone(),
                message: summary(step, &invocation),
                reason,
            };
            let rejected = |error: String| Attempt::with_status(StepStatus::Rejected, error);
            match self.services.approval.request(&request).await {
                Ok(Approval::Approve) => break invocation,
                Ok(Approval::Reject { reason }) => {
                    let error = match reason {
                        Some(reason) => format!("rejected by approver: {reason}"),
                        None => "rejected by approver".to_string(),
                    };
                    return finish(step, started_at, start, rejected(error), 1);
                }
                Ok(Approval::Modify { inputs: changes }) => {
                    match inputs::merge(&self.def.inputs, ctx.inputs(), &changes) {
                        Ok(merged) => {
                            tracing::info!(
                                step = %step.id,
                                changed = changes.len(),
                                "inputs modified by approver"
                            );
                            ctx.replace_inputs(merged);
                        }
                        Err(e) => {
                            let attempt = Attempt::failed(format!("modification rejected: {e}"));
                            return finish(step, started_at, start, attempt, 1);
                        }
                    }
                }
                Err(e) => {
                    let attempt = Attempt::failed(format!("approval channel failed: {e}"));
                    return finish(step, started_at, start, attempt, 1);
                }
            }
        };

        if let Invocation::Checkpoint(_) = invocation {
            let attempt = Attempt::succeeded(Some(json!("approved")));
            return finish(step, started_at, start, attempt, 1);
        }

        let limits = step.limits().copied().unwrap_or_default();
        let mut attempts = 0;
        loop {
            attempts += 1;
            let attempt = match tokio::time::timeout(limits.timeout, self.attempt(&invocation)).await
            {
                Ok(attempt) => attempt,
                Err(_) => Attempt::with_status(
                    StepStatus::TimedOut,
                    format!("timed out after {}s", limits.timeout.as_secs_f64()),
                ),
            };
            if attempt.status == StepStatus::Succeeded || attempts > limits.retry {
                return finish(step, started_at, start, attempt, attempts);
            }
            tracing::warn!(
                step = %step.id,
                attempt = attempts,
                error = attempt.error.as_deref().unwrap_or_default(),
                "attempt failed, retrying"
            );
        }
    }

    fn prepare(&self, step: &Step, ctx: &ExecutionContext) -> Result<Invocation, String> {
        let resolve = |field: &str, text: &str| -> Result<String, String> {
            render(text, ctx).map_err(|e| format!("cannot resolve {field}: {e}"))
        };
        Ok(match &step.kind {
            StepKind::Shell(s) => Invocation::Process {
                request: self.process(
                    CommandRequest::shell(&resolve("cmd", &s.cmd)?),
                    s.working_dir.as_deref(),
                    &s.env,
                    ctx,
                )?,
                expect_exit: s.expect_exit,
            },
            StepKind::Scripted(s) => Invocation::Process {
                request: self.process(
                    CommandRequest::script(&s.interpreter, &resolve("code", &s.code)?),
                    s.working_dir.as_deref(),
                    &s.env,
                    ctx,
                )?,
                expect_exit: 0,
            },
            StepKind::AgentDecision(s) => Invocation::Decision(DecisionRequest {
                task: self.def.name.clone(),
                step_id: step.id.clone(),
                prompt: resolve("prompt", &s.prompt)?,
                options: s.options.clone(),
            }),
            StepKind::Checkpoint(s) => Invocation::Checkpoint(resolve("message", &s.message)?),
            StepKind::ExternalCall(s) => {
                let mut args = BTreeMap::new();
                for (key, value) in &s.args {
                    args.insert(key.clone(), resolve(&format!("args.{key}"), value)?);
                }
                Invocation::Tool(ToolCall { tool: s.tool.clone(), args })
            }
        })
    }

    fn process(
        &self,
        request: CommandRequest,
        working_dir: Option<&str>,
        env: &BTreeMap<String, String>,
        ctx: &ExecutionContext,
    ) -> Result<CommandRequest, String> {
        let dir: PathBuf = match working_dir {
            Some(dir) => {
                let rendered = render(dir, ctx)
                    .map_err(|e| format!("cannot resolve working_dir: {e}"))?;
                contained(self.workspace, &rendered)?
            }
            None => self.workspace.to_path_buf(),
        };
        let mut rendered_env = BTreeMap::new();
        for (key, value) in env {
            let value =
                render(value, ctx).map_err(|e| format!("cannot resolve env.{key}: {e}"))?;
            rendered_env.insert(key.clone(), value);
        }
        Ok(request.in_dir(dir).with_env(rendered_env))
    }

    async fn attempt(&self, invocation: &Invocation) -> Attempt {
        match invocation {
            Invocation::Process { request, expect_exit } => {
                match self.services.shell.run(request).await {
                    Ok(output) => {
                        let (status, error) = if output.exit_code == *expect_exit {
                            (StepStatus::Succeeded, None)
                        } else {
                            (
                                StepStatus::Failed,
                                Some(format!(
                                    "exited {}, expected {expect_exit}",
                                    output.exit_code
                                )),
                            )
                        };
                        let primary = output.stdout.trim_end_matches(['\n', '\r']).to_string();
                        Attempt {
                            status,
                            exit_code: Some(output.exit_code),
                            stdout: output.stdout,
                            stderr: output.stderr,
                            output: Some(Value::String(primary)),
                            error,
                        }
                    }
                    Err(e) => {
                        Attempt::failed(format!("could not start `{}`: {e}", request.program))
                    }
                }
            }
            Invocation::Decision(request) => match self.services.decisions.decide(request).await {
                Ok(value) => {
                    let rendered = render_value(&value).unwrap_or_default();
                    if request.options.is_empty() || request.options.contains(&rendered) {
                        Attempt::succeeded(Some(value))
                    } else {
                        Attempt {
                            output: Some(value),
                            ..Attempt::failed(format!(
                                "decision `{rendered}` is not one of: {}",
                                request.options.join(", ")
                            ))
                        }
                    }
                }
                Err(e) => Attempt::failed(format!("no decision: {e}")),
            },
            Invocation::Tool(call) => match self.services.tools.invoke(call).await {
                Ok(result) if result.success => Attempt::succeeded(Some(result.output)),
                Ok(result) => Attempt {
                    output: Some(result.output),
                    ..Attempt::failed(format!("tool `{}` reported failure", call.tool))
                },
                Err(e) => Attempt::failed(format!("tool `{}` failed: {e}", call.tool)),
            },
            Invocation::Checkpoint(_) => Attempt::succeeded(Some(json!("approved"))),
        }
    }
}

/// Whether the step needs approval before it runs, and why.
fn gate(step: &Step, autonomy: Autonomy) -> Option<ApprovalReason> {
    match (&step.kind, autonomy) {
        (StepKind::Checkpoint(_), _) => Some(ApprovalReason::Checkpoint),
        (_, Autonomy::ConfirmEach) => Some(ApprovalReason::ConfirmEach),
        (_, Autonomy::ConfirmMajor) if step.major => Some(ApprovalReason::ConfirmMajor),
        _ => None,
    }
}

fn summary(step: &Step, invocation: &Invocation) -> String {
    let detail = match invocation {
        Invocation::Checkpoint(message) => return message.clone(),
        Invocation::Process { request, .. } => request.payload().to_string(),
        Invocation::Decision(request) => request.prompt.clone(),
        Invocation::Tool(call) => format!("call tool `{}`", call.tool),
    };
    let title = if step.description.is_empty() { &step.id } else { &step.description };
    format!("{title}: {detail}")
}

fn finish(
    step: &Step,
    started_at: DateTime<Utc>,
    start: Instant,
    attempt: Attempt,
    attempts: u32,
) -> StepResult {
    let result = StepResult {
        step_id: step.id.clone(),
        kind: step.kind_name(),
        status: attempt.status,
        exit_code: attempt.exit_code,
        stdout: attempt.stdout,
        stderr: attempt.stderr,
        output: attempt.output,
        error: attempt.error,
        started_at,
        duration_ms: elapsed_ms(start),
        attempts,
    };
    if result.succeeded() {
        tracing::info!(
            step = %step.id,
            attempts,
            duration_ms = result.duration_ms,
            "step succeeded"
        );
    } else {
        tracing::warn!(
            step = %step.id,
            status = ?result.status,
            error = result.error.as_deref().unwrap_or_default(),
            "step did not succeed"
        );
    }
    result
}

/// The run failure a finished step implies, if any.
pub(crate) fn failure_of(step: &Step, result: &StepResult) -> Option<RunFailure> {
    match result.status {
        StepStatus::Succeeded => None,
        StepStatus::TimedOut => Some(RunFailure::Timeout {
            step: step.id.clone(),
            timeout: step.limits().copied().unwrap_or_default().timeout,
        }),
        StepStatus::Failed | StepStatus::Rejected => Some(RunFailure::Step {
            step: step.id.clone(),
            message: result.error.clone().unwrap_or_else(|| "failed".to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{CheckpointStep, ExecutionLimits, ShellStep};

    fn shell_step(major: bool) -> Step {
        Step {
            id: "build".into(),
            description: "Build it".into(),
            major,
            kind: StepKind::Shell(ShellStep {
                cmd: "make".into(),
                expect_exit: 0,
                working_dir: None,
                env: BTreeMap::new(),
                limits: ExecutionLimits::default(),
            }),
        }
    }

    #[test]
    fn gating_follows_autonomy() {
        let checkpoint = Step {
            id: "ok".into(),
            description: String::new(),
            major: false,
            kind: StepKind::Checkpoint(CheckpointStep { message: "go?".into() }),
        };
        assert_eq!(gate(&checkpoint, Autonomy::Autonomous), Some(ApprovalReason::Checkpoint));
        assert_eq!(gate(&shell_step(true), Autonomy::Autonomous), None);
        assert_eq!(gate(&shell_step(false), Autonomy::ConfirmMajor), None);
        assert_eq!(gate(&shell_step(true), Autonomy::ConfirmMajor), Some(ApprovalReason::ConfirmMajor));
        assert_eq!(gate(&shell_step(false), Autonomy::ConfirmEach), Some(ApprovalReason::ConfirmEach));
    }

    #[test]
    fn summary_names_the_step_and_its_payload() {
        let invocation = Invocation::Process { request: CommandRequest::shell("make all"), expect_exit: 0 };
        assert_eq!(summary(&shell_step(false), &invocation), "Build it: make all");
    }
}
