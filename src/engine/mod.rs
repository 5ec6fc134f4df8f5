//! The run engine: inputs, pre-flight, preconditions, steps, verification,
//! rollback and the execution record, in that order.
//!
//! ```text
//! Loaded → CheckingPreconditions → Running → Verifying → Succeeded
//!                 │                   │          │
//!                 │                   └──────────┴──→ RollingBack → Failed
//!                 └──────────────────────────────────────────────→ Failed
//! ```

pub mod context;
mod executor;
pub mod inputs;
mod plan;
mod rollback;

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::time::Instant;

use crate::checks::Checker;
use crate::context::ServiceContext;
use crate::definition::{CheckKind, TaskDefinition};
use crate::record::{
    redact, CheckOutcome, ExecutionRecord, FailureKind, FailureReason, RollbackOutcome,
    RollbackStatus, StepResult,
};
use crate::store::RecordStore;
use crate::template::render;
use context::{ExecutionContext, PlanScope};
use executor::StepExecutor;
use inputs::InputError;
pub use plan::{DryRunPlan, PlannedStep};

/// Terminal error of a run. Rollback outcomes are never one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunFailure {
    /// Inputs did not satisfy their declarations.
    #[error(transparent)]
    Input(#[from] InputError),
    /// A template could not be resolved before execution.
    #[error("cannot resolve {location}: {message}")]
    Template {
        /// Field path of the template, e.g. `steps[1].cmd`.
        location: String,
        /// What went wrong.
        message: String,
    },
    /// A precondition did not hold.
    #[error("precondition `{check}` failed: {message}")]
    Precondition {
        /// The check as written.
        check: String,
        /// Diagnostic.
        message: String,
    },
    /// A step failed or was rejected.
    #[error("step `{step}` failed: {message}")]
    Step {
        /// Failing step.
        step: String,
        /// Diagnostic.
        message: String,
    },
    /// A step exceeded its timeout.
    #[error("step `{step}` timed out after {}s", .timeout.as_secs_f64())]
    Timeout {
        /// Failing step.
        step: String,
        /// The budget that elapsed.
        timeout: Duration,
    },
    /// One or more verification checks failed.
    #[error("verification failed: {}", summarize(.failures))]
    Verification {
        /// Every failed check.
        failures: Vec<CheckOutcome>,
    },
}

fn summarize(failures: &[CheckOutcome]) -> String {
    failures.iter().map(|f| format!("{} ({})", f.check, f.message)).collect::<Vec<_>>().join("; ")
}

impl RunFailure {
    /// Process exit code for this failure.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Input(_) | Self::Template { .. } => 1,
            Self::Precondition { .. } => 2,
            Self::Step { .. } | Self::Timeout { .. } => 3,
            Self::Verification { .. } => 4,
        }
    }

    /// Category recorded in the execution record.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Input(_) => FailureKind::Input,
            Self::Template { .. } => FailureKind::Template,
            Self::Precondition { .. } => FailureKind::Precondition,
            Self::Step { .. } => FailureKind::Step,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Verification { .. } => FailureKind::Verification,
        }
    }
}

impl From<&RunFailure> for FailureReason {
    fn from(failure: &RunFailure) -> Self {
        let (step, check) = match failure {
            RunFailure::Step { step, .. } | RunFailure::Timeout { step, .. } => {
                (Some(step.clone()), None)
            }
            RunFailure::Precondition { check, .. } => (None, Some(check.clone())),
            _ => (None, None),
        };
        Self { kind: failure.kind(), step, check, message: failure.to_string() }
    }
}

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Definition loaded, nothing evaluated.
    Loaded,
    /// Evaluating preconditions.
    CheckingPreconditions,
    /// Executing steps.
    Running,
    /// Evaluating verification checks.
    Verifying,
    /// Running rollback actions.
    RollingBack,
    /// Terminal: every step and check succeeded.
    Succeeded,
    /// Terminal: the run failed.
    Failed,
}

impl RunState {
    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Default)]
struct Progress {
    ctx: ExecutionContext,
    steps: Vec<StepResult>,
    verification: Vec<CheckOutcome>,
    rollback: Vec<RollbackOutcome>,
    rollback_triggered: bool,
}

struct Lifecycle<'a> {
    run_id: &'a str,
    state: RunState,
}

impl Lifecycle<'_> {
    fn advance(&mut self, next: RunState) {
        if self.state.is_terminal() {
            tracing::error!(
                run_id = self.run_id,
                from = %self.state,
                to = %next,
                "ignored transition out of terminal state"
            );
            return;
        }
        tracing::info!(run_id = self.run_id, from = %self.state, to = %next, "run state");
        self.state = next;
    }
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunReport {
    /// The record, as persisted.
    pub record: ExecutionRecord,
    /// Root cause, when the run failed.
    pub failure: Option<RunFailure>,
    /// Where the record was written.
    pub log_path: Option<PathBuf>,
    /// Why the record could not be written, if it could not.
    pub log_error: Option<String>,
}

impl RunReport {
    /// Process exit code for the run.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        self.failure.as_ref().map_or(0, RunFailure::exit_code)
    }
}

/// Runs task definitions against a set of services.
///
/// Holds no per-run state: concurrent calls to [`Engine::run`] each own
/// their own [`ExecutionContext`].
pub struct Engine<'a> {
    services: &'a ServiceContext,
    workspace: PathBuf,
    log_dir: PathBuf,
}

impl<'a> Engine<'a> {
    /// Creates an engine rooted at `workspace`, writing records under `log_dir`.
    #[must_use]
    pub fn new(services: &'a ServiceContext, workspace: &Path, log_dir: &Path) -> Self {
        Self { services, workspace: workspace.to_path_buf(), log_dir: log_dir.to_path_buf() }
    }

    /// Executes a definition and persists its record.
    pub async fn run(&self, def: &TaskDefinition, supplied: &Value) -> RunReport {
        let run_id = self.services.id_gen.generate_id();
        let started_at = self.services.clock.now();
        let start = Instant::now();
        let mut lifecycle = Lifecycle { run_id: &run_id, state: RunState::Loaded };
        tracing::info!(run_id = %run_id, task = %def.name, version = %def.version, "run started");

        let mut progress = Progress::default();
        let failure = self.drive(def, supplied, &mut lifecycle, &mut progress).await;
        let success = failure.is_none();
        lifecycle.advance(if success { RunState::Succeeded } else { RunState::Failed });
        if let Some(failure) = &failure {
            tracing::error!(run_id = %run_id, %failure, "run failed");
        }

        let rollback_clean = progress.rollback.iter().all(|o| o.status != RollbackStatus::Failed);
        let record = ExecutionRecord {
            run_id: run_id.clone(),
            started_at,
            finished_at: self.services.clock.now(),
            task: def.name.clone(),
            version: def.version.clone(),
            autonomy: def.autonomy,
            inputs: redact(progress.ctx.inputs()),
            steps: progress.steps,
            verification: progress.verification,
            success,
            failure: failure.as_ref().map(FailureReason::from),
            rollback_triggered: progress.rollback_triggered,
            rollback: progress.rollback,
            rollback_clean,
            total_duration_ms: elapsed_ms(start),
        };

        let store = RecordStore::new(self.services, &self.log_dir);
        let (log_path, log_error) = match store.append(&record) {
            Ok(path) => (Some(path), None),
            Err(e) => {
                tracing::error!(run_id = %run_id, error = %e, "failed to write execution record");
                (None, Some(e.to_string()))
            }
        };
        RunReport { record, failure, log_path, log_error }
    }

    async fn drive(
        &self,
        def: &TaskDefinition,
        supplied: &Value,
        lifecycle: &mut Lifecycle<'_>,
        progress: &mut Progress,
    ) -> Option<RunFailure> {
        let resolved = match inputs::resolve(&def.inputs, supplied) {
            Ok(resolved) => resolved,
            Err(e) => return Some(e.into()),
        };
        let preflight = preflight(def, &resolved);
        progress.ctx = ExecutionContext::new(resolved);
        if let Err(failure) = preflight {
            return Some(failure);
        }

        lifecycle.advance(RunState::CheckingPreconditions);
        if let Err(failure) = self.check_preconditions(def, &progress.ctx).await {
            return Some(failure);
        }

        lifecycle.advance(RunState::Running);
        let mut failure = self.run_steps(def, &mut progress.ctx, &mut progress.steps).await;
        if failure.is_none() {
            lifecycle.advance(RunState::Verifying);
            failure = self.verify(def, &progress.ctx, &mut progress.verification).await;
        }
        if failure.is_some() {
            lifecycle.advance(RunState::RollingBack);
            progress.rollback_triggered = true;
            progress.rollback =
                rollback::roll_back(self.services, &self.workspace, &def.rollback, &progress.ctx)
                    .await;
        }
        failure
    }

    /// Resolves inputs, preconditions and templates without running anything.
    ///
    /// Writes no record and starts no process: `exit_code_equals`
    /// preconditions are listed as skipped instead of evaluated.
    ///
    /// # Errors
    ///
    /// Returns the failure the real run would stop at before its first step.
    pub async fn dry_run(
        &self,
        def: &TaskDefinition,
        supplied: &Value,
    ) -> Result<DryRunPlan, RunFailure> {
        let resolved = inputs::resolve(&def.inputs, supplied)?;
        preflight(def, &resolved)?;
        let ctx = ExecutionContext::new(resolved);
        let checker = Checker::new(self.services, &self.workspace);
        let mut preconditions = Vec::new();
        let mut skipped = Vec::new();
        for check in &def.preconditions {
            if matches!(check.kind, CheckKind::ExitCodeEquals { .. }) {
                skipped.push(check.to_string());
                continue;
            }
            let outcome = checker.evaluate(check, &ctx).await;
            if !outcome.passed {
                return Err(RunFailure::Precondition {
                    check: outcome.check,
                    message: outcome.message,
                });
            }
            preconditions.push(outcome);
        }
        plan::build(def, ctx.inputs(), &self.workspace, preconditions, skipped)
    }

    async fn check_preconditions(
        &self,
        def: &TaskDefinition,
        ctx: &ExecutionContext,
    ) -> Result<(), RunFailure> {
        let checker = Checker::new(self.services, &self.workspace);
        for check in &def.preconditions {
            let outcome = checker.evaluate(check, ctx).await;
            if !outcome.passed {
                return Err(RunFailure::Precondition {
                    check: outcome.check,
                    message: outcome.message,
                });
            }
            tracing::info!(check = %outcome.check, "precondition satisfied");
        }
        Ok(())
    }

    async fn run_steps(
        &self,
        def: &TaskDefinition,
        ctx: &mut ExecutionContext,
        recorded: &mut Vec<StepResult>,
    ) -> Option<RunFailure> {
        let executor = StepExecutor::new(self.services, &self.workspace, def);
        for step in &def.steps {
            let result = executor.execute(step, ctx).await;
            recorded.push(result.truncated());
            let failure = executor::failure_of(step, &result);
            // Failed results stay readable so rollback commands can quote them.
            if let Err(duplicate) = ctx.record(result) {
                return Some(RunFailure::Step {
                    step: duplicate.step_id,
                    message: "step produced a second result".to_string(),
                });
            }
            if failure.is_some() {
                return failure;
            }
        }
        None
    }

    async fn verify(
        &self,
        def: &TaskDefinition,
        ctx: &ExecutionContext,
        outcomes: &mut Vec<CheckOutcome>,
    ) -> Option<RunFailure> {
        let checker = Checker::new(self.services, &self.workspace);
        for check in &def.verification {
            outcomes.push(checker.evaluate(check, ctx).await);
        }
        let failures: Vec<CheckOutcome> =
            outcomes.iter().filter(|o| !o.passed).cloned().collect();
        if failures.is_empty() {
            None
        } else {
            Some(RunFailure::Verification { failures })
        }
    }
}

/// Renders every template of the definition with inputs only, so a missing
/// value is caught before any side effect.
fn preflight(def: &TaskDefinition, inputs: &Map<String, Value>) -> Result<(), RunFailure> {
    let scope = PlanScope::new(inputs);
    let mut templates: Vec<(String, &str)> = Vec::new();
    for (i, check) in def.preconditions.iter().enumerate() {
        let location = format!("preconditions[{i}]");
        templates.extend(check.kind.templates().into_iter().map(|t| (location.clone(), t)));
    }
    for (i, step) in def.steps.iter().enumerate() {
        let fields = step.templates().into_iter();
        templates.extend(fields.map(|(field, t)| (format!("steps[{i}].{field}"), t)));
    }
    for (i, check) in def.verification.iter().enumerate() {
        let location = format!("verification[{i}]");
        templates.extend(check.kind.templates().into_iter().map(|t| (location.clone(), t)));
    }
    for (i, action) in def.rollback.iter().enumerate() {
        templates.push((format!("rollback[{i}].cmd"), &action.cmd));
        if let Some(dir) = &action.working_dir {
            templates.push((format!("rollback[{i}].working_dir"), dir));
        }
    }
    for (location, text) in templates {
        render(text, &scope)
            .map_err(|e| RunFailure::Template { location, message: e.to_string() })?;
    }
    Ok(())
}

/// Joins `rendered` onto the workspace and rejects results outside it.
///
/// Normalization is lexical: `..` components are folded without touching
/// the filesystem, so directories that do not exist yet are accepted.
pub(crate) fn contained(workspace: &Path, rendered: &str) -> Result<PathBuf, String> {
    let root = normalize(workspace);
    let joined = normalize(&root.join(rendered));
    if joined.starts_with(&root) {
        Ok(joined)
    } else {
        Err(format!("working_dir `{rendered}` escapes the workspace {}", root.display()))
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
