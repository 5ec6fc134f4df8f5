//! `skillrun execute` command.

use serde_json::{Map, Value};

use crate::cli::ExecuteArgs;
use crate::config::Config;
use crate::context::{LiveOptions, ServiceContext};
use crate::engine::{Engine, RunReport};
use crate::error::Error;
use crate::record::{RollbackStatus, StepStatus};
use crate::registry::Registry;

/// Execute the `execute` command with live adapters.
///
/// # Errors
///
/// Returns an error if the arguments do not parse, the skill cannot be
/// loaded, or the run fails.
pub fn run(config: &Config, args: &ExecuteArgs) -> Result<(), Error> {
    let decisions = match &args.decisions {
        Some(raw) => parse_object("--decisions", raw)?,
        None => Map::new(),
    };
    let ctx = ServiceContext::live(LiveOptions {
        auto_approve: args.yes,
        decisions,
        tools: config.tools.clone(),
    });
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Io(format!("cannot start the async runtime: {e}")))?;
    runtime.block_on(run_with_context(&ctx, config, args))
}

/// Runs or dry-runs a skill against an existing service context.
///
/// # Errors
///
/// Returns an error if `--inputs` does not parse, the skill cannot be
/// loaded, or the run fails.
pub async fn run_with_context(
    ctx: &ServiceContext,
    config: &Config,
    args: &ExecuteArgs,
) -> Result<(), Error> {
    let inputs = Value::Object(parse_object("--inputs", &args.inputs)?);
    let (def, _) = Registry::new(ctx, &config.skills_dir).load(&args.name)?;
    let engine = Engine::new(ctx, &config.workspace, &config.log_dir);

    if args.dry_run {
        let plan = engine.dry_run(&def, &inputs).await?;
        let json = serde_json::to_string_pretty(&plan)
            .map_err(|e| Error::Io(format!("cannot serialize the plan: {e}")))?;
        println!("{json}");
        return Ok(());
    }

    let report = engine.run(&def, &inputs).await;
    print_report(&report);
    match report.failure {
        Some(failure) => Err(failure.into()),
        None => Ok(()),
    }
}

fn parse_object(flag: &'static str, raw: &str) -> Result<Map<String, Value>, Error> {
    match serde_json::from_str(raw).map_err(|source| Error::Json { flag, source })? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(Error::Usage(format!("{flag} must be a JSON object, got {other}"))),
    }
}

fn print_report(report: &RunReport) {
    let record = &report.record;
    println!("Run {} of {}@{}", record.run_id, record.task, record.version);
    for step in &record.steps {
        let mark = match step.status {
            StepStatus::Succeeded => "ok",
            StepStatus::Failed => "FAILED",
            StepStatus::TimedOut => "TIMED OUT",
            StepStatus::Rejected => "REJECTED",
        };
        let mut line =
            format!("  [{mark}] {} ({}, {}ms", step.step_id, step.kind, step.duration_ms);
        if step.attempts > 1 {
            line.push_str(&format!(", {} attempts", step.attempts));
        }
        line.push(')');
        if let Some(error) = &step.error {
            line.push_str(&format!(": {error}"));
        }
        println!("{line}");
    }
    if !record.verification.is_empty() {
        println!("Verification:");
        for check in &record.verification {
            let mark = if check.passed { "ok" } else { "FAILED" };
            println!("  [{mark}] {}: {}", check.check, check.message);
        }
    }
    if record.rollback_triggered {
        println!("Rollback:");
        for action in &record.rollback {
            let mark = match action.status {
                RollbackStatus::Succeeded => "ok",
                RollbackStatus::Failed => "FAILED",
                RollbackStatus::Skipped => "skipped",
            };
            match &action.detail {
                Some(detail) => println!("  [{mark}] {}: {detail}", action.id),
                None => println!("  [{mark}] {}", action.id),
            }
        }
    }
    match &report.failure {
        None => println!("Result: succeeded in {}ms", record.total_duration_ms),
        Some(failure) => println!("Result: failed: {failure}"),
    }
    match (&report.log_path, &report.log_error) {
        (Some(path), _) => println!("Record: {}", path.display()),
        (None, Some(error)) => eprintln!("warning: execution record not written: {error}"),
        (None, None) => {}
    }
}
