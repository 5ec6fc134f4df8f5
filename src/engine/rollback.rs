//! Best-effort rollback after a failed run.

use std::path::Path;

use tokio::time::Instant;

use super::context::ExecutionContext;
use super::{contained, elapsed_ms};
use crate::context::ServiceContext;
use crate::definition::RollbackAction;
use crate::ports::CommandRequest;
use crate::record::{RollbackOutcome, RollbackStatus};
use crate::template::render;

/// Runs every action in reverse declaration order.
///
/// A failing action never stops the remaining ones. An action that undoes a
/// step which did not complete is skipped.
pub(crate) async fn roll_back(
    services: &ServiceContext,
    workspace: &Path,
    actions: &[RollbackAction],
    ctx: &ExecutionContext,
) -> Vec<RollbackOutcome> {
    let mut outcomes = Vec::with_capacity(actions.len());
    for action in actions.iter().rev() {
        let start = Instant::now();
        let outcome = match action.undoes.as_deref() {
            Some(step) if !ctx.completed(step) => RollbackOutcome {
                id: action.id.clone(),
                status: RollbackStatus::Skipped,
                exit_code: None,
                detail: Some(format!("step `{step}` did not complete")),
                duration_ms: 0,
            },
            _ => run_action(services, workspace, action, ctx, start).await,
        };
        match outcome.status {
            RollbackStatus::Succeeded => {
                tracing::info!(action = %action.id, "rollback action succeeded");
            }
            RollbackStatus::Skipped => {
                tracing::info!(action = %action.id, "rollback action skipped");
            }
            RollbackStatus::Failed => tracing::warn!(
                action = %action.id,
                detail = outcome.detail.as_deref().unwrap_or_default(),
                "rollback action failed"
            ),
        }
        outcomes.push(outcome);
    }
    outcomes
}

async fn run_action(
    services: &ServiceContext,
    workspace: &Path,
    action: &RollbackAction,
    ctx: &ExecutionContext,
    start: Instant,
) -> RollbackOutcome {
    let outcome = |status, exit_code, detail| RollbackOutcome {
        id: action.id.clone(),
        status,
        exit_code,
        detail,
        duration_ms: elapsed_ms(start),
    };
    let request = match prepare(workspace, action, ctx) {
        Ok(request) => request,
        Err(detail) => return outcome(RollbackStatus::Failed, None, Some(detail)),
    };
    match tokio::time::timeout(action.timeout, services.shell.run(&request)).await {
        Ok(Ok(output)) if output.exit_code == 0 => outcome(RollbackStatus::Succeeded, Some(0), None),
        Ok(Ok(output)) => outcome(
            RollbackStatus::Failed,
            Some(output.exit_code),
            Some(format!("exited {}: {}", output.exit_code, output.stderr.trim_end())),
        ),
        Ok(Err(e)) => outcome(RollbackStatus::Failed, None, Some(format!("could not start: {e}"))),
        Err(_) => outcome(
            RollbackStatus::Failed,
            None,
            Some(format!("timed out after {}s", action.timeout.as_secs_f64())),
        ),
    }
}

fn prepare(
    workspace: &Path,
    action: &RollbackAction,
    ctx: &ExecutionContext,
) -> Result<CommandRequest, String> {
    let cmd = render(&action.cmd, ctx).map_err(|e| format!("cannot resolve cmd: {e}"))?;
    let dir = match &action.working_dir {
        Some(dir) => {
            let rendered =
                render(dir, ctx).map_err(|e| format!("cannot resolve working_dir: {e}"))?;
            contained(workspace, &rendered)?
        }
        None => workspace.to_path_buf(),
    };
    Ok(CommandRequest::shell(&cmd).in_dir(dir))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::Map;

    use super::*;
    use crate::adapters::scripted::{Reply, ScriptedShell};

    fn action(id: &str, cmd: &str, undoes: Option<&str>) -> RollbackAction {
        RollbackAction {
            id: id.into(),
            description: String::new(),
            cmd: cmd.into(),
            working_dir: None,
            timeout: Duration::from_secs(5),
            undoes: undoes.map(str::to_string),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runs_in_reverse_and_continues_past_failures() {
        let shell = ScriptedShell::new()
            .on("rm first", Reply::exit(1, ""))
            .on("hang", Reply::Hang);
        let services = ServiceContext { shell: Box::new(shell.clone()), ..ServiceContext::scripted() };
        let actions = vec![
            action("first", "rm first", None),
            action("second", "hang", None),
            action("third", "rm third", None),
            action("fourth", "rm build", Some("build")),
        ];

        let outcomes =
            roll_back(&services, Path::new("/ws"), &actions, &ExecutionContext::new(Map::new()))
                .await;

        let ids: Vec<_> = outcomes.iter().map(|o| (o.id.as_str(), o.status)).collect();
        assert_eq!(
            ids,
            vec![
                ("fourth", RollbackStatus::Skipped),
                ("third", RollbackStatus::Succeeded),
                ("second", RollbackStatus::Failed),
                ("first", RollbackStatus::Failed),
            ]
        );
        assert_eq!(shell.commands(), vec!["rm third", "hang", "rm first"]);
        assert!(outcomes[2].detail.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn escaping_working_dir_fails_without_running() {
        let shell = ScriptedShell::new();
        let services = ServiceContext { shell: Box::new(shell.clone()), ..ServiceContext::scripted() };
        let mut escaping = action("up", "rm -rf x", None);
        escaping.working_dir = Some("../..".into());

        let outcomes = roll_back(
            &services,
            Path::new("/ws"),
            &[escaping],
            &ExecutionContext::new(Map::new()),
        )
        .await;

        assert_eq!(outcomes[0].status, RollbackStatus::Failed);
        assert!(shell.commands().is_empty());
    }
}
