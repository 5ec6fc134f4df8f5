//! Check evaluation shared by preconditions and verification.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::context::ServiceContext;
use crate::definition::{Check, CheckKind};
use crate::engine::context::ExecutionContext;
use crate::ports::CommandRequest;
use crate::record::{CheckOutcome, StepResult};
use crate::template::{render, render_value, TemplateError};

/// Time budget for the command of an `exit_code_equals` check.
pub const CHECK_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Evaluates checks against the workspace and a run's context.
pub struct Checker<'a> {
    services: &'a ServiceContext,
    workspace: &'a Path,
}

impl<'a> Checker<'a> {
    /// Creates a checker; relative paths resolve against `workspace`.
    #[must_use]
    pub fn new(services: &'a ServiceContext, workspace: &'a Path) -> Self {
        Self { services, workspace }
    }

    /// Evaluates one check. Never fails: problems become a failed outcome.
    pub async fn evaluate(&self, check: &Check, ctx: &ExecutionContext) -> CheckOutcome {
        let (passed, observed) = match self.observe(&check.kind, ctx).await {
            Ok(result) => result,
            Err(e) => (false, e.to_string()),
        };
        let message = match (&check.error_message, passed) {
            (Some(custom), false) => custom.clone(),
            _ => observed,
        };
        tracing::debug!(check = %check, passed, %message, "check evaluated");
        CheckOutcome { check: check.to_string(), passed, message }
    }

    async fn observe(
        &self,
        kind: &CheckKind,
        ctx: &ExecutionContext,
    ) -> Result<(bool, String), TemplateError> {
        let fs = &self.services.fs;
        Ok(match kind {
            CheckKind::CommandExists { name } => {
                let name = render(name, ctx)?;
                match self.services.env.find_executable(&name) {
                    Some(path) => (true, format!("`{name}` found at {}", path.display())),
                    None => (false, format!("command `{name}` not found on PATH")),
                }
            }
            CheckKind::FileExists { path } => {
                let path = self.path(&render(path, ctx)?);
                let found = fs.is_file(&path);
                (found, presence("file", &path, found))
            }
            CheckKind::DirExists { path } => {
                let path = self.path(&render(path, ctx)?);
                let found = fs.is_dir(&path);
                (found, presence("directory", &path, found))
            }
            CheckKind::PathExists { base, path } => {
                let relative = render(path, ctx)?;
                let path = match base {
                    Some(base) => self.path(&render(base, ctx)?).join(relative),
                    None => self.path(&relative),
                };
                let found = fs.exists(&path);
                (found, presence("path", &path, found))
            }
            CheckKind::EnvVarSet { name } => {
                let name = render(name, ctx)?;
                if self.services.env.var(&name).is_some() {
                    (true, format!("environment variable `{name}` is set"))
                } else {
                    (false, format!("environment variable `{name}` is not set"))
                }
            }
            CheckKind::ExitCodeEquals { command, expect } => {
                let command = render(command, ctx)?;
                self.exit_code_equals(&command, *expect).await
            }
            CheckKind::JsonValid { path } => {
                let path = self.path(&render(path, ctx)?);
                match fs.read_to_string(&path) {
                    Ok(text) => match serde_json::from_str::<serde_json::Value>(&text) {
                        Ok(_) => (true, format!("{} is valid JSON", path.display())),
                        Err(e) => (false, format!("{} is not valid JSON: {e}", path.display())),
                    },
                    Err(e) => (false, format!("cannot read {}: {e}", path.display())),
                }
            }
            CheckKind::StepExitCode { step, expect } => {
                match ctx.result(step).and_then(|result| result.exit_code) {
                    Some(code) if code == *expect => (true, format!("step `{step}` exited {code}")),
                    Some(code) => {
                        (false, format!("step `{step}` exited {code}, expected {expect}"))
                    }
                    None => (false, format!("step `{step}` has no exit code")),
                }
            }
            CheckKind::StepOutputContains { step, needle } => {
                let needle = render(needle, ctx)?;
                match ctx.result(step) {
                    Some(result) if captured_text(result).contains(&needle) => {
                        (true, format!("step `{step}` output contains `{needle}`"))
                    }
                    Some(_) => (false, format!("step `{step}` output does not contain `{needle}`")),
                    None => (false, format!("step `{step}` has no result")),
                }
            }
        })
    }

    async fn exit_code_equals(&self, command: &str, expect: i32) -> (bool, String) {
        let request = CommandRequest::shell(command).in_dir(self.workspace.to_path_buf());
        match tokio::time::timeout(CHECK_COMMAND_TIMEOUT, self.services.shell.run(&request)).await
        {
            Ok(Ok(output)) if output.exit_code == expect => {
                (true, format!("`{command}` exited {expect}"))
            }
            Ok(Ok(output)) => (
                false,
                format!("`{command}` exited {}, expected {expect}", output.exit_code),
            ),
            Ok(Err(e)) => (false, format!("`{command}` could not run: {e}")),
            Err(_) => (
                false,
                format!("`{command}` timed out after {}s", CHECK_COMMAND_TIMEOUT.as_secs()),
            ),
        }
    }

    fn path(&self, rendered: &str) -> PathBuf {
        self.workspace.join(rendered)
    }
}

fn presence(what: &str, path: &Path, found: bool) -> String {
    if found {
        format!("{what} {} exists", path.display())
    } else {
        format!("{what} {} does not exist", path.display())
    }
}

/// Decision and tool steps leave stdout empty and carry their result in `output`.
fn captured_text(result: &StepResult) -> String {
    if result.stdout.is_empty() {
        result.output.as_ref().and_then(render_value).unwrap_or_default()
    } else {
        result.stdout.clone()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::{json, Map};

    use super::*;
    use crate::adapters::scripted::{MemFileSystem, Reply, ScriptedEnvironment, ScriptedShell};
    use crate::definition::StepKindName;
    use crate::record::StepStatus;

    fn check(kind: CheckKind) -> Check {
        Check { kind, error_message: None }
    }

    fn context() -> ExecutionContext {
        let mut inputs = Map::new();
        inputs.insert("dir".into(), json!("out"));
        let mut ctx = ExecutionContext::new(inputs);
        ctx.record(StepResult {
            step_id: "build".into(),
            kind: StepKindName::Shell,
            status: StepStatus::Succeeded,
            exit_code: Some(0),
            stdout: "Compiled 3 crates\n".into(),
            stderr: String::new(),
            output: None,
            error: None,
            started_at: Utc::now(),
            duration_ms: 5,
            attempts: 1,
        })
        .unwrap();
        ctx.record(StepResult {
            step_id: "pick".into(),
            kind: StepKindName::AgentDecision,
            status: StepStatus::Succeeded,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            output: Some(json!("postgres")),
            error: None,
            started_at: Utc::now(),
            duration_ms: 1,
            attempts: 1,
        })
        .unwrap();
        ctx
    }

    fn services() -> (ServiceContext, ScriptedShell) {
        let fs = MemFileSystem::new();
        fs.insert("/ws/out/report.json", r#"{"ok": true}"#);
        fs.insert("/ws/out/broken.json", "{");
        let shell = ScriptedShell::new().on("false", Reply::exit(1, ""));
        let ctx = ServiceContext {
            fs: Box::new(fs),
            env: Box::new(
                ScriptedEnvironment::new().with_executable("git").with_var("HOME", "/home/me"),
            ),
            shell: Box::new(shell.clone()),
            ..ServiceContext::scripted()
        };
        (ctx, shell)
    }

    async fn passes(kind: CheckKind) -> bool {
        let (services, _) = services();
        Checker::new(&services, Path::new("/ws")).evaluate(&check(kind), &context()).await.passed
    }

    #[tokio::test]
    async fn filesystem_checks_resolve_against_the_workspace() {
        assert!(passes(CheckKind::FileExists { path: "{{dir}}/report.json".into() }).await);
        assert!(!passes(CheckKind::FileExists { path: "{{dir}}".into() }).await);
        assert!(passes(CheckKind::DirExists { path: "out".into() }).await);
        assert!(
            passes(CheckKind::PathExists { base: Some("{{dir}}".into()), path: "report.json".into() })
                .await
        );
        assert!(!passes(CheckKind::PathExists { base: None, path: "missing".into() }).await);
    }

    #[tokio::test]
    async fn environment_checks() {
        assert!(passes(CheckKind::CommandExists { name: "git".into() }).await);
        assert!(!passes(CheckKind::CommandExists { name: "docker".into() }).await);
        assert!(passes(CheckKind::EnvVarSet { name: "HOME".into() }).await);
        assert!(!passes(CheckKind::EnvVarSet { name: "CI".into() }).await);
    }

    #[tokio::test]
    async fn json_validity() {
        assert!(passes(CheckKind::JsonValid { path: "out/report.json".into() }).await);
        assert!(!passes(CheckKind::JsonValid { path: "out/broken.json".into() }).await);
        assert!(!passes(CheckKind::JsonValid { path: "out/none.json".into() }).await);
    }

    #[tokio::test]
    async fn exit_code_check_runs_in_workspace() {
        let (services, shell) = services();
        let checker = Checker::new(&services, Path::new("/ws"));
        let ok = checker
            .evaluate(&check(CheckKind::ExitCodeEquals { command: "true".into(), expect: 0 }), &context())
            .await;
        let bad = checker
            .evaluate(&check(CheckKind::ExitCodeEquals { command: "false".into(), expect: 0 }), &context())
            .await;

        assert!(ok.passed);
        assert!(!bad.passed);
        assert!(bad.message.contains("exited 1, expected 0"));
        assert_eq!(shell.calls()[0].working_dir.as_deref(), Some(Path::new("/ws")));
    }

    #[tokio::test]
    async fn step_result_checks() {
        assert!(passes(CheckKind::StepExitCode { step: "build".into(), expect: 0 }).await);
        assert!(!passes(CheckKind::StepExitCode { step: "build".into(), expect: 2 }).await);
        assert!(
            passes(CheckKind::StepOutputContains { step: "build".into(), needle: "3 crates".into() })
                .await
        );
        assert!(!passes(CheckKind::StepOutputContains { step: "lint".into(), needle: "x".into() }).await);
    }

    #[tokio::test]
    async fn output_contains_reads_the_value_of_decision_steps() {
        let contains = |needle: &str| CheckKind::StepOutputContains {
            step: "pick".into(),
            needle: needle.into(),
        };
        assert!(passes(contains("postgres")).await);
        assert!(!passes(contains("sqlite")).await);
    }

    #[tokio::test]
    async fn custom_error_message_replaces_diagnostic_on_failure() {
        let (services, _) = services();
        let check = Check {
            kind: CheckKind::CommandExists { name: "docker".into() },
            error_message: Some("install Docker first".into()),
        };
        let outcome = Checker::new(&services, Path::new("/ws")).evaluate(&check, &context()).await;
        assert_eq!(outcome.message, "install Docker first");
        assert_eq!(outcome.check, "command_exists docker");
    }
}
