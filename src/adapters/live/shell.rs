//! Live process executor using `tokio::process`.

use std::process::Stdio;

use tokio::process::Command;

use crate::ports::{CommandRequest, PortError, ShellExecutor, ShellFuture, ShellOutput};

/// Spawns real child processes.
///
/// Children are killed when the future is dropped, so an elapsed
/// `tokio::time::timeout` terminates the process.
pub struct LiveShellExecutor;

impl ShellExecutor for LiveShellExecutor {
    fn run(&self, request: &CommandRequest) -> ShellFuture<'_> {
        let request = request.clone();
        Box::pin(async move {
            let mut cmd = Command::new(&request.program);
            cmd.args(&request.args)
                .envs(&request.env)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);
            if let Some(dir) = &request.working_dir {
                cmd.current_dir(dir);
            }
            let output = cmd
                .output()
                .await
                .map_err(|e| format!("failed to spawn `{}`: {e}", request.program))?;
            Ok::<_, PortError>(ShellOutput {
                exit_code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::{Duration, Instant};

    use super::*;

    #[tokio::test]
    async fn runs_echo_command() {
        let result = LiveShellExecutor.run(&CommandRequest::shell("echo hello")).await.unwrap();

        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout.trim(), "hello");
        assert!(result.stderr.is_empty());
    }

    #[tokio::test]
    async fn captures_exit_code_and_stderr() {
        let result =
            LiveShellExecutor.run(&CommandRequest::shell("echo oops >&2; exit 42")).await.unwrap();

        assert_eq!(result.exit_code, 42);
        assert_eq!(result.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn applies_env_and_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let request = CommandRequest::shell("echo $GREETING; pwd")
            .in_dir(dir.path().to_path_buf())
            .with_env(BTreeMap::from([("GREETING".to_string(), "hi".to_string())]));
        let result = LiveShellExecutor.run(&request).await.unwrap();

        let mut lines = result.stdout.lines();
        assert_eq!(lines.next(), Some("hi"));
        let pwd = std::fs::canonicalize(lines.next().unwrap()).unwrap();
        assert_eq!(pwd, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[tokio::test]
    async fn dropping_the_future_stops_the_child() {
        let started = Instant::now();
        let run = LiveShellExecutor.run(&CommandRequest::shell("sleep 10"));
        let outcome = tokio::time::timeout(Duration::from_millis(200), run).await;

        assert!(outcome.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_program_is_an_error() {
        let request = CommandRequest::script("definitely-not-a-real-interpreter", "1");
        assert!(LiveShellExecutor.run(&request).await.is_err());
    }
}
