//! Scripted process executor.

use std::sync::{Arc, Mutex};

use super::lock;
use crate::ports::{CommandRequest, PortError, ShellExecutor, ShellFuture, ShellOutput};

/// What a scripted command does.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Exit with this output.
    Output(ShellOutput),
    /// Never finish; only a timeout ends the call.
    Hang,
    /// Fail to spawn.
    SpawnError(String),
}

impl Reply {
    /// Exit with `exit_code` and `stdout`, empty stderr.
    #[must_use]
    pub fn exit(exit_code: i32, stdout: &str) -> Self {
        Self::Output(ShellOutput { exit_code, stdout: stdout.to_string(), stderr: String::new() })
    }
}

struct Rule {
    needle: String,
    reply: Reply,
    once: bool,
}

#[derive(Default)]
struct Script {
    rules: Vec<Rule>,
    calls: Vec<CommandRequest>,
}

/// Answers commands by substring rules and records every request.
///
/// One-shot rules are consumed when they match and take priority over
/// standing rules. Unmatched commands exit 0 with no output.
#[derive(Clone, Default)]
pub struct ScriptedShell {
    script: Arc<Mutex<Script>>,
}

impl ScriptedShell {
    /// Creates a shell where every command succeeds silently.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command containing `needle` replies with `reply`.
    #[must_use]
    pub fn on(self, needle: &str, reply: Reply) -> Self {
        self.push(needle, reply, false)
    }

    /// The next command containing `needle` replies with `reply`.
    #[must_use]
    pub fn once(self, needle: &str, reply: Reply) -> Self {
        self.push(needle, reply, true)
    }

    fn push(self, needle: &str, reply: Reply, once: bool) -> Self {
        lock(&self.script).rules.push(Rule { needle: needle.to_string(), reply, once });
        self
    }

    /// Every request received, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<CommandRequest> {
        lock(&self.script).calls.clone()
    }

    /// The command or code text of every request, in order.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        lock(&self.script).calls.iter().map(|call| call.payload().to_string()).collect()
    }

    fn reply_for(&self, request: &CommandRequest) -> Reply {
        let mut script = lock(&self.script);
        script.calls.push(request.clone());
        let payload = request.payload();
        let once = script.rules.iter().position(|r| r.once && payload.contains(&r.needle));
        if let Some(index) = once {
            return script.rules.remove(index).reply;
        }
        script
            .rules
            .iter()
            .find(|r| payload.contains(&r.needle))
            .map_or_else(|| Reply::exit(0, ""), |r| r.reply.clone())
    }
}

impl ShellExecutor for ScriptedShell {
    fn run(&self, request: &CommandRequest) -> ShellFuture<'_> {
        let reply = self.reply_for(request);
        Box::pin(async move {
            match reply {
                Reply::Output(output) => Ok::<_, PortError>(output),
                Reply::Hang => std::future::pending().await,
                Reply::SpawnError(message) => Err(message.into()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn one_shot_rules_win_then_expire() {
        let shell = ScriptedShell::new()
            .on("flaky", Reply::exit(0, "ok"))
            .once("flaky", Reply::exit(1, "first"));

        let first = shell.run(&CommandRequest::shell("run flaky")).await.unwrap();
        let second = shell.run(&CommandRequest::shell("run flaky")).await.unwrap();

        assert_eq!(first.exit_code, 1);
        assert_eq!(second.stdout, "ok");
        assert_eq!(shell.commands(), vec!["run flaky", "run flaky"]);
    }

    #[tokio::test]
    async fn unmatched_commands_succeed() {
        let shell = ScriptedShell::new();
        let output = shell.run(&CommandRequest::shell("true")).await.unwrap();
        assert_eq!(output.exit_code, 0);
    }
}
