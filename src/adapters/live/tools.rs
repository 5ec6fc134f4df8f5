//! Live external tools configured in `skillrun.yaml`.

use std::collections::BTreeMap;
use std::process::Stdio;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::ToolConfig;
use crate::ports::{ExternalTools, PortError, ToolCall, ToolFuture, ToolResult};

/// Dispatches calls to command or HTTP tools by name.
pub struct ConfiguredTools {
    tools: BTreeMap<String, ToolConfig>,
    client: Client,
}

impl ConfiguredTools {
    /// Creates a dispatcher over the configured tools.
    #[must_use]
    pub fn new(tools: BTreeMap<String, ToolConfig>) -> Self {
        Self { tools, client: Client::new() }
    }
}

/// Body sent to a tool: on stdin for commands, as the POST body for HTTP.
#[derive(Serialize)]
struct ToolRequest<'a> {
    tool: &'a str,
    args: &'a BTreeMap<String, String>,
}

impl ExternalTools for ConfiguredTools {
    fn invoke(&self, call: &ToolCall) -> ToolFuture<'_> {
        let call = call.clone();
        let config = self.tools.get(&call.tool).cloned();
        Box::pin(async move {
            let config = config.ok_or_else(|| -> PortError {
                format!("unknown tool `{}`; declare it under `tools` in skillrun.yaml", call.tool)
                    .into()
            })?;
            let body = serde_json::to_vec(&ToolRequest { tool: &call.tool, args: &call.args })?;
            match config {
                ToolConfig::Command { command } => run_command(&command, &body).await,
                ToolConfig::Http { url } => self.post(&url, body).await,
            }
        })
    }
}

impl ConfiguredTools {
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<ToolResult, PortError> {
        let response = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| format!("tool request to {url} failed: {e}"))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| format!("failed to read tool response from {url}: {e}"))?;
        Ok(ToolResult { success: status.is_success(), output: parse_output(&text) })
    }
}

async fn run_command(command: &str, body: &[u8]) -> Result<ToolResult, PortError> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("failed to spawn tool `{command}`: {e}"))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(body).await?;
    }
    let output = child.wait_with_output().await?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(ToolResult { success: output.status.success(), output: parse_output(&stdout) })
}

/// Tool output as JSON when it parses, else as a trimmed string.
fn parse_output(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn call(tool: &str) -> ToolCall {
        ToolCall { tool: tool.into(), args: BTreeMap::from([("q".into(), "rust".into())]) }
    }

    #[tokio::test]
    async fn command_tool_receives_call_on_stdin() {
        let tools = ConfiguredTools::new(BTreeMap::from([(
            "echo".to_string(),
            ToolConfig::Command { command: "cat".into() },
        )]));
        let result = tools.invoke(&call("echo")).await.unwrap();

        assert!(result.success);
        assert_eq!(result.output, json!({"tool": "echo", "args": {"q": "rust"}}));
    }

    #[tokio::test]
    async fn failing_command_is_unsuccessful() {
        let tools = ConfiguredTools::new(BTreeMap::from([(
            "broken".to_string(),
            ToolConfig::Command { command: "echo nope; exit 3".into() },
        )]));
        let result = tools.invoke(&call("broken")).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.output, json!("nope"));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let tools = ConfiguredTools::new(BTreeMap::new());
        let err = tools.invoke(&call("missing")).await.unwrap_err();
        assert!(err.to_string().contains("unknown tool `missing`"));
    }
}
