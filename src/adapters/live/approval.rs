//! Live approval channels: an interactive terminal prompt and `--yes`.

use std::io::{BufRead, Write};

use serde_json::{Map, Value};

use crate::ports::{Approval, ApprovalChannel, ApprovalFuture, ApprovalRequest, PortError};

/// Prompts on stderr and reads the answer from stdin.
///
/// Accepted answers: `y`, `n [reason]`, `m key=value ...`. Values in a
/// modify answer are parsed as JSON when possible, else taken as strings.
pub struct TerminalApproval;

impl ApprovalChannel for TerminalApproval {
    fn request(&self, request: &ApprovalRequest) -> ApprovalFuture<'_> {
        let request = request.clone();
        Box::pin(async move {
            let line = tokio::task::spawn_blocking(move || -> std::io::Result<Option<String>> {
                let mut stderr = std::io::stderr().lock();
                writeln!(stderr, "[{}] {} / {}", request.reason, request.task, request.step_id)?;
                writeln!(stderr, "  {}", request.message)?;
                write!(stderr, "approve [y], reject [n <reason>], modify [m key=value ...]: ")?;
                stderr.flush()?;
                let mut line = String::new();
                let read = std::io::stdin().lock().read_line(&mut line)?;
                Ok((read > 0).then_some(line))
            })
            .await??;
            let line = line.ok_or("approval channel closed (end of input)")?;
            Ok::<_, PortError>(parse_answer(&line))
        })
    }
}

/// Approves everything without asking.
pub struct AutoApprove;

impl ApprovalChannel for AutoApprove {
    fn request(&self, request: &ApprovalRequest) -> ApprovalFuture<'_> {
        tracing::info!(step = %request.step_id, reason = %request.reason, "auto-approved");
        Box::pin(async { Ok::<_, PortError>(Approval::Approve) })
    }
}

/// Interprets one line typed by the approver.
#[must_use]
pub fn parse_answer(line: &str) -> Approval {
    let line = line.trim();
    let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    match head.to_ascii_lowercase().as_str() {
        "y" | "yes" | "approve" => Approval::Approve,
        "m" | "modify" => {
            let mut inputs = Map::new();
            for pair in rest.split_whitespace() {
                if let Some((key, raw)) = pair.split_once('=') {
                    let value = serde_json::from_str(raw)
                        .unwrap_or_else(|_| Value::String(raw.to_string()));
                    inputs.insert(key.to_string(), value);
                }
            }
            Approval::Modify { inputs }
        }
        "n" | "no" | "reject" => {
            Approval::Reject { reason: (!rest.is_empty()).then(|| rest.to_string()) }
        }
        _ => Approval::Reject { reason: Some(format!("unrecognized answer `{line}`")) },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_approve_and_reject() {
        assert_eq!(parse_answer("y\n"), Approval::Approve);
        assert_eq!(parse_answer("n"), Approval::Reject { reason: None });
        assert_eq!(
            parse_answer("no   not today "),
            Approval::Reject { reason: Some("not today".into()) }
        );
    }

    #[test]
    fn parses_modify_values_as_json_when_possible() {
        let Approval::Modify { inputs } = parse_answer("m name=demo port=8080 flags=[1,2]") else {
            panic!("expected modify");
        };
        assert_eq!(inputs["name"], json!("demo"));
        assert_eq!(inputs["port"], json!(8080));
        assert_eq!(inputs["flags"], json!([1, 2]));
    }

    #[test]
    fn unknown_answers_reject() {
        assert!(matches!(parse_answer("maybe"), Approval::Reject { reason: Some(_) }));
    }
}
