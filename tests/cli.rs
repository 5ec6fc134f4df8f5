//! Integration tests for top-level CLI behavior.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tempfile::TempDir;

fn run_skillrun(workspace: &Path, args: &[&str]) -> Output {
    let bin = env!("CARGO_BIN_EXE_skillrun");
    Command::new(bin)
        .args(args)
        .arg("--workspace")
        .arg(workspace)
        .current_dir(workspace)
        .env_remove("SKILLRUN_WORKSPACE")
        .env_remove("SKILLRUN_SKILLS_DIR")
        .env_remove("SKILLRUN_LOG_DIR")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run skillrun binary")
}

fn write_skill(workspace: &Path, definition: &Value) {
    let name = definition["name"].as_str().unwrap();
    let dir = workspace.join("skills").join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("skill.json"), serde_json::to_string_pretty(definition).unwrap()).unwrap();
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn records(workspace: &Path, task: &str) -> Vec<PathBuf> {
    let root = workspace.join(".skillrun/logs").join(task);
    let Ok(versions) = fs::read_dir(&root) else { return Vec::new() };
    let mut files = Vec::new();
    for version in versions {
        for file in fs::read_dir(version.unwrap().path()).unwrap() {
            files.push(file.unwrap().path());
        }
    }
    files
}

fn read_record(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn make_file_skill() -> Value {
    json!({
        "name": "make-file",
        "version": "1.0.0",
        "description": "Write a greeting to a file",
        "autonomy": "delegated",
        "inputs": {
            "file": {"type": "string", "required": true},
            "greeting": {"type": "string", "default": "hello"},
            "api_token": {"type": "string", "default": "s3cret"}
        },
        "preconditions": [{"check": "command_exists", "args": ["sh"]}],
        "steps": [
            {"id": "write", "type": "shell", "cmd": "echo {{greeting}} > {{file}}"},
            {"id": "read", "type": "shell", "cmd": "cat {{file}}"}
        ],
        "verification": [
            {"type": "file_exists", "args": ["{{file}}"]},
            {"type": "step_output_contains", "args": ["read", "{{greeting}}"]}
        ],
        "rollback": [{"id": "remove", "cmd": "rm -f {{file}}", "undoes": "write"}]
    })
}

#[test]
fn help_lists_subcommands() {
    let ws = TempDir::new().unwrap();
    let output = run_skillrun(ws.path(), &["--help"]);
    assert!(output.status.success());
    let text = stdout(&output);
    for command in ["list", "info", "execute", "history"] {
        assert!(text.contains(command), "missing {command} in help");
    }
}

#[test]
fn invalid_subcommand_exits_with_error() {
    let ws = TempDir::new().unwrap();
    let output = run_skillrun(ws.path(), &["teleport"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn list_with_empty_workspace() {
    let ws = TempDir::new().unwrap();
    let output = run_skillrun(ws.path(), &["list"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("No skills found"));
}

#[test]
fn list_shows_valid_skills_and_warns_about_invalid_ones() {
    let ws = TempDir::new().unwrap();
    write_skill(ws.path(), &make_file_skill());
    write_skill(ws.path(), &json!({"name": "broken", "version": "1.0.0"}));

    let output = run_skillrun(ws.path(), &["list"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("make-file"));
    assert!(stdout(&output).contains("1 skill(s) total."));
    assert!(stderr(&output).contains("broken"));
}

#[test]
fn info_summarizes_a_skill() {
    let ws = TempDir::new().unwrap();
    write_skill(ws.path(), &make_file_skill());

    let output = run_skillrun(ws.path(), &["info", "make-file"]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Skill: make-file"));
    assert!(text.contains("1. write [shell]"));
    assert!(text.contains("remove: rm -f {{file}} (undoes write)"));
}

#[test]
fn info_on_unknown_skill_fails() {
    let ws = TempDir::new().unwrap();
    let output = run_skillrun(ws.path(), &["info", "nope"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("skill `nope` not found"));
}

#[test]
fn execute_runs_steps_and_writes_a_redacted_record() {
    let ws = TempDir::new().unwrap();
    write_skill(ws.path(), &make_file_skill());

    let output =
        run_skillrun(ws.path(), &["execute", "make-file", "--inputs", r#"{"file": "out.txt"}"#]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(fs::read_to_string(ws.path().join("out.txt")).unwrap(), "hello\n");
    let files = records(ws.path(), "make-file");
    assert_eq!(files.len(), 1);
    let record = read_record(&files[0]);
    assert_eq!(record["success"], json!(true));
    assert_eq!(record["steps"].as_array().unwrap().len(), 2);
    assert_eq!(record["inputs"]["api_token"], json!("[REDACTED]"));
    assert_eq!(record["inputs"]["greeting"], json!("hello"));
}

#[test]
fn failing_step_rolls_back_and_exits_three() {
    let ws = TempDir::new().unwrap();
    write_skill(
        ws.path(),
        &json!({
            "name": "half-done",
            "version": "0.1.0",
            "autonomy": "delegated",
            "steps": [
                {"id": "create", "type": "shell", "cmd": "touch created"},
                {"id": "explode", "type": "shell", "cmd": "exit 3"},
                {"id": "never", "type": "shell", "cmd": "touch never"}
            ],
            "rollback": [
                {"id": "undo-create", "cmd": "rm created", "undoes": "create"},
                {"id": "undo-never", "cmd": "rm never", "undoes": "never"}
            ]
        }),
    );

    let output = run_skillrun(ws.path(), &["execute", "half-done"]);

    assert_eq!(output.status.code(), Some(3));
    assert!(!ws.path().join("created").exists());
    assert!(!ws.path().join("never").exists());
    let record = read_record(&records(ws.path(), "half-done")[0]);
    assert_eq!(record["failure"]["kind"], json!("step"));
    assert_eq!(record["failure"]["step"], json!("explode"));
    assert_eq!(record["rollback"][0]["id"], json!("undo-never"));
    assert_eq!(record["rollback"][0]["status"], json!("skipped"));
    assert_eq!(record["rollback"][1]["status"], json!("succeeded"));
}

#[test]
fn failed_precondition_exits_two_without_running_steps() {
    let ws = TempDir::new().unwrap();
    write_skill(
        ws.path(),
        &json!({
            "name": "needs-tool",
            "version": "1.0.0",
            "autonomy": "delegated",
            "preconditions": [
                {"check": "command_exists", "args": ["definitely-not-installed-xyz"]}
            ],
            "steps": [{"id": "touch", "type": "shell", "cmd": "touch touched"}]
        }),
    );

    let output = run_skillrun(ws.path(), &["execute", "needs-tool"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(!ws.path().join("touched").exists());
    let record = read_record(&records(ws.path(), "needs-tool")[0]);
    assert_eq!(record["failure"]["kind"], json!("precondition"));
    assert_eq!(record["steps"], json!([]));
}

#[test]
fn failed_verification_exits_four() {
    let ws = TempDir::new().unwrap();
    write_skill(
        ws.path(),
        &json!({
            "name": "forgetful",
            "version": "1.0.0",
            "autonomy": "delegated",
            "steps": [{"id": "noop", "type": "shell", "cmd": "true"}],
            "verification": [{"type": "file_exists", "args": ["report.json"]}]
        }),
    );

    let output = run_skillrun(ws.path(), &["execute", "forgetful"]);

    assert_eq!(output.status.code(), Some(4));
    assert!(stdout(&output).contains("verification failed"));
}

#[test]
fn missing_required_input_exits_one() {
    let ws = TempDir::new().unwrap();
    write_skill(ws.path(), &make_file_skill());

    let output = run_skillrun(ws.path(), &["execute", "make-file"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("missing required input `file`"));
}

#[test]
fn malformed_inputs_json_exits_one() {
    let ws = TempDir::new().unwrap();
    write_skill(ws.path(), &make_file_skill());

    let output = run_skillrun(ws.path(), &["execute", "make-file", "--inputs", "{not json"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(records(ws.path(), "make-file").is_empty());
}

#[test]
fn dry_run_is_deterministic_and_side_effect_free() {
    let ws = TempDir::new().unwrap();
    write_skill(ws.path(), &make_file_skill());
    let args = ["execute", "make-file", "--inputs", r#"{"file": "out.txt"}"#, "--dry-run"];

    let first = run_skillrun(ws.path(), &args);
    let second = run_skillrun(ws.path(), &args);

    assert!(first.status.success(), "stderr: {}", stderr(&first));
    assert_eq!(first.stdout, second.stdout);
    let plan: Value = serde_json::from_slice(&first.stdout).unwrap();
    assert_eq!(plan["steps"][0]["resolved"]["cmd"], json!("echo hello > out.txt"));
    assert_eq!(plan["inputs"]["api_token"], json!("[REDACTED]"));
    assert!(!ws.path().join("out.txt").exists());
    assert!(!ws.path().join(".skillrun").exists());
}

#[test]
fn step_timeout_stops_the_process() {
    let ws = TempDir::new().unwrap();
    write_skill(
        ws.path(),
        &json!({
            "name": "slow",
            "version": "1.0.0",
            "autonomy": "delegated",
            "steps": [{"id": "nap", "type": "shell", "cmd": "sleep 10", "timeout": 1}]
        }),
    );

    let start = Instant::now();
    let output = run_skillrun(ws.path(), &["execute", "slow"]);

    assert_eq!(output.status.code(), Some(3));
    assert!(start.elapsed() < Duration::from_secs(8));
    let record = read_record(&records(ws.path(), "slow")[0]);
    assert_eq!(record["failure"]["kind"], json!("timeout"));
    assert_eq!(record["steps"][0]["status"], json!("timed_out"));
}

#[test]
fn checkpoint_without_a_terminal_fails_and_yes_approves() {
    let ws = TempDir::new().unwrap();
    write_skill(
        ws.path(),
        &json!({
            "name": "gated",
            "version": "1.0.0",
            "autonomy": "delegated",
            "steps": [
                {"id": "ask", "type": "checkpoint", "message": "Proceed?"},
                {"id": "go", "type": "shell", "cmd": "touch went"}
            ]
        }),
    );

    let closed_stdin = run_skillrun(ws.path(), &["execute", "gated"]);
    assert_eq!(closed_stdin.status.code(), Some(3));
    assert!(!ws.path().join("went").exists());

    let approved = run_skillrun(ws.path(), &["execute", "gated", "--yes"]);
    assert!(approved.status.success(), "stderr: {}", stderr(&approved));
    assert!(ws.path().join("went").exists());
}

#[test]
fn history_lists_previous_runs() {
    let ws = TempDir::new().unwrap();
    write_skill(ws.path(), &make_file_skill());
    run_skillrun(ws.path(), &["execute", "make-file", "--inputs", r#"{"file": "a.txt"}"#]);
    run_skillrun(ws.path(), &["execute", "make-file"]);

    let output = run_skillrun(ws.path(), &["history", "make-file"]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("make-file@1.0.0"));
    assert!(text.contains("succeeded"));
    assert!(text.contains("failed (input)"));
    assert!(text.contains("2 run(s) total."));
}

#[test]
fn config_file_moves_the_skills_dir() {
    let ws = TempDir::new().unwrap();
    fs::write(ws.path().join("skillrun.yaml"), "skills_dir: library\n").unwrap();
    let dir = ws.path().join("library/make-file");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("skill.json"), make_file_skill().to_string()).unwrap();

    let output = run_skillrun(ws.path(), &["list"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("make-file"));
}
