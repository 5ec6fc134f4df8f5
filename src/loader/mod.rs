//! Definition loader: parse and schema-validate a skill definition.
//!
//! Loading is pure. Nothing is executed; the only output is either a
//! [`TaskDefinition`] or a [`SchemaError`] naming the offending field path
//! (for example `steps[2].timeout`).

pub mod document;

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::definition::{
    Autonomy, Check, CheckKind, CheckpointStep, DecisionStep, ExecutionLimits, ExternalCallStep,
    InputSpec, InputType, RollbackAction, ScriptedStep, ShellStep, Step, StepKind, StepKindName,
    TaskDefinition, CHECK_KINDS, DEFAULT_INTERPRETER, DEFAULT_ROLLBACK_TIMEOUT,
    DEFAULT_STEP_TIMEOUT,
};
use crate::template::{self, Reference};
use document::{PreconditionDocument, RollbackDocument, StepDocument, VerificationDocument};

const TOP_LEVEL_FIELDS: &[&str] = &[
    "name",
    "version",
    "description",
    "autonomy",
    "context_refs",
    "preconditions",
    "inputs",
    "steps",
    "verification",
    "rollback",
    "metadata",
];

/// A structural problem in a definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("schema error at `{path}`: {message}")]
pub struct SchemaError {
    /// Field path, `$` for the document root.
    pub path: String,
    /// What is wrong.
    pub message: String,
}

impl SchemaError {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { path: path.into(), message: message.into() }
    }
}

/// Serialization format of a definition file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// JSON (`skill.json`).
    Json,
    /// YAML (`skill.yaml` / `skill.yml`).
    Yaml,
}

impl Format {
    /// Picks the format from a file extension, defaulting to JSON.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Self::Yaml,
            _ => Self::Json,
        }
    }
}

/// Parses and validates a definition from text.
///
/// # Errors
///
/// Returns a [`SchemaError`] if the text does not parse or fails validation.
pub fn load_str(text: &str, format: Format) -> Result<TaskDefinition, SchemaError> {
    let value: Value = match format {
        Format::Json => serde_json::from_str(text)
            .map_err(|e| SchemaError::new("$", format!("invalid JSON: {e}")))?,
        Format::Yaml => serde_yaml::from_str(text)
            .map_err(|e| SchemaError::new("$", format!("invalid YAML: {e}")))?,
    };
    load_value(value)
}

/// Validates an already-parsed definition document.
///
/// # Errors
///
/// Returns a [`SchemaError`] describing the first problem found.
pub fn load_value(value: Value) -> Result<TaskDefinition, SchemaError> {
    let Value::Object(mut doc) = value else {
        return Err(SchemaError::new("$", "definition must be an object"));
    };
    if let Some(unknown) = doc.keys().find(|key| !TOP_LEVEL_FIELDS.contains(&key.as_str())) {
        return Err(SchemaError::new(unknown.clone(), "unknown field"));
    }

    let name: String = required(&mut doc, "name")?;
    validate_name(&name)?;
    let version: String = required(&mut doc, "version")?;
    validate_version(&version)?;
    let description: String = optional(&mut doc, "description")?.unwrap_or_default();
    let autonomy: Autonomy = required::<String>(&mut doc, "autonomy")?
        .parse()
        .map_err(|message: String| SchemaError::new("autonomy", message))?;
    let context_refs: Vec<String> = optional(&mut doc, "context_refs")?.unwrap_or_default();
    let metadata: Map<String, Value> = optional(&mut doc, "metadata")?.unwrap_or_default();

    let inputs = load_inputs(optional(&mut doc, "inputs")?.unwrap_or_default())?;

    let step_docs: Vec<StepDocument> = elements(required(&mut doc, "steps")?, "steps")?;
    if step_docs.is_empty() {
        return Err(SchemaError::new("steps", "at least one step is required"));
    }
    let steps = load_steps(step_docs)?;

    let preconditions = elements::<PreconditionDocument>(
        optional(&mut doc, "preconditions")?.unwrap_or_default(),
        "preconditions",
    )?
    .into_iter()
    .enumerate()
    .map(|(i, d)| {
        let path = format!("preconditions[{i}]");
        let kind = load_check_kind(&d.check, d.args, d.expect, &path, "check")?;
        if kind.reads_step_results() {
            return Err(SchemaError::new(
                format!("{path}.check"),
                format!("`{}` is only valid in verification", kind.name()),
            ));
        }
        Ok(Check { kind, error_message: d.error_message })
    })
    .collect::<Result<Vec<_>, _>>()?;

    let verification = elements::<VerificationDocument>(
        optional(&mut doc, "verification")?.unwrap_or_default(),
        "verification",
    )?
    .into_iter()
    .enumerate()
    .map(|(i, d)| {
        let path = format!("verification[{i}]");
        let kind = load_check_kind(&d.kind, d.args, d.expect, &path, "type")?;
        if let Some(step) = kind.referenced_step() {
            if !steps.iter().any(|s| s.id == step) {
                return Err(SchemaError::new(
                    format!("{path}.args[0]"),
                    format!("unknown step `{step}`"),
                ));
            }
        }
        Ok(Check { kind, error_message: d.error_message })
    })
    .collect::<Result<Vec<_>, _>>()?;

    let rollback = load_rollback(
        elements(optional(&mut doc, "rollback")?.unwrap_or_default(), "rollback")?,
        &steps,
    )?;

    let def = TaskDefinition {
        name,
        version,
        description,
        autonomy,
        context_refs,
        preconditions,
        inputs,
        steps,
        verification,
        rollback,
        metadata,
    };
    validate_templates(&def)?;
    Ok(def)
}

fn required<T: DeserializeOwned>(doc: &mut Map<String, Value>, key: &str) -> Result<T, SchemaError> {
    optional(doc, key)?.ok_or_else(|| SchemaError::new(key, "required field is missing"))
}

fn optional<T: DeserializeOwned>(
    doc: &mut Map<String, Value>,
    key: &str,
) -> Result<Option<T>, SchemaError> {
    doc.remove(key)
        .map(|value| serde_json::from_value(value).map_err(|e| SchemaError::new(key, e.to_string())))
        .transpose()
}

fn elements<T: DeserializeOwned>(values: Vec<Value>, field: &str) -> Result<Vec<T>, SchemaError> {
    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            serde_json::from_value(value)
                .map_err(|e| SchemaError::new(format!("{field}[{i}]"), e.to_string()))
        })
        .collect()
}

fn validate_name(name: &str) -> Result<(), SchemaError> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SchemaError::new("name", "must be non-empty and use only letters, digits, `-`, `_`"))
    }
}

fn validate_version(version: &str) -> Result<(), SchemaError> {
    let (core, suffix) = match version.find(['-', '+']) {
        Some(at) => (&version[..at], Some(&version[at + 1..])),
        None => (version, None),
    };
    let parts: Vec<&str> = core.split('.').collect();
    let numeric = |p: &&str| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit());
    let suffix_ok = suffix.map_or(true, |s| {
        !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || ".-+".contains(c))
    });
    if parts.len() == 3 && parts.iter().all(numeric) && suffix_ok {
        Ok(())
    } else {
        Err(SchemaError::new("version", format!("`{version}` is not a semantic version")))
    }
}

fn load_inputs(raw: Map<String, Value>) -> Result<BTreeMap<String, InputSpec>, SchemaError> {
    let mut inputs = BTreeMap::new();
    for (name, value) in raw {
        let path = format!("inputs.{name}");
        if !template::is_identifier(&name) {
            return Err(SchemaError::new(path, "input names must be identifiers"));
        }
        let spec: InputSpec =
            serde_json::from_value(value).map_err(|e| SchemaError::new(&path, e.to_string()))?;
        if spec.input_type == InputType::Enum && spec.allowed.is_empty() {
            return Err(SchemaError::new(
                format!("{path}.enum"),
                "enum inputs must list their allowed values",
            ));
        }
        if let Some(default) = &spec.default {
            spec.check(default).map_err(|e| SchemaError::new(format!("{path}.default"), e))?;
        }
        inputs.insert(name, spec);
    }
    Ok(inputs)
}

fn load_steps(docs: Vec<StepDocument>) -> Result<Vec<Step>, SchemaError> {
    let mut seen = HashSet::new();
    let mut steps = Vec::with_capacity(docs.len());
    for (i, doc) in docs.into_iter().enumerate() {
        let path = format!("steps[{i}]");
        if !template::is_identifier(&doc.id) {
            return Err(SchemaError::new(format!("{path}.id"), "step ids must be identifiers"));
        }
        if !seen.insert(doc.id.clone()) {
            return Err(SchemaError::new(
                format!("{path}.id"),
                format!("duplicate step id `{}`", doc.id),
            ));
        }
        steps.push(load_step(doc, &path)?);
    }
    Ok(steps)
}

fn allowed_fields(kind: StepKindName) -> &'static [&'static str] {
    match kind {
        StepKindName::Shell => &["timeout", "retry", "cmd", "expect_exit", "working_dir", "env"],
        StepKindName::Scripted => {
            &["timeout", "retry", "code", "interpreter", "working_dir", "env"]
        }
        StepKindName::AgentDecision => &["timeout", "retry", "prompt", "options"],
        StepKindName::Checkpoint => &["message"],
        StepKindName::ExternalCall => &["timeout", "retry", "tool", "args"],
    }
}

fn load_step(doc: StepDocument, path: &str) -> Result<Step, SchemaError> {
    let kind_name = StepKindName::parse(&doc.kind).ok_or_else(|| {
        SchemaError::new(
            format!("{path}.type"),
            format!(
                "unknown step type `{}`, expected one of shell, scripted, agent_decision, \
                 checkpoint, external_call",
                doc.kind
            ),
        )
    })?;
    let allowed = allowed_fields(kind_name);
    if let Some(field) = doc.present_payload_fields().into_iter().find(|f| !allowed.contains(f)) {
        return Err(SchemaError::new(
            format!("{path}.{field}"),
            format!("not allowed for {kind_name} steps"),
        ));
    }

    let limits = ExecutionLimits {
        timeout: match doc.timeout {
            Some(secs) => positive_duration(secs, &format!("{path}.timeout"))?,
            None => DEFAULT_STEP_TIMEOUT,
        },
        retry: doc.retry.unwrap_or(0),
    };
    let need = |value: Option<String>, field: &str| {
        value.ok_or_else(|| {
            SchemaError::new(format!("{path}.{field}"), format!("required for {kind_name} steps"))
        })
    };

    let kind = match kind_name {
        StepKindName::Shell => StepKind::Shell(ShellStep {
            cmd: need(doc.cmd, "cmd")?,
            expect_exit: doc.expect_exit.unwrap_or(0),
            working_dir: doc.working_dir,
            env: doc.env.unwrap_or_default(),
            limits,
        }),
        StepKindName::Scripted => StepKind::Scripted(ScriptedStep {
            code: need(doc.code, "code")?,
            interpreter: doc.interpreter.unwrap_or_else(|| DEFAULT_INTERPRETER.to_string()),
            working_dir: doc.working_dir,
            env: doc.env.unwrap_or_default(),
            limits,
        }),
        StepKindName::AgentDecision => StepKind::AgentDecision(DecisionStep {
            prompt: need(doc.prompt, "prompt")?,
            options: doc.options.unwrap_or_default(),
            limits,
        }),
        StepKindName::Checkpoint => {
            let message = need(doc.message, "message")?;
            if message.trim().is_empty() {
                return Err(SchemaError::new(
                    format!("{path}.message"),
                    "checkpoint message must not be empty",
                ));
            }
            StepKind::Checkpoint(CheckpointStep { message })
        }
        StepKindName::ExternalCall => StepKind::ExternalCall(ExternalCallStep {
            tool: need(doc.tool, "tool")?,
            args: doc.args.unwrap_or_default(),
            limits,
        }),
    };
    Ok(Step { id: doc.id, description: doc.description, major: doc.major, kind })
}

fn positive_duration(secs: f64, path: &str) -> Result<Duration, SchemaError> {
    if secs > 0.0 {
        if let Ok(duration) = Duration::try_from_secs_f64(secs) {
            return Ok(duration);
        }
    }
    Err(SchemaError::new(path, "must be a positive number of seconds"))
}

fn load_check_kind(
    kind: &str,
    args: Vec<String>,
    expect: Option<i32>,
    path: &str,
    kind_field: &str,
) -> Result<CheckKind, SchemaError> {
    let arity = |expected: &[usize]| -> Result<(), SchemaError> {
        if expected.contains(&args.len()) {
            Ok(())
        } else {
            let counts: Vec<String> = expected.iter().map(ToString::to_string).collect();
            Err(SchemaError::new(
                format!("{path}.args"),
                format!("`{kind}` takes {} argument(s), got {}", counts.join(" or "), args.len()),
            ))
        }
    };
    let takes_expect = matches!(kind, "exit_code_equals" | "step_exit_code");
    if expect.is_some() && !takes_expect {
        return Err(SchemaError::new(format!("{path}.expect"), format!("not allowed for `{kind}`")));
    }
    match kind {
        "command_exists" | "file_exists" | "dir_exists" | "env_var_set" | "json_valid"
        | "exit_code_equals" | "step_exit_code" => arity(&[1])?,
        "path_exists" => arity(&[1, 2])?,
        "step_output_contains" => arity(&[2])?,
        other => {
            return Err(SchemaError::new(
                format!("{path}.{kind_field}"),
                format!("unknown check `{other}`, expected one of {}", CHECK_KINDS.join(", ")),
            ))
        }
    }
    let expect = expect.unwrap_or(0);
    let mut args = args.into_iter();
    let first = args.next().unwrap_or_default();
    let second = args.next();
    Ok(match kind {
        "command_exists" => CheckKind::CommandExists { name: first },
        "file_exists" => CheckKind::FileExists { path: first },
        "dir_exists" => CheckKind::DirExists { path: first },
        "env_var_set" => CheckKind::EnvVarSet { name: first },
        "json_valid" => CheckKind::JsonValid { path: first },
        "exit_code_equals" => CheckKind::ExitCodeEquals { command: first, expect },
        "step_exit_code" => CheckKind::StepExitCode { step: first, expect },
        "step_output_contains" => {
            CheckKind::StepOutputContains { step: first, needle: second.unwrap_or_default() }
        }
        _ => match second {
            Some(path) => CheckKind::PathExists { base: Some(first), path },
            None => CheckKind::PathExists { base: None, path: first },
        },
    })
}

fn load_rollback(
    docs: Vec<RollbackDocument>,
    steps: &[Step],
) -> Result<Vec<RollbackAction>, SchemaError> {
    let mut seen = HashSet::new();
    docs.into_iter()
        .enumerate()
        .map(|(i, doc)| {
            let path = format!("rollback[{i}]");
            if !seen.insert(doc.id.clone()) {
                return Err(SchemaError::new(
                    format!("{path}.id"),
                    format!("duplicate rollback id `{}`", doc.id),
                ));
            }
            if let Some(step) = &doc.undoes {
                if !steps.iter().any(|s| &s.id == step) {
                    return Err(SchemaError::new(
                        format!("{path}.undoes"),
                        format!("unknown step `{step}`"),
                    ));
                }
            }
            let timeout = match doc.timeout {
                Some(secs) => positive_duration(secs, &format!("{path}.timeout"))?,
                None => DEFAULT_ROLLBACK_TIMEOUT,
            };
            Ok(RollbackAction {
                id: doc.id,
                description: doc.description,
                cmd: doc.cmd,
                working_dir: doc.working_dir,
                timeout,
                undoes: doc.undoes,
            })
        })
        .collect()
}

/// Where step references are legal for a template.
#[derive(Clone, Copy)]
enum StepScope {
    /// No step has run yet (preconditions).
    None,
    /// Only steps declared before index `n`.
    Before(usize),
    /// Any declared step (verification, rollback).
    Any,
}

fn validate_templates(def: &TaskDefinition) -> Result<(), SchemaError> {
    for (i, check) in def.preconditions.iter().enumerate() {
        for (j, text) in check.kind.templates().into_iter().enumerate() {
            check_template(def, text, &format!("preconditions[{i}].args[{j}]"), StepScope::None)?;
        }
    }
    for (i, step) in def.steps.iter().enumerate() {
        for (field, text) in step.templates() {
            check_template(def, text, &format!("steps[{i}].{field}"), StepScope::Before(i))?;
        }
    }
    for (i, check) in def.verification.iter().enumerate() {
        let offset = usize::from(check.kind.referenced_step().is_some());
        for (j, text) in check.kind.templates().into_iter().enumerate() {
            let path = format!("verification[{i}].args[{}]", j + offset);
            check_template(def, text, &path, StepScope::Any)?;
        }
    }
    for (i, action) in def.rollback.iter().enumerate() {
        check_template(def, &action.cmd, &format!("rollback[{i}].cmd"), StepScope::Any)?;
        if let Some(dir) = &action.working_dir {
            check_template(def, dir, &format!("rollback[{i}].working_dir"), StepScope::Any)?;
        }
    }
    Ok(())
}

fn check_template(
    def: &TaskDefinition,
    text: &str,
    path: &str,
    scope: StepScope,
) -> Result<(), SchemaError> {
    let references = template::references(text).map_err(|e| SchemaError::new(path, e.to_string()))?;
    for reference in references {
        match &reference {
            Reference::Input(name) => {
                if !def.inputs.contains_key(name) {
                    return Err(SchemaError::new(
                        path,
                        format!("template references undeclared input `{name}`"),
                    ));
                }
            }
            Reference::Step { step, .. } => {
                let position = def.steps.iter().position(|s| &s.id == step);
                let visible = match (scope, position) {
                    (_, None) | (StepScope::None, _) => false,
                    (StepScope::Before(limit), Some(index)) => index < limit,
                    (StepScope::Any, Some(_)) => true,
                };
                if !visible {
                    let message = match (scope, position) {
                        (_, None) => format!("template references unknown step `{step}`"),
                        (StepScope::None, _) => {
                            "step outputs are not available in preconditions".to_string()
                        }
                        _ => format!("template references step `{step}` which has not run yet"),
                    };
                    return Err(SchemaError::new(path, message));
                }
            }
        }
    }
    Ok(())
}
