//! Placeholder templates used in step payloads, checks, and rollback commands.
//!
//! A placeholder is written `{{name}}` for a declared input or
//! `{{steps.<id>.<field>}}` for a captured field of an earlier step, where
//! `<field>` is one of `stdout`, `stderr`, `exit_code`, or `output`.
//! Whitespace inside the braces is ignored. `\{{` produces a literal `{{`.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// A field captured from a completed step that templates may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepField {
    /// Captured standard output.
    Stdout,
    /// Captured standard error.
    Stderr,
    /// Process exit code.
    ExitCode,
    /// The step's primary output value (trimmed stdout, decision, tool result).
    Output,
}

impl StepField {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "stdout" => Some(Self::Stdout),
            "stderr" => Some(Self::Stderr),
            "exit_code" => Some(Self::ExitCode),
            "output" => Some(Self::Output),
            _ => None,
        }
    }

    /// The name used in template text.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::ExitCode => "exit_code",
            Self::Output => "output",
        }
    }
}

/// What a placeholder points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reference {
    /// A declared input value.
    Input(String),
    /// A captured field of a prior step.
    Step {
        /// Identifier of the referenced step.
        step: String,
        /// Which captured field to read.
        field: StepField,
    },
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input(name) => write!(f, "{name}"),
            Self::Step { step, field } => write!(f, "steps.{step}.{}", field.as_str()),
        }
    }
}

/// Errors raised while parsing or rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A `{{` without a matching `}}`.
    #[error("unterminated placeholder starting at byte {offset}")]
    Unterminated {
        /// Byte offset of the opening braces.
        offset: usize,
    },
    /// Placeholder text that is neither an input name nor a step reference.
    #[error("invalid placeholder `{{{{{body}}}}}`")]
    Invalid {
        /// The text between the braces.
        body: String,
    },
    /// A well-formed placeholder with no value in the current context.
    #[error("unresolved placeholder `{{{{{reference}}}}}`")]
    Unresolved {
        /// The reference that could not be resolved.
        reference: Reference,
    },
}

/// One parsed piece of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(Reference),
}

/// The outcome of looking up a reference in a [`Scope`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The reference has this rendered value.
    Value(String),
    /// The value is not known yet; render the canonical placeholder instead.
    Deferred,
    /// The reference has no value; rendering fails.
    Missing,
}

/// Supplies values for placeholders during rendering.
pub trait Scope {
    /// Looks up a reference.
    fn resolve(&self, reference: &Reference) -> Resolution;
}

/// Returns every reference used in `text`, in order of appearance.
///
/// # Errors
///
/// Returns an error if the text contains a malformed placeholder.
pub fn references(text: &str) -> Result<Vec<Reference>, TemplateError> {
    Ok(parse(text)?
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Placeholder(reference) => Some(reference),
            Segment::Literal(_) => None,
        })
        .collect())
}

/// Renders `text`, substituting every placeholder from `scope`.
///
/// # Errors
///
/// Returns an error if a placeholder is malformed or `scope` reports it missing.
pub fn render(text: &str, scope: &dyn Scope) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(text.len());
    for segment in parse(text)? {
        match segment {
            Segment::Literal(literal) => out.push_str(&literal),
            Segment::Placeholder(reference) => match scope.resolve(&reference) {
                Resolution::Value(value) => out.push_str(&value),
                Resolution::Deferred => {
                    out.push_str("{{");
                    out.push_str(&reference.to_string());
                    out.push_str("}}");
                }
                Resolution::Missing => return Err(TemplateError::Unresolved { reference }),
            },
        }
    }
    Ok(out)
}

/// Renders a JSON input value as template text.
///
/// Arrays are joined with single spaces; `null` has no textual form.
#[must_use]
pub fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Option<Vec<String>> = items.iter().map(render_value).collect();
            parts.map(|parts| parts.join(" "))
        }
        Value::Object(_) => Some(value.to_string()),
    }
}

fn parse(text: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = text;
    let mut offset = 0;

    while let Some(pos) = rest.find("{{") {
        if rest[..pos].ends_with('\\') {
            literal.push_str(&rest[..pos - 1]);
            literal.push_str("{{");
            offset += pos + 2;
            rest = &rest[pos + 2..];
            continue;
        }
        literal.push_str(&rest[..pos]);
        let after_open = &rest[pos + 2..];
        let Some(close) = after_open.find("}}") else {
            return Err(TemplateError::Unterminated { offset: offset + pos });
        };
        let body = &after_open[..close];
        let reference = parse_reference(body.trim())
            .ok_or_else(|| TemplateError::Invalid { body: body.to_string() })?;
        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Placeholder(reference));
        let consumed = pos + 2 + close + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn parse_reference(body: &str) -> Option<Reference> {
    if let Some(path) = body.strip_prefix("steps.") {
        let (step, field) = path.rsplit_once('.')?;
        if !is_identifier(step) {
            return None;
        }
        return Some(Reference::Step { step: step.to_string(), field: StepField::parse(field)? });
    }
    is_identifier(body).then(|| Reference::Input(body.to_string()))
}

/// Returns `true` for names usable as input or step identifiers.
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct MapScope(HashMap<String, String>);

    impl Scope for MapScope {
        fn resolve(&self, reference: &Reference) -> Resolution {
            self.0
                .get(&reference.to_string())
                .map_or(Resolution::Missing, |v| Resolution::Value(v.clone()))
        }
    }

    fn scope(pairs: &[(&str, &str)]) -> MapScope {
        MapScope(pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect())
    }

    #[test]
    fn renders_inputs_and_step_fields() {
        let s = scope(&[("name", "demo"), ("steps.build.stdout", "ok")]);
        let out = render("mkdir {{ name }} && echo {{steps.build.stdout}}", &s).unwrap();
        assert_eq!(out, "mkdir demo && echo ok");
    }

    #[test]
    fn missing_value_is_an_error_not_literal_text() {
        let err = render("echo {{project}}", &scope(&[])).unwrap_err();
        assert_eq!(
            err,
            TemplateError::Unresolved { reference: Reference::Input("project".into()) }
        );
    }

    #[test]
    fn lists_references_in_order() {
        let refs = references("{{a}} {{steps.s1.exit_code}} {{a}}").unwrap();
        assert_eq!(
            refs,
            vec![
                Reference::Input("a".into()),
                Reference::Step { step: "s1".into(), field: StepField::ExitCode },
                Reference::Input("a".into()),
            ]
        );
    }

    #[test]
    fn rejects_malformed_placeholders() {
        assert!(matches!(references("echo {{oops"), Err(TemplateError::Unterminated { .. })));
        assert!(matches!(references("{{.Names}}"), Err(TemplateError::Invalid { .. })));
        assert!(matches!(references("{{steps.x.pid}}"), Err(TemplateError::Invalid { .. })));
    }

    #[test]
    fn escaped_braces_stay_literal() {
        let out = render(r"docker ps --format '\{{.Names}}'", &scope(&[])).unwrap();
        assert_eq!(out, "docker ps --format '{{.Names}}'");
    }

    #[test]
    fn deferred_references_render_canonically() {
        struct Defer;
        impl Scope for Defer {
            fn resolve(&self, _reference: &Reference) -> Resolution {
                Resolution::Deferred
            }
        }
        let out = render("cat {{ steps.a.output }}", &Defer).unwrap();
        assert_eq!(out, "cat {{steps.a.output}}");
    }

    #[test]
    fn renders_json_values() {
        assert_eq!(render_value(&serde_json::json!(["a", 1, true])).as_deref(), Some("a 1 true"));
        assert_eq!(render_value(&Value::Null), None);
    }
}
