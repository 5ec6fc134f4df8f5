//! `skillrun info` command.

use crate::config::Config;
use crate::context::ServiceContext;
use crate::definition::{InputSpec, StepKind, TaskDefinition};
use crate::error::Error;
use crate::registry::Registry;

/// Execute the `info` command.
///
/// Loads and validates one skill and prints its summary.
///
/// # Errors
///
/// Returns an error if the skill is missing or fails validation.
pub fn run(ctx: &ServiceContext, config: &Config, name: &str) -> Result<(), Error> {
    let (def, path) = Registry::new(ctx, &config.skills_dir).load(name)?;
    println!("Definition: {}", path.display());
    print_definition(&def);
    Ok(())
}

fn print_definition(def: &TaskDefinition) {
    println!("Skill: {}", def.name);
    println!("Version: {}", def.version);
    println!("Autonomy: {}", def.autonomy);
    if !def.description.is_empty() {
        println!("Description: {}", def.description);
    }
    if !def.context_refs.is_empty() {
        println!("Context: {}", def.context_refs.join(", "));
    }

    if !def.inputs.is_empty() {
        println!("\nInputs:");
        for (name, spec) in &def.inputs {
            println!("  {name}: {}", describe_input(spec));
        }
    }

    if !def.preconditions.is_empty() {
        println!("\nPreconditions:");
        for check in &def.preconditions {
            println!("  - {check}");
        }
    }

    println!("\nSteps:");
    for (i, step) in def.steps.iter().enumerate() {
        let mut line = format!("  {}. {} [{}]", i + 1, step.id, step.kind_name());
        if !step.description.is_empty() {
            line.push_str(&format!(" {}", step.description));
        }
        if step.major {
            line.push_str(" (major)");
        }
        if let Some(limits) = step.limits() {
            line.push_str(&format!(" timeout {}s", limits.timeout.as_secs_f64()));
            if limits.retry > 0 {
                line.push_str(&format!(", retry {}", limits.retry));
            }
        }
        if let StepKind::ExternalCall(call) = &step.kind {
            line.push_str(&format!(" -> {}", call.tool));
        }
        println!("{line}");
    }

    if !def.verification.is_empty() {
        println!("\nVerification:");
        for check in &def.verification {
            println!("  - {check}");
        }
    }

    if !def.rollback.is_empty() {
        println!("\nRollback:");
        for action in &def.rollback {
            match &action.undoes {
                Some(step) => println!("  - {}: {} (undoes {step})", action.id, action.cmd),
                None => println!("  - {}: {}", action.id, action.cmd),
            }
        }
    }
}

fn describe_input(spec: &InputSpec) -> String {
    let mut text = spec.input_type.to_string();
    if spec.required {
        text.push_str(", required");
    }
    if let Some(default) = &spec.default {
        text.push_str(&format!(", default {default}"));
    }
    if !spec.allowed.is_empty() {
        let allowed: Vec<String> = spec.allowed.iter().map(ToString::to_string).collect();
        text.push_str(&format!(", one of {}", allowed.join(" | ")));
    }
    if let Some(description) = &spec.description {
        text.push_str(&format!(" - {description}"));
    }
    text
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::definition::InputType;

    #[test]
    fn describes_inputs_compactly() {
        let spec = InputSpec {
            input_type: InputType::Enum,
            required: false,
            default: Some(json!("sqlite")),
            allowed: vec![json!("sqlite"), json!("postgres")],
            description: Some("Database".into()),
        };
        assert_eq!(
            describe_input(&spec),
            r#"enum, default "sqlite", one of "sqlite" | "postgres" - Database"#
        );
    }

    #[test]
    fn unknown_skill_is_an_error() {
        let config = Config {
            workspace: "/ws".into(),
            skills_dir: "/ws/skills".into(),
            log_dir: "/ws/logs".into(),
            tools: Default::default(),
        };
        let err = run(&ServiceContext::scripted(), &config, "deploy").unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("skill `deploy` not found"));
    }
}
