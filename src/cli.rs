//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Overrides;

/// Top-level CLI parser for `skillrun`.
#[derive(Debug, Parser)]
#[command(name = "skillrun", version, about = "Run declarative skills with checks and rollback")]
pub struct Cli {
    /// Options shared by every command.
    #[command(flatten)]
    pub global: GlobalArgs,
    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Flags accepted before or after any subcommand.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Workspace root; commands run here [env: SKILLRUN_WORKSPACE]
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,
    /// Directory holding `<name>/skill.json` [env: SKILLRUN_SKILLS_DIR]
    #[arg(long, global = true)]
    pub skills_dir: Option<PathBuf>,
    /// Directory for execution records [env: SKILLRUN_LOG_DIR]
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,
    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    /// Path overrides for config resolution.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            workspace: self.workspace.clone(),
            skills_dir: self.skills_dir.clone(),
            log_dir: self.log_dir.clone(),
        }
    }
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List available skills.
    List,
    /// Validate a skill and summarize it.
    Info {
        /// Skill name.
        name: String,
    },
    /// Run a skill.
    Execute(ExecuteArgs),
    /// Show past execution records.
    History {
        /// Only records of this skill.
        name: Option<String>,
    },
}

/// Arguments of `skillrun execute`.
#[derive(Debug, Args)]
pub struct ExecuteArgs {
    /// Skill name.
    pub name: String,
    /// Input values as a JSON object.
    #[arg(long, default_value = "{}")]
    pub inputs: String,
    /// Resolve and print the plan without running anything.
    #[arg(long)]
    pub dry_run: bool,
    /// Approve every checkpoint and gated step without prompting.
    #[arg(long, short = 'y')]
    pub yes: bool,
    /// Decisions for agent_decision steps as a JSON object keyed by step id.
    #[arg(long)]
    pub decisions: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::Parser;

    #[test]
    fn parses_execute_with_flags() {
        let cli = Cli::parse_from([
            "skillrun",
            "execute",
            "deploy",
            "--inputs",
            r#"{"env":"prod"}"#,
            "--dry-run",
            "--workspace",
            "/tmp/ws",
        ]);
        let Command::Execute(args) = cli.command else { panic!("expected execute") };
        assert_eq!(args.name, "deploy");
        assert!(args.dry_run);
        assert!(!args.yes);
        assert_eq!(cli.global.workspace.as_deref(), Some(std::path::Path::new("/tmp/ws")));
    }

    #[test]
    fn inputs_default_to_empty_object() {
        let cli = Cli::parse_from(["skillrun", "execute", "deploy"]);
        let Command::Execute(args) = cli.command else { panic!("expected execute") };
        assert_eq!(args.inputs, "{}");
    }

    #[test]
    fn parses_history_with_optional_name() {
        let cli = Cli::parse_from(["skillrun", "-v", "history"]);
        assert!(matches!(cli.command, Command::History { name: None }));
        assert!(cli.global.verbose);
    }

    #[test]
    fn info_requires_a_name() {
        assert!(Cli::try_parse_from(["skillrun", "info"]).is_err());
    }
}
