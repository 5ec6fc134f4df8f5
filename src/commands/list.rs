//! `skillrun list` command.

use crate::config::Config;
use crate::context::ServiceContext;
use crate::error::Error;
use crate::registry::Registry;

/// Execute the `list` command.
///
/// Prints a table of valid skills. Invalid definitions are reported on
/// stderr with their validation error and do not fail the command.
///
/// # Errors
///
/// Returns an error if the skills directory cannot be listed.
pub fn run(ctx: &ServiceContext, config: &Config) -> Result<(), Error> {
    let discovered = Registry::new(ctx, &config.skills_dir).discover()?;
    if discovered.is_empty() {
        println!("No skills found in {}.", config.skills_dir.display());
        return Ok(());
    }

    let mut rows: Vec<(String, String, String, String)> = Vec::new();
    for skill in discovered {
        match skill.definition {
            Ok(def) => rows.push((
                def.name,
                def.version,
                def.autonomy.to_string(),
                def.description,
            )),
            Err(e) => eprintln!("warning: skipping invalid skill `{}`: {e}", skill.name),
        }
    }

    let name_width = rows.iter().map(|r| r.0.len()).max().unwrap_or(4).max(4);
    let version_width = rows.iter().map(|r| r.1.len()).max().unwrap_or(7).max(7);
    let autonomy_width = rows.iter().map(|r| r.2.len()).max().unwrap_or(8).max(8);

    println!(
        "{:<name_width$}  {:<version_width$}  {:<autonomy_width$}  DESCRIPTION",
        "NAME", "VERSION", "AUTONOMY",
    );
    println!(
        "{:-<name_width$}  {:-<version_width$}  {:-<autonomy_width$}  -----------",
        "", "", "",
    );
    for (name, version, autonomy, description) in &rows {
        println!(
            "{name:<name_width$}  {version:<version_width$}  {autonomy:<autonomy_width$}  {description}"
        );
    }

    println!("\n{} skill(s) total.", rows.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::adapters::scripted::MemFileSystem;

    fn config() -> Config {
        Config {
            workspace: PathBuf::from("/ws"),
            skills_dir: PathBuf::from("/ws/skills"),
            log_dir: PathBuf::from("/ws/.skillrun/logs"),
            tools: Default::default(),
        }
    }

    #[test]
    fn list_with_no_skills_dir() {
        assert!(run(&ServiceContext::scripted(), &config()).is_ok());
    }

    #[test]
    fn list_tolerates_invalid_skills() {
        let fs = MemFileSystem::new();
        fs.insert("/ws/skills/broken/skill.json", "{");
        let ctx = ServiceContext { fs: Box::new(fs), ..ServiceContext::scripted() };
        assert!(run(&ctx, &config()).is_ok());
    }
}
