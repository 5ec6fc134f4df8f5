//! Runtime configuration.
//!
//! Precedence, highest first: command-line flag, environment variable
//! (`SKILLRUN_WORKSPACE`, `SKILLRUN_SKILLS_DIR`, `SKILLRUN_LOG_DIR`), the
//! optional `skillrun.yaml` in the workspace, built-in defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ports::{Environment, FileSystem, PortError};

/// Name of the optional workspace config file.
pub const CONFIG_FILE: &str = "skillrun.yaml";

const DEFAULT_SKILLS_DIR: &str = "skills";
const DEFAULT_LOG_DIR: &str = ".skillrun/logs";

/// How an external tool is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolConfig {
    /// Run `sh -c <command>` with the call as JSON on stdin.
    Command {
        /// Shell command.
        command: String,
    },
    /// POST the call as JSON to `url`.
    Http {
        /// Endpoint URL.
        url: String,
    },
}

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: PortError,
    },
    /// The config file is not valid.
    #[error("invalid {}: {message}", .path.display())]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Parser diagnostic.
        message: String,
    },
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `--workspace`.
    pub workspace: Option<PathBuf>,
    /// `--skills-dir`.
    pub skills_dir: Option<PathBuf>,
    /// `--log-dir`.
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    skills_dir: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    #[serde(default)]
    tools: BTreeMap<String, ToolConfig>,
}

/// Fully resolved configuration; all paths are absolute or workspace-joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Root that relative paths in definitions resolve against.
    pub workspace: PathBuf,
    /// Directory holding `<name>/skill.json` definitions.
    pub skills_dir: PathBuf,
    /// Root of the execution record store.
    pub log_dir: PathBuf,
    /// External tools by name.
    pub tools: BTreeMap<String, ToolConfig>,
}

impl Config {
    /// Resolves configuration from flags, environment, config file and defaults.
    ///
    /// `cwd` is used as the workspace when neither flag nor environment names one.
    ///
    /// # Errors
    ///
    /// Returns an error if `skillrun.yaml` exists but cannot be read or parsed.
    pub fn resolve(
        overrides: &Overrides,
        env: &dyn Environment,
        fs: &dyn FileSystem,
        cwd: &Path,
    ) -> Result<Self, ConfigError> {
        let workspace = overrides
            .workspace
            .clone()
            .or_else(|| env.var("SKILLRUN_WORKSPACE").map(PathBuf::from))
            .map_or_else(|| cwd.to_path_buf(), |path| cwd.join(path));

        let path = workspace.join(CONFIG_FILE);
        let file = if fs.is_file(&path) {
            let text = fs
                .read_to_string(&path)
                .map_err(|source| ConfigError::Read { path: path.clone(), source })?;
            serde_yaml::from_str::<Option<ConfigFile>>(&text)
                .map_err(|e| ConfigError::Parse { path: path.clone(), message: e.to_string() })?
                .unwrap_or_default()
        } else {
            ConfigFile::default()
        };

        let pick = |flag: &Option<PathBuf>, var: &str, from_file: Option<PathBuf>, default: &str| {
            let chosen = flag
                .clone()
                .or_else(|| env.var(var).map(PathBuf::from))
                .or(from_file)
                .unwrap_or_else(|| PathBuf::from(default));
            workspace.join(chosen)
        };
        let skills_dir =
            pick(&overrides.skills_dir, "SKILLRUN_SKILLS_DIR", file.skills_dir, DEFAULT_SKILLS_DIR);
        let log_dir = pick(&overrides.log_dir, "SKILLRUN_LOG_DIR", file.log_dir, DEFAULT_LOG_DIR);

        tracing::debug!(
            workspace = %workspace.display(),
            skills_dir = %skills_dir.display(),
            log_dir = %log_dir.display(),
            tools = file.tools.len(),
            "configuration resolved"
        );
        Ok(Self { workspace, skills_dir, log_dir, tools: file.tools })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::scripted::{MemFileSystem, ScriptedEnvironment};

    #[test]
    fn defaults_are_relative_to_the_workspace() {
        let config = Config::resolve(
            &Overrides::default(),
            &ScriptedEnvironment::new(),
            &MemFileSystem::new(),
            Path::new("/work"),
        )
        .unwrap();

        assert_eq!(config.workspace, PathBuf::from("/work"));
        assert_eq!(config.skills_dir, PathBuf::from("/work/skills"));
        assert_eq!(config.log_dir, PathBuf::from("/work/.skillrun/logs"));
        assert!(config.tools.is_empty());
    }

    #[test]
    fn flag_beats_env_beats_file() {
        let fs = MemFileSystem::new();
        fs.insert(
            "/work/skillrun.yaml",
            "skills_dir: from-file\nlog_dir: logs-from-file\ntools:\n  notify:\n    command: cat\n  \
             search:\n    url: http://localhost:9/search\n",
        );
        let env = ScriptedEnvironment::new().with_var("SKILLRUN_SKILLS_DIR", "from-env");
        let overrides = Overrides { log_dir: Some("/abs/logs".into()), ..Overrides::default() };

        let config = Config::resolve(&overrides, &env, &fs, Path::new("/work")).unwrap();

        assert_eq!(config.skills_dir, PathBuf::from("/work/from-env"));
        assert_eq!(config.log_dir, PathBuf::from("/abs/logs"));
        assert_eq!(config.tools["notify"], ToolConfig::Command { command: "cat".into() });
        assert_eq!(
            config.tools["search"],
            ToolConfig::Http { url: "http://localhost:9/search".into() }
        );
    }

    #[test]
    fn workspace_from_env() {
        let env = ScriptedEnvironment::new().with_var("SKILLRUN_WORKSPACE", "/elsewhere");
        let config =
            Config::resolve(&Overrides::default(), &env, &MemFileSystem::new(), Path::new("/work"))
                .unwrap();
        assert_eq!(config.workspace, PathBuf::from("/elsewhere"));
    }

    #[test]
    fn malformed_config_file_is_reported() {
        let fs = MemFileSystem::new();
        fs.insert("/work/skillrun.yaml", "unknown_key: 1\n");
        let err = Config::resolve(
            &Overrides::default(),
            &ScriptedEnvironment::new(),
            &fs,
            Path::new("/work"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
