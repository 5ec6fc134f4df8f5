//! Check vocabulary shared by preconditions and verification.

use std::fmt;

/// What a check asserts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckKind {
    /// An executable with this name is on `PATH`.
    CommandExists {
        /// Executable name (template).
        name: String,
    },
    /// A regular file exists.
    FileExists {
        /// Path template.
        path: String,
    },
    /// A directory exists.
    DirExists {
        /// Path template.
        path: String,
    },
    /// Any filesystem entry exists, optionally under a base directory.
    PathExists {
        /// Base directory template.
        base: Option<String>,
        /// Path template, joined onto `base` when present.
        path: String,
    },
    /// An environment variable is set.
    EnvVarSet {
        /// Variable name (template).
        name: String,
    },
    /// A command exits with the expected code.
    ExitCodeEquals {
        /// Command template run with `sh -c`.
        command: String,
        /// Expected exit code.
        expect: i32,
    },
    /// A file parses as JSON.
    JsonValid {
        /// Path template.
        path: String,
    },
    /// A completed step exited with the expected code. Verification only.
    StepExitCode {
        /// Referenced step identifier.
        step: String,
        /// Expected exit code.
        expect: i32,
    },
    /// A completed step's stdout, or its output value when stdout is empty,
    /// contains a substring. Verification only.
    StepOutputContains {
        /// Referenced step identifier.
        step: String,
        /// Substring template.
        needle: String,
    },
}

/// Wire names of check kinds.
pub const CHECK_KINDS: &[&str] = &[
    "command_exists",
    "file_exists",
    "dir_exists",
    "path_exists",
    "env_var_set",
    "exit_code_equals",
    "json_valid",
    "step_exit_code",
    "step_output_contains",
];

impl CheckKind {
    /// The wire name of this kind.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CommandExists { .. } => "command_exists",
            Self::FileExists { .. } => "file_exists",
            Self::DirExists { .. } => "dir_exists",
            Self::PathExists { .. } => "path_exists",
            Self::EnvVarSet { .. } => "env_var_set",
            Self::ExitCodeEquals { .. } => "exit_code_equals",
            Self::JsonValid { .. } => "json_valid",
            Self::StepExitCode { .. } => "step_exit_code",
            Self::StepOutputContains { .. } => "step_output_contains",
        }
    }

    /// Whether the check reads captured step results.
    #[must_use]
    pub fn reads_step_results(&self) -> bool {
        matches!(self, Self::StepExitCode { .. } | Self::StepOutputContains { .. })
    }

    /// The step this check reads, if any.
    #[must_use]
    pub fn referenced_step(&self) -> Option<&str> {
        match self {
            Self::StepExitCode { step, .. } | Self::StepOutputContains { step, .. } => {
                Some(step.as_str())
            }
            _ => None,
        }
    }

    /// Positional arguments in wire order.
    #[must_use]
    pub fn args(&self) -> Vec<&str> {
        match self {
            Self::CommandExists { name } | Self::EnvVarSet { name } => vec![name.as_str()],
            Self::FileExists { path } | Self::DirExists { path } | Self::JsonValid { path } => {
                vec![path.as_str()]
            }
            Self::PathExists { base: Some(base), path } => vec![base.as_str(), path.as_str()],
            Self::PathExists { base: None, path } => vec![path.as_str()],
            Self::ExitCodeEquals { command, .. } => vec![command.as_str()],
            Self::StepExitCode { step, .. } => vec![step.as_str()],
            Self::StepOutputContains { step, needle } => vec![step.as_str(), needle.as_str()],
        }
    }

    /// The expected exit code for kinds that compare one.
    #[must_use]
    pub fn expect(&self) -> Option<i32> {
        match self {
            Self::ExitCodeEquals { expect, .. } | Self::StepExitCode { expect, .. } => {
                Some(*expect)
            }
            _ => None,
        }
    }

    /// Argument strings that are templates (step identifiers are not).
    #[must_use]
    pub fn templates(&self) -> Vec<&str> {
        match self {
            Self::StepExitCode { .. } => Vec::new(),
            Self::StepOutputContains { needle, .. } => vec![needle.as_str()],
            other => other.args(),
        }
    }
}

/// A precondition or verification check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    /// The assertion.
    pub kind: CheckKind,
    /// Diagnostic shown instead of the default one on failure.
    pub error_message: Option<String>,
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.name(), self.kind.args().join(" "))
    }
}
