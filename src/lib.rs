//! Core library for the `skillrun` CLI.
//!
//! A skill is a declarative definition: preconditions, typed steps,
//! verification checks and rollback actions. [`loader`] validates one,
//! [`engine::Engine`] runs it against the ports in [`context::ServiceContext`],
//! and [`store::RecordStore`] keeps the record of every run.

pub mod adapters;
pub mod checks;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod definition;
pub mod engine;
pub mod error;
pub mod loader;
pub mod logging;
pub mod ports;
pub mod record;
pub mod registry;
pub mod store;
pub mod template;

use clap::error::ErrorKind;
use clap::Parser;

pub use error::Error;

/// Run the CLI with the provided arguments.
///
/// Help and version requests print to stdout and count as success.
///
/// # Errors
///
/// Returns an error when argument parsing fails or command execution fails.
pub fn run<I, T>(args: I) -> Result<(), Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = match cli::Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            return Ok(());
        }
        Err(err) => return Err(Error::Usage(err.to_string())),
    };
    logging::init(cli.global.verbose);
    commands::dispatch(&cli)
}

#[cfg(test)]
mod tests {
    use super::run;

    #[test]
    fn run_prints_help() {
        assert!(run(["skillrun", "--help"]).is_ok());
    }

    #[test]
    fn run_errors_on_unknown_subcommand() {
        let err = run(["skillrun", "unknown"]).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }
}
