//! Command dispatch and handlers.

pub mod execute;
pub mod history;
pub mod info;
pub mod list;

use std::env;

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::context::{LiveOptions, ServiceContext};
use crate::error::Error;

/// Dispatch a parsed command to its handler.
///
/// # Errors
///
/// Returns an error if configuration cannot be resolved or the selected
/// command handler fails.
pub fn dispatch(cli: &Cli) -> Result<(), Error> {
    let ctx = ServiceContext::live(LiveOptions::default());
    let cwd = env::current_dir()
        .map_err(|e| Error::Io(format!("cannot determine the current directory: {e}")))?;
    let config =
        Config::resolve(&cli.global.overrides(), ctx.env.as_ref(), ctx.fs.as_ref(), &cwd)?;
    dispatch_with_context(&cli.command, &ctx, &config)
}

/// Dispatch a command with the given service context and configuration.
///
/// `execute` builds its own live context, since its flags choose the
/// approval and decision adapters.
fn dispatch_with_context(
    command: &Command,
    ctx: &ServiceContext,
    config: &Config,
) -> Result<(), Error> {
    match command {
        Command::List => list::run(ctx, config),
        Command::Info { name } => info::run(ctx, config, name),
        Command::Execute(args) => execute::run(config, args),
        Command::History { name } => history::run(ctx, config, name.as_deref()),
    }
}
