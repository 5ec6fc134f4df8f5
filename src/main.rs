//! Binary entrypoint for the `skillrun` CLI.

use std::process::ExitCode;

fn main() -> ExitCode {
    // A missing .env is fine; variables already set take precedence.
    let _ = dotenvy::dotenv();
    match skillrun::run(std::env::args()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
