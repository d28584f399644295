pub mod arch;
pub mod cli;
pub mod config;
pub mod directory;
pub mod error;
pub mod shadow;
pub mod user;

#[cfg(test)]
pub(crate) mod test_utils;

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

pub use crate::arch::os_version::{FixedOsVersion, OsVersion, OsVersionProvider, SwVersProvider};
pub use crate::arch::runner::{CommandRunner, SystemCommandRunner};
pub use crate::arch::ShellCommand;
pub use crate::error::{Error, Result};

pub fn run() -> ExitCode {
    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = cli::Cli::parse();
    let stdout = io::stdout();
    match cli::dispatch(cli, &mut stdout.lock()) {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("macuser: {e}");
            ExitCode::FAILURE
        }
    }
}
