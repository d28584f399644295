use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

use tracing::debug;

use crate::arch::ShellCommand;
use crate::error::{Error, Result};

/// Runs an external program to completion and hands back its stdout.
///
/// A non-zero exit is an error (`Error::CommandFailed`). Nothing is retried.
pub trait CommandRunner: Send + Sync {
    fn run(&self, cmd: &ShellCommand, stdin: Option<&[u8]>) -> Result<Vec<u8>>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemCommandRunner {
    fn run(&self, cmd: &ShellCommand, stdin: Option<&[u8]>) -> Result<Vec<u8>> {
        debug!(command = %cmd.display(), piped_stdin = stdin.is_some(), "running");

        let mut child = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Feed stdin from a separate thread so a chatty child can't fill its stdout
        // pipe while we are still blocked writing.
        let writer = match (stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => {
                let input = input.to_vec();
                Some(thread::spawn(move || pipe.write_all(&input)))
            }
            _ => None,
        };

        let output = child.wait_with_output()?;

        if let Some(writer) = writer {
            writer
                .join()
                .map_err(|_| Error::Io(std::io::Error::other("stdin writer thread panicked")))??;
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!(command = %cmd.display(), status = %output.status, "command failed");
            return Err(Error::CommandFailed {
                program: cmd.program.clone(),
                status: output.status.to_string(),
                stderr,
            });
        }

        Ok(output.stdout)
    }
}
