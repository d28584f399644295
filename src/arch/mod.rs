//! Platform seams: everything that talks to the host OS.
//!
//! Each seam is a trait with one system implementation.

pub mod os_version;
pub mod paths;
pub mod runner;
pub mod tools;

use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build a command from string-ish arguments, e.g. `ShellCommand::with_args("dscl", [".", "-list", "/Users"])`.
    pub fn with_args<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(program, args.into_iter().map(Into::into).collect())
    }

    /// Human-readable rendering for logs and error messages.
    pub fn display(&self) -> String {
        let mut out = self.program.clone();
        for arg in &self.args {
            out.push(' ');
            out.push_str(arg);
        }
        out
    }
}

fn find_in_path(program: &str) -> Option<String> {
    which::which(program)
        .ok()
        .map(|p: PathBuf| p.to_string_lossy().to_string())
}
