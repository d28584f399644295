use std::path::Path;

use crate::arch::find_in_path;
use crate::error::{Error, Result};

/// A macOS command-line tool the provider shells out to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tool {
    Dscl,
    Plutil,
    SwVers,
}

impl Tool {
    pub fn program_name(self) -> &'static str {
        match self {
            Tool::Dscl => "dscl",
            Tool::Plutil => "plutil",
            Tool::SwVers => "sw_vers",
        }
    }

    /// Environment variable that pins the binary to a specific path.
    pub fn env_override(self) -> &'static str {
        match self {
            Tool::Dscl => "MACUSER_DSCL",
            Tool::Plutil => "MACUSER_PLUTIL",
            Tool::SwVers => "MACUSER_SW_VERS",
        }
    }

    fn standard_location(self) -> &'static str {
        match self {
            Tool::Dscl => "/usr/bin/dscl",
            Tool::Plutil => "/usr/bin/plutil",
            Tool::SwVers => "/usr/bin/sw_vers",
        }
    }
}

/// Resolve a tool binary.
///
/// Order: explicit override (config or env), PATH lookup, then the standard
/// `/usr/bin` location. Launchd jobs often run with a minimal PATH.
pub fn tool_program(tool: Tool, configured: Option<&str>) -> String {
    if let Some(p) = configured.map(str::trim).filter(|p| !p.is_empty()) {
        return p.to_string();
    }

    if let Ok(p) = std::env::var(tool.env_override()) {
        let p = p.trim();
        if !p.is_empty() {
            return p.to_string();
        }
    }

    if let Some(p) = find_in_path(tool.program_name()) {
        return p;
    }

    let fallback = tool.standard_location();
    if Path::new(fallback).exists() {
        return fallback.to_string();
    }

    tool.program_name().to_string()
}

/// Resolve a tool and return a user-friendly error if it's not available.
pub fn tool_program_checked(tool: Tool, configured: Option<&str>) -> Result<String> {
    let p = tool_program(tool, configured);

    // Paths must exist; bare names must be on PATH.
    if p.contains('/') {
        if Path::new(&p).exists() {
            return Ok(p);
        }
        return Err(Error::ToolNotFound(format!(
            "{} binary not found at path: {p}",
            tool.program_name()
        )));
    }

    if which::which(&p).is_ok() {
        return Ok(p);
    }

    Err(Error::ToolNotFound(format!(
        "{} binary not found. This tool only runs on macOS; set {} to a full path to override.",
        tool.program_name(),
        tool.env_override()
    )))
}
