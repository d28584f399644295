use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::arch::runner::CommandRunner;
use crate::arch::ShellCommand;
use crate::error::{Error, Result};

/// `major.minor` of the running macOS, e.g. `10.7` or `13.4`.
///
/// Patch levels are dropped; hashing schemes never changed on a patch release.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OsVersion {
    pub major: u32,
    pub minor: u32,
}

impl OsVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for OsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for OsVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let unsupported = || Error::UnsupportedOsVersion(trimmed.to_string());

        let mut parts = trimmed.split('.');
        let major = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(unsupported)?
            .parse::<u32>()
            .map_err(|_| unsupported())?;
        let minor = match parts.next() {
            Some(p) => p.parse::<u32>().map_err(|_| unsupported())?,
            None => 0,
        };
        Ok(Self { major, minor })
    }
}

/// Source of the host's OS version (the facter `macosx_productversion_major` fact).
pub trait OsVersionProvider: Send + Sync {
    fn os_version(&self) -> Result<OsVersion>;
}

/// Pinned version, from config or tests.
#[derive(Clone, Copy, Debug)]
pub struct FixedOsVersion(pub OsVersion);

impl OsVersionProvider for FixedOsVersion {
    fn os_version(&self) -> Result<OsVersion> {
        Ok(self.0)
    }
}

/// Asks `sw_vers -productVersion`.
pub struct SwVersProvider {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl SwVersProvider {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }
}

impl OsVersionProvider for SwVersProvider {
    fn os_version(&self) -> Result<OsVersion> {
        let cmd = ShellCommand::with_args(self.program.clone(), ["-productVersion"]);
        let out = self.runner.run(&cmd, None)?;
        let version: OsVersion = String::from_utf8_lossy(&out).parse()?;
        debug!(%version, "detected OS version");
        Ok(version)
    }
}
