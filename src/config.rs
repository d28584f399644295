use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::arch::os_version::OsVersion;
use crate::arch::paths::{LEGACY_HASH_DIR, USERS_PLIST_DIR};
use crate::error::{Error, Result};

pub const CONFIG_ENV: &str = "MACUSER_CONFIG";

/// Runtime configuration.
///
/// Read from an optional JSON file, then overridden field-by-field from `MACUSER_*`
/// environment variables. Every field has a default matching a stock macOS install.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Explicit `dscl` binary; otherwise resolved from PATH.
    pub dscl: Option<String>,
    pub plutil: Option<String>,
    pub sw_vers: Option<String>,
    /// Pin the OS version instead of asking `sw_vers`.
    pub os_version: Option<String>,
    pub legacy_hash_dir: PathBuf,
    pub users_plist_dir: PathBuf,
    pub defaults: UserDefaults,
}

/// Values used by `create` for attributes the caller leaves unset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserDefaults {
    /// Lower bound handed to `next_system_id` when no uid is given.
    pub min_uid: u32,
    pub gid: u32,
    pub shell: String,
    pub home_root: PathBuf,
}

impl Default for UserDefaults {
    fn default() -> Self {
        Self {
            min_uid: 20,
            gid: 20,
            shell: "/bin/bash".to_string(),
            home_root: PathBuf::from("/Users"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dscl: None,
            plutil: None,
            sw_vers: None,
            os_version: None,
            legacy_hash_dir: PathBuf::from(LEGACY_HASH_DIR),
            users_plist_dir: PathBuf::from(USERS_PLIST_DIR),
            defaults: UserDefaults::default(),
        }
    }
}

impl Config {
    /// Load from `path` (or `$MACUSER_CONFIG`), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(from_env) {
            Some(p) => Self::from_file(&p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        let config: Config = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Apply `MACUSER_*` overrides. `lookup` is the environment accessor.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("MACUSER_DSCL") {
            self.dscl = Some(v);
        }
        if let Some(v) = get("MACUSER_PLUTIL") {
            self.plutil = Some(v);
        }
        if let Some(v) = get("MACUSER_SW_VERS") {
            self.sw_vers = Some(v);
        }
        if let Some(v) = get("MACUSER_OS_VERSION") {
            self.os_version = Some(v);
        }
        if let Some(v) = get("MACUSER_LEGACY_HASH_DIR") {
            self.legacy_hash_dir = PathBuf::from(v);
        }
        if let Some(v) = get("MACUSER_USERS_PLIST_DIR") {
            self.users_plist_dir = PathBuf::from(v);
        }
    }

    /// The pinned OS version, if one is configured.
    pub fn pinned_os_version(&self) -> Result<Option<OsVersion>> {
        self.os_version.as_deref().map(str::parse::<OsVersion>).transpose()
    }
}
