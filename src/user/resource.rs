use std::path::PathBuf;

use serde::Serialize;
use tracing::warn;

use crate::directory::{first_value, AttributeMap};
use crate::error::{Error, Result};
use crate::shadow::Pbkdf2Overrides;

/// Declarative view of a local user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResource {
    pub ensure: String,
    pub provider: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gid: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
}

impl UserResource {
    /// Build from a `dscl` record. The record must carry a `RecordName`.
    pub fn from_record(record: &AttributeMap) -> Result<Self> {
        let name = first_value(record, "RecordName").ok_or_else(|| Error::missing("RecordName"))?;
        let text = |attr: &str| first_value(record, attr).map(str::to_string);
        let number = |attr: &str| {
            let raw = first_value(record, attr)?;
            match raw.trim().parse::<i64>() {
                Ok(n) => Some(n),
                Err(_) => {
                    warn!(user = name, attribute = attr, value = raw, "ignoring non-numeric id");
                    None
                }
            }
        };

        Ok(Self {
            ensure: "present".to_string(),
            provider: "osx".to_string(),
            name: name.to_string(),
            comment: text("RealName"),
            uid: number("UniqueID"),
            gid: number("PrimaryGroupID"),
            home: text("NFSHomeDirectory"),
            shell: text("UserShell"),
        })
    }
}

/// Desired state for a new user. Unset fields fall back to config defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserSpec {
    pub name: String,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub comment: Option<String>,
    pub home: Option<PathBuf>,
    pub shell: Option<String>,
    /// Flat hex hash in the running OS's scheme.
    pub password: Option<String>,
    pub password_overrides: Pbkdf2Overrides,
    /// Comma-separated group names.
    pub groups: Option<String>,
}

impl UserSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
