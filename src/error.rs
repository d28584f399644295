use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Could not read password hash file at {}", path.display())]
    NotReadable { path: PathBuf },

    #[error("{0}")]
    Validation(String),

    #[error(
        "tried to read an incorrect value ({0}) from the SALTED-SHA512-PBKDF2 hash. Acceptable fields are 'salt', 'entropy', or 'iterations'."
    )]
    InvalidField(String),

    #[error("directory attribute {attribute} is missing")]
    MissingAttribute { attribute: String },

    #[error("unsupported OS version: {0}")]
    UnsupportedOsVersion(String),

    #[error("malformed shadow hash data: {0}")]
    MalformedShadowHash(String),

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{0}")]
    ToolNotFound(String),

    #[error("invalid user GUID {0:?}")]
    InvalidGuid(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("plist error: {0}")]
    Plist(#[from] plist::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn missing(attribute: impl Into<String>) -> Self {
        Error::MissingAttribute {
            attribute: attribute.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
