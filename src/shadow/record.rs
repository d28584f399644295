use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::shadow::OsHashScheme;

/// Fixed-length hash material.
///
/// The length is part of the type, so a value that exists always satisfies the
/// hex contract of its scheme (`N * 2` hex characters).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashBytes<const N: usize>([u8; N]);

impl<const N: usize> HashBytes<N> {
    pub const HEX_LEN: usize = N * 2;

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; N]>::try_from(bytes).ok().map(Self)
    }

    /// Accepts upper- or lowercase hex of exactly `HEX_LEN` characters.
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != Self::HEX_LEN {
            return None;
        }
        let mut out = [0u8; N];
        hex::decode_to_slice(s, &mut out).ok()?;
        Some(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl<const N: usize> fmt::Debug for HashBytes<N> {
    // Hash material stays out of logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashBytes<{}>(..)", N)
    }
}

/// The 68-byte `SALTED-SHA512` buffer (4 bytes salt + 64 bytes digest).
pub type SaltedSha512Digest = HashBytes<68>;
/// PBKDF2 derived key.
pub type Pbkdf2Entropy = HashBytes<128>;
pub type Pbkdf2Salt = HashBytes<32>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pbkdf2Record {
    pub entropy: Pbkdf2Entropy,
    pub salt: Pbkdf2Salt,
    pub iterations: u64,
}

impl Pbkdf2Record {
    pub fn field(&self, field: Pbkdf2Field) -> FieldValue {
        match field {
            Pbkdf2Field::Entropy => FieldValue::Bytes(self.entropy.as_bytes().to_vec()),
            Pbkdf2Field::Salt => FieldValue::Bytes(self.salt.as_bytes().to_vec()),
            Pbkdf2Field::Iterations => FieldValue::Integer(self.iterations),
        }
    }
}

/// A user's password hash, in the form the running OS stores it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HashRecord {
    /// Contents of the legacy hash file (ASCII hex as written by the OS).
    Sha1 { digest: Vec<u8> },
    SaltedSha512(SaltedSha512Digest),
    SaltedSha512Pbkdf2(Pbkdf2Record),
}

impl HashRecord {
    pub fn scheme(&self) -> OsHashScheme {
        match self {
            HashRecord::Sha1 { .. } => OsHashScheme::Sha1,
            HashRecord::SaltedSha512(_) => OsHashScheme::SaltedSha512,
            HashRecord::SaltedSha512Pbkdf2(_) => OsHashScheme::SaltedSha512Pbkdf2,
        }
    }

    /// The flat hash string a resource declaration carries.
    ///
    /// For PBKDF2 this is the entropy only; salt and iterations are read with
    /// [`lookup_field`].
    pub fn password_hash(&self) -> String {
        match self {
            HashRecord::Sha1 { digest } => String::from_utf8_lossy(digest).trim().to_string(),
            HashRecord::SaltedSha512(digest) => digest.to_hex(),
            HashRecord::SaltedSha512Pbkdf2(record) => record.entropy.to_hex(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pbkdf2Field {
    Entropy,
    Salt,
    Iterations,
}

impl Pbkdf2Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Pbkdf2Field::Entropy => "entropy",
            Pbkdf2Field::Salt => "salt",
            Pbkdf2Field::Iterations => "iterations",
        }
    }
}

impl FromStr for Pbkdf2Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "entropy" => Ok(Pbkdf2Field::Entropy),
            "salt" => Ok(Pbkdf2Field::Salt),
            "iterations" => Ok(Pbkdf2Field::Iterations),
            other => Err(Error::InvalidField(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Bytes(Vec<u8>),
    Integer(u64),
}

impl FieldValue {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            FieldValue::Integer(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<u64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            FieldValue::Bytes(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bytes(b) => f.write_str(&hex::encode(b)),
            FieldValue::Integer(n) => write!(f, "{n}"),
        }
    }
}

/// Read one named field of a PBKDF2 record. Only `entropy`, `salt` and `iterations`
/// exist.
pub fn lookup_field(field: &str, record: &Pbkdf2Record) -> Result<FieldValue> {
    let field: Pbkdf2Field = field.parse()?;
    Ok(record.field(field))
}
