use std::io::Cursor;

use plist::{Dictionary, Value};

use crate::error::{Error, Result};
use crate::shadow::record::{Pbkdf2Entropy, Pbkdf2Record, Pbkdf2Salt, SaltedSha512Digest};

pub const SALTED_SHA512: &str = "SALTED-SHA512";
pub const SALTED_SHA512_PBKDF2: &str = "SALTED-SHA512-PBKDF2";

/// The dictionary inside the binary plist stored in `ShadowHashData`.
///
/// Keys other than the two hash schemes (e.g. `SRP-RFC5054-4096-SHA512-PBKDF2` on
/// newer releases) are carried through untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShadowHashPayload {
    dict: Dictionary,
}

impl ShadowHashPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dictionary(dict: Dictionary) -> Self {
        Self { dict }
    }

    /// Parse a binary (or XML) plist blob.
    pub fn from_plist_bytes(bytes: &[u8]) -> Result<Self> {
        match Value::from_reader(Cursor::new(bytes))? {
            Value::Dictionary(dict) => Ok(Self { dict }),
            _ => Err(Error::MalformedShadowHash(
                "embedded plist is not a dictionary".to_string(),
            )),
        }
    }

    /// Parse the value `dscl -plist` prints for `dsAttrTypeNative:ShadowHashData`:
    /// the binary plist as hex, grouped in 4-byte words separated by spaces.
    pub fn from_dscl_value(value: &str) -> Result<Self> {
        let compact: String = value.split_whitespace().collect();
        let bytes = hex::decode(&compact).map_err(|e| {
            Error::MalformedShadowHash(format!("ShadowHashData is not hex: {e}"))
        })?;
        Self::from_plist_bytes(&bytes)
    }

    /// Serialize as a binary plist, the form `ShadowHashData` stores.
    pub fn to_binary(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        Value::Dictionary(self.dict.clone()).to_writer_binary(&mut out)?;
        Ok(out)
    }

    pub fn as_dictionary(&self) -> &Dictionary {
        &self.dict
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.dict.keys().map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.dict.contains_key(key)
    }

    /// Returns whether the key was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.dict.remove(key).is_some()
    }

    pub fn salted_sha512(&self) -> Result<Option<SaltedSha512Digest>> {
        let Some(value) = self.dict.get(SALTED_SHA512) else {
            return Ok(None);
        };
        let bytes = data_of(SALTED_SHA512, value)?;
        SaltedSha512Digest::from_slice(bytes)
            .map(Some)
            .ok_or_else(|| wrong_length(SALTED_SHA512, SaltedSha512Digest::HEX_LEN, bytes.len()))
    }

    pub fn pbkdf2(&self) -> Result<Option<Pbkdf2Record>> {
        let Some(value) = self.dict.get(SALTED_SHA512_PBKDF2) else {
            return Ok(None);
        };
        let fields = value.as_dictionary().ok_or_else(|| {
            Error::MalformedShadowHash(format!("{SALTED_SHA512_PBKDF2} is not a dictionary"))
        })?;

        let field = |name: &str| {
            fields.get(name).ok_or_else(|| {
                Error::MalformedShadowHash(format!("{SALTED_SHA512_PBKDF2} has no {name}"))
            })
        };

        let entropy = data_of("entropy", field("entropy")?)?;
        let entropy = Pbkdf2Entropy::from_slice(entropy)
            .ok_or_else(|| wrong_length("entropy", Pbkdf2Entropy::HEX_LEN, entropy.len()))?;

        let salt = data_of("salt", field("salt")?)?;
        let salt = Pbkdf2Salt::from_slice(salt)
            .ok_or_else(|| wrong_length("salt", Pbkdf2Salt::HEX_LEN, salt.len()))?;

        let iterations = field("iterations")?.as_unsigned_integer().ok_or_else(|| {
            Error::MalformedShadowHash("iterations is not an unsigned integer".to_string())
        })?;

        Ok(Some(Pbkdf2Record {
            entropy,
            salt,
            iterations,
        }))
    }

    pub fn set_salted_sha512(&mut self, digest: &SaltedSha512Digest) {
        self.dict.insert(
            SALTED_SHA512.to_string(),
            Value::Data(digest.as_bytes().to_vec()),
        );
    }

    pub fn set_pbkdf2(&mut self, record: &Pbkdf2Record) {
        let mut fields = Dictionary::new();
        fields.insert(
            "entropy".to_string(),
            Value::Data(record.entropy.as_bytes().to_vec()),
        );
        fields.insert(
            "salt".to_string(),
            Value::Data(record.salt.as_bytes().to_vec()),
        );
        fields.insert("iterations".to_string(), Value::from(record.iterations));
        self.dict
            .insert(SALTED_SHA512_PBKDF2.to_string(), Value::Dictionary(fields));
    }
}

fn data_of<'a>(name: &str, value: &'a Value) -> Result<&'a [u8]> {
    value
        .as_data()
        .ok_or_else(|| Error::MalformedShadowHash(format!("{name} is not a data buffer")))
}

fn wrong_length(name: &str, hex_len: usize, found_bytes: usize) -> Error {
    Error::MalformedShadowHash(format!(
        "{name} must be {hex_len} hex characters, found {}",
        found_bytes * 2
    ))
}
