//! Password hash encodings for macOS local accounts.
//!
//! Which encoding a host uses depends only on its OS version:
//!
//! | OS            | scheme                  | stored in                                   |
//! |---------------|-------------------------|---------------------------------------------|
//! | 10.5, 10.6    | SHA1                    | `/var/db/shadow/hash/<GeneratedUID>`        |
//! | 10.7          | Salted SHA512           | `ShadowHashData` → `SALTED-SHA512`          |
//! | 10.8 and up   | Salted SHA512 PBKDF2    | `ShadowHashData` → `SALTED-SHA512-PBKDF2`   |
//!
//! `ShadowHashData` holds a binary plist; see [`ShadowHashPayload`].

pub mod embedded;
pub mod legacy;
pub mod record;

use tracing::debug;

use crate::arch::os_version::OsVersion;
use crate::error::{Error, Result};

pub use embedded::{ShadowHashPayload, SALTED_SHA512, SALTED_SHA512_PBKDF2};
pub use legacy::{HashFiles, LegacyHashStore, OsHashFiles};
pub use record::{
    lookup_field, FieldValue, HashBytes, HashRecord, Pbkdf2Entropy, Pbkdf2Field, Pbkdf2Record,
    Pbkdf2Salt, SaltedSha512Digest,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OsHashScheme {
    Sha1,
    SaltedSha512,
    SaltedSha512Pbkdf2,
}

impl OsHashScheme {
    pub fn for_version(version: OsVersion) -> Result<Self> {
        match (version.major, version.minor) {
            (10, 5) | (10, 6) => Ok(OsHashScheme::Sha1),
            (10, 7) => Ok(OsHashScheme::SaltedSha512),
            (10, minor) if minor >= 8 => Ok(OsHashScheme::SaltedSha512Pbkdf2),
            (major, _) if major > 10 => Ok(OsHashScheme::SaltedSha512Pbkdf2),
            _ => Err(Error::UnsupportedOsVersion(version.to_string())),
        }
    }

    /// Key inside the embedded plist, `None` for the legacy file scheme.
    pub fn plist_key(self) -> Option<&'static str> {
        match self {
            OsHashScheme::Sha1 => None,
            OsHashScheme::SaltedSha512 => Some(SALTED_SHA512),
            OsHashScheme::SaltedSha512Pbkdf2 => Some(SALTED_SHA512_PBKDF2),
        }
    }

    /// The key a password change under this scheme makes obsolete.
    fn obsolete_key(self) -> Option<&'static str> {
        match self {
            OsHashScheme::Sha1 => None,
            OsHashScheme::SaltedSha512 => Some(SALTED_SHA512_PBKDF2),
            OsHashScheme::SaltedSha512Pbkdf2 => Some(SALTED_SHA512),
        }
    }

    /// Check a flat hex hash against this scheme's length contract.
    ///
    /// The legacy scheme takes the value as-is.
    pub fn validate(self, hex_hash: &str) -> Result<()> {
        let ok = match self {
            OsHashScheme::Sha1 => true,
            OsHashScheme::SaltedSha512 => SaltedSha512Digest::from_hex(hex_hash).is_some(),
            OsHashScheme::SaltedSha512Pbkdf2 => Pbkdf2Entropy::from_hex(hex_hash).is_some(),
        };
        if ok {
            return Ok(());
        }
        Err(Error::Validation(match self {
            OsHashScheme::SaltedSha512 => format!(
                "OS X 10.7 requires a Salted SHA512 hash password of {} characters.  Please check your password and try again.",
                SaltedSha512Digest::HEX_LEN
            ),
            _ => format!(
                "OS X versions > 10.7 require a Salted SHA512 PBKDF2 password hash of {} characters. Please check your password and try again.",
                Pbkdf2Entropy::HEX_LEN
            ),
        }))
    }
}

/// Where the codec reads stored hash material from.
///
/// The codec asks only for what its scheme needs, so a legacy host never has its
/// `ShadowHashData` queried and vice versa.
pub trait ShadowSource {
    /// Contents of the user's legacy hash file; `None` when there is none.
    fn legacy_hash(&self) -> Result<Option<Vec<u8>>>;
    /// The user's embedded shadow hash payload; `None` when the attribute is absent.
    fn shadow_hash_data(&self) -> Result<Option<ShadowHashPayload>>;
}

/// Salt and iteration count to use instead of the ones already on record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pbkdf2Overrides {
    pub salt: Option<Pbkdf2Salt>,
    pub iterations: Option<u64>,
}

impl Pbkdf2Overrides {
    pub fn parse(salt_hex: Option<&str>, iterations: Option<u64>) -> Result<Self> {
        let salt = salt_hex
            .map(|s| {
                Pbkdf2Salt::from_hex(s.trim()).ok_or_else(|| {
                    Error::Validation(format!(
                        "A Salted SHA512 PBKDF2 salt must be {} hexadecimal characters.",
                        Pbkdf2Salt::HEX_LEN
                    ))
                })
            })
            .transpose()?;
        if iterations == Some(0) {
            return Err(Error::Validation(
                "PBKDF2 iterations must be greater than zero.".to_string(),
            ));
        }
        Ok(Self { salt, iterations })
    }
}

/// Result of encoding a new password hash.
#[derive(Clone, Debug, PartialEq)]
pub enum EncodedPassword {
    /// Bytes for the legacy per-user hash file.
    LegacyFile(Vec<u8>),
    /// Payload for the user's `ShadowHashData` attribute.
    Embedded(ShadowHashPayload),
}

/// Translates between flat hex password hashes and the OS-native encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PasswordHashCodec {
    scheme: OsHashScheme,
}

impl PasswordHashCodec {
    pub fn new(scheme: OsHashScheme) -> Self {
        Self { scheme }
    }

    pub fn for_version(version: OsVersion) -> Result<Self> {
        OsHashScheme::for_version(version).map(Self::new)
    }

    pub fn scheme(&self) -> OsHashScheme {
        self.scheme
    }

    pub fn decode(&self, source: &dyn ShadowSource) -> Result<Option<HashRecord>> {
        match self.scheme {
            OsHashScheme::Sha1 => Ok(source
                .legacy_hash()?
                .map(|digest| HashRecord::Sha1 { digest })),
            OsHashScheme::SaltedSha512 => Ok(source
                .shadow_hash_data()?
                .map(|p| p.salted_sha512())
                .transpose()?
                .flatten()
                .map(HashRecord::SaltedSha512)),
            OsHashScheme::SaltedSha512Pbkdf2 => Ok(source
                .shadow_hash_data()?
                .map(|p| p.pbkdf2())
                .transpose()?
                .flatten()
                .map(HashRecord::SaltedSha512Pbkdf2)),
        }
    }

    /// Encode `hex_hash` for this scheme.
    ///
    /// `existing` is the payload currently stored for the user. Embedded schemes
    /// splice into it: keys they don't own survive, the other scheme's key is
    /// dropped. For PBKDF2 the stored salt and iterations are kept unless
    /// `overrides` replaces them.
    pub fn encode(
        &self,
        hex_hash: &str,
        existing: Option<ShadowHashPayload>,
        overrides: &Pbkdf2Overrides,
    ) -> Result<EncodedPassword> {
        self.scheme.validate(hex_hash)?;

        match self.scheme {
            OsHashScheme::Sha1 => Ok(EncodedPassword::LegacyFile(hex_hash.as_bytes().to_vec())),
            OsHashScheme::SaltedSha512 => {
                let digest = SaltedSha512Digest::from_hex(hex_hash)
                    .ok_or_else(|| Error::Validation("invalid Salted SHA512 hash".to_string()))?;
                let mut payload = self.without_obsolete(existing);
                payload.set_salted_sha512(&digest);
                Ok(EncodedPassword::Embedded(payload))
            }
            OsHashScheme::SaltedSha512Pbkdf2 => {
                let entropy = Pbkdf2Entropy::from_hex(hex_hash)
                    .ok_or_else(|| Error::Validation("invalid PBKDF2 entropy".to_string()))?;
                let mut payload = self.without_obsolete(existing);
                let prior = payload.pbkdf2()?;
                let salt = overrides
                    .salt
                    .or_else(|| prior.as_ref().map(|p| p.salt))
                    .ok_or_else(missing_pbkdf2_parameters)?;
                let iterations = overrides
                    .iterations
                    .or_else(|| prior.as_ref().map(|p| p.iterations))
                    .ok_or_else(missing_pbkdf2_parameters)?;
                payload.set_pbkdf2(&Pbkdf2Record {
                    entropy,
                    salt,
                    iterations,
                });
                Ok(EncodedPassword::Embedded(payload))
            }
        }
    }

    fn without_obsolete(&self, existing: Option<ShadowHashPayload>) -> ShadowHashPayload {
        let mut payload = existing.unwrap_or_default();
        if let Some(obsolete) = self.scheme.obsolete_key() {
            if payload.remove(obsolete) {
                debug!(key = obsolete, "dropped obsolete shadow hash entry");
            }
        }
        payload
    }
}

fn missing_pbkdf2_parameters() -> Error {
    Error::Validation(
        "This user has no existing Salted SHA512 PBKDF2 record to take salt and iterations from. Please supply both and try again."
            .to_string(),
    )
}
