//! Version identifiers.
//!
//! `version_id = hex(SHA-512(canonical_projection)[..32])`

use sha2::{Digest, Sha512};

use crate::error::{Error, Result};

/// Length of a version id in bytes (the SHA-512 digest truncated to 256 bits).
pub const VERSION_ID_LEN: usize = 32;

/// A truncated SHA-512 digest identifying one version of a post.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionId([u8; VERSION_ID_LEN]);

impl VersionId {
    /// Hash arbitrary bytes and keep the first 32 bytes of the digest.
    pub fn digest(data: &[u8]) -> Self {
        let full = Sha512::digest(data);
        let mut truncated = [0u8; VERSION_ID_LEN];
        truncated.copy_from_slice(&full[..VERSION_ID_LEN]);
        Self(truncated)
    }

    pub fn from_bytes(bytes: [u8; VERSION_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a 64 character hex version id.
    pub fn from_hex(s: &str) -> Result<Self> {
        let mut bytes = [0u8; VERSION_ID_LEN];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| Error::InvalidField {
            field: "version.id".into(),
            reason: e.to_string(),
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; VERSION_ID_LEN] {
        &self.0
    }

    /// Encode as lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for VersionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VersionId({})", self.to_hex())
    }
}

impl std::fmt::Display for VersionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
