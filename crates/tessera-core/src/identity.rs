// crates/tessera-core/src/identity.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TesseraError;

/// Length of a peer identity in bytes (an ed25519 public key).
pub const PEER_ID_LEN: usize = 32;

/// Identity of a storage node on the Tessera network.
///
/// Opaque public key bytes. Two identities are equal only if every byte
/// matches; no normalization is applied. Displayed and serialized as
/// lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PeerId([u8; PEER_ID_LEN]);

impl PeerId {
    /// Wrap raw public key bytes.
    pub const fn from_bytes(bytes: [u8; PEER_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Build an identity from a byte slice, failing unless it is exactly
    /// `PEER_ID_LEN` bytes long.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, TesseraError> {
        let arr: [u8; PEER_ID_LEN] = bytes.try_into().map_err(|_| {
            TesseraError::Serialization(format!(
                "peer id must be {} bytes, got {}",
                PEER_ID_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Raw public key bytes.
    pub fn as_bytes(&self) -> &[u8; PEER_ID_LEN] {
        &self.0
    }

    /// Lowercase hex encoding of the key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.to_hex())
    }
}

impl FromStr for PeerId {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        Self::try_from_slice(&bytes)
    }
}

impl From<PeerId> for String {
    fn from(id: PeerId) -> Self {
        id.to_hex()
    }
}

impl TryFrom<String> for PeerId {
    type Error = TesseraError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
