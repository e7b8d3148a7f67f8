use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::FID_LEN;

/// A feed identifier: the Ed25519 public key (32 bytes) that names a feed.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeedId(pub [u8; FID_LEN]);

/// Error returned when a [`FeedId`] cannot be parsed from hex or bytes.
#[derive(Debug, thiserror::Error)]
#[error("invalid feed id: expected {FID_LEN} bytes, got {0}")]
pub struct FeedIdLengthError(pub usize);

impl FeedId {
    /// The all-zero feed ID, used to mean "no parent" / "no successor".
    pub const ZERO: FeedId = FeedId([0u8; FID_LEN]);

    /// Build a `FeedId` from a byte slice of exactly [`FID_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, FeedIdLengthError> {
        if bytes.len() != FID_LEN {
            return Err(FeedIdLengthError(bytes.len()));
        }
        let mut buf = [0u8; FID_LEN];
        buf.copy_from_slice(bytes);
        Ok(FeedId(buf))
    }

    /// Borrow the raw 32 bytes.
    pub fn as_bytes(&self) -> &[u8; FID_LEN] {
        &self.0
    }

    /// Whether this is the reserved all-zero feed ID.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; FID_LEN]
    }

    /// Hex-encode the feed ID (lowercase, no prefix).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl AsRef<[u8]> for FeedId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FeedId({}…)", &self.to_hex()[..8])
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for FeedId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes).map_err(|_| hex::FromHexError::InvalidStringLength)
    }
}
