use std::fmt;

use serde::{Deserialize, Serialize};

use crate::MID_LEN;

/// A message ID (the first 20 bytes of `sha256(name ‖ wire)`), or
/// equivalently a blob hash pointer (the first 20 bytes of `sha256(blob)`).
/// Both quantities share the same truncation width and are interchangeable
/// at the type level: a `Mid` becomes `prev_mid` for the next packet in a
/// feed, and a blob's `Mid` becomes the hash pointer that locates it in the
/// content-addressed blob store.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Mid(pub [u8; MID_LEN]);

impl Mid {
    /// The all-zero MID, used as the sentinel "end of chain" pointer.
    pub const ZERO: Mid = Mid([0u8; MID_LEN]);

    /// Build a `Mid` from a byte slice of exactly [`MID_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != MID_LEN {
            return None;
        }
        let mut buf = [0u8; MID_LEN];
        buf.copy_from_slice(bytes);
        Some(Mid(buf))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; MID_LEN]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl AsRef<[u8]> for Mid {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Mid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mid({}…)", &self.to_hex()[..8])
    }
}

impl fmt::Display for Mid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_mid_terminates_chain() {
        assert!(Mid::ZERO.is_zero());
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        assert!(Mid::from_slice(&[0u8; 19]).is_none());
        assert!(Mid::from_slice(&[0u8; 20]).is_some());
    }
}
