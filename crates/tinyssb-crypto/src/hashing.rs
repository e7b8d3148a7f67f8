//! SHA-256 truncations used across the wire format: the 7-byte DMX
//! demultiplexor, the 20-byte message ID / blob hash pointer.
//!
//! Grounded on `tinyssb/packet.py`'s `_dmx`/`_mid` free functions and
//! `repository.py`'s `add_blob` hashing.

use sha2::{Digest, Sha256};
use tinyssb_types::{Dmx, Mid, DMX_LEN, MID_LEN};

/// The fixed protocol version prefix hashed into every DMX/name computation.
pub const WIRE_PREFIX: &[u8] = b"tinyssb-v0";

/// `sha256(data)[:7]` — the DMX demultiplexor.
pub fn dmx(data: &[u8]) -> Dmx {
    let digest = Sha256::digest(data);
    let mut out = [0u8; DMX_LEN];
    out.copy_from_slice(&digest[..DMX_LEN]);
    out
}

/// `sha256(data)[:20]` — a message ID or blob hash pointer.
pub fn mid20(data: &[u8]) -> Mid {
    let digest = Sha256::digest(data);
    let mut out = [0u8; MID_LEN];
    out.copy_from_slice(&digest[..MID_LEN]);
    Mid(out)
}

/// Full, untruncated SHA-256 digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dmx_is_seven_bytes_of_sha256() {
        let full = sha256(b"hello");
        let d = dmx(b"hello");
        assert_eq!(&full[..DMX_LEN], &d[..]);
    }

    #[test]
    fn test_mid20_is_twenty_bytes_of_sha256() {
        let full = sha256(b"hello");
        let m = mid20(b"hello");
        assert_eq!(&full[..MID_LEN], &m.0[..]);
    }

    #[test]
    fn test_different_inputs_differ() {
        assert_ne!(dmx(b"a"), dmx(b"b"));
        assert_ne!(mid20(b"a").0, mid20(b"b").0);
    }
}
