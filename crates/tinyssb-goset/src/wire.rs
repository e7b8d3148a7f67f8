//! Wire framing for GOset novelty and claim frames (§4.E).
//!
//! Grounded on `old/tinyssb/goset.py`'s `Novelty`/`Claim` classes and their
//! `mkNovelty_from_key`/`mkClaim`/`mkClaim_from_bytes` builders.

use tinyssb_types::FeedId;

/// Fixed 7-byte DMX every GOset frame is prefixed with on the wire:
/// `sha256("tinySSB-0.1 GOset 1")[:7]`.
pub fn goset_dmx() -> [u8; 7] {
    tinyssb_crypto::hashing::dmx(b"tinySSB-0.1 GOset 1")
}

/// Size of a novelty frame's body (after the 7-byte DMX): `'n' ‖ key(32)`.
pub const NOVELTY_LEN: usize = 33;

/// Size of a claim frame's body (after the 7-byte DMX):
/// `'c' ‖ lo(32) ‖ hi(32) ‖ xor(32) ‖ sz(1)`.
pub const CLAIM_LEN: usize = 98;

/// A minimal announcement of a single new key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Novelty {
    pub key: FeedId,
}

impl Novelty {
    /// Encode the 33-byte body (without the leading DMX).
    pub fn to_body(self) -> [u8; NOVELTY_LEN] {
        let mut out = [0u8; NOVELTY_LEN];
        out[0] = b'n';
        out[1..].copy_from_slice(self.key.as_bytes());
        out
    }

    pub fn from_body(buf: &[u8]) -> Option<Self> {
        if buf.len() != NOVELTY_LEN || buf[0] != b'n' {
            return None;
        }
        let key = FeedId::from_slice(&buf[1..NOVELTY_LEN]).ok()?;
        Some(Novelty { key })
    }

    /// The full wire frame: `goset_dmx ‖ body`.
    pub fn to_frame(self) -> Vec<u8> {
        let mut frame = goset_dmx().to_vec();
        frame.extend_from_slice(&self.to_body());
        frame
    }
}

/// An assertion that the XOR of a contiguous range of `sz` keys equals `xor`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Claim {
    pub lo: FeedId,
    pub hi: FeedId,
    pub xor: [u8; 32],
    pub sz: u8,
}

impl Claim {
    pub fn to_body(&self) -> [u8; CLAIM_LEN] {
        let mut out = [0u8; CLAIM_LEN];
        out[0] = b'c';
        out[1..33].copy_from_slice(self.lo.as_bytes());
        out[33..65].copy_from_slice(self.hi.as_bytes());
        out[65..97].copy_from_slice(&self.xor);
        out[97] = self.sz;
        out
    }

    pub fn from_body(buf: &[u8]) -> Option<Self> {
        if buf.len() != CLAIM_LEN || buf[0] != b'c' {
            return None;
        }
        let lo = FeedId::from_slice(&buf[1..33]).ok()?;
        let hi = FeedId::from_slice(&buf[33..65]).ok()?;
        let mut xor = [0u8; 32];
        xor.copy_from_slice(&buf[65..97]);
        let sz = buf[97];
        Some(Claim { lo, hi, xor, sz })
    }

    pub fn to_frame(&self) -> Vec<u8> {
        let mut frame = goset_dmx().to_vec();
        frame.extend_from_slice(&self.to_body());
        frame
    }
}

/// A parsed GOset frame, dispatched by body length and leading type byte.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Novelty(Novelty),
    Claim(Claim),
}

impl Frame {
    /// Parse a frame body (the bytes after the 7-byte DMX prefix).
    pub fn parse(body: &[u8]) -> Option<Frame> {
        if body.len() == NOVELTY_LEN && body[0] == b'n' {
            return Novelty::from_body(body).map(Frame::Novelty);
        }
        if body.len() == CLAIM_LEN && body[0] == b'c' {
            return Claim::from_body(body).map(Frame::Claim);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_novelty_roundtrips() {
        let n = Novelty { key: FeedId([3u8; 32]) };
        let body = n.to_body();
        assert_eq!(body.len(), NOVELTY_LEN);
        let parsed = Novelty::from_body(&body).expect("parse");
        assert_eq!(parsed, n);
    }

    #[test]
    fn test_claim_roundtrips() {
        let c = Claim {
            lo: FeedId([1u8; 32]),
            hi: FeedId([2u8; 32]),
            xor: [3u8; 32],
            sz: 2,
        };
        let body = c.to_body();
        assert_eq!(body.len(), CLAIM_LEN);
        let parsed = Claim::from_body(&body).expect("parse");
        assert_eq!(parsed, c);
    }

    #[test]
    fn test_frame_dispatches_by_shape() {
        let n = Novelty { key: FeedId([9u8; 32]) };
        match Frame::parse(&n.to_body()) {
            Some(Frame::Novelty(parsed)) => assert_eq!(parsed, n),
            other => panic!("expected novelty, got {other:?}"),
        }

        let c = Claim {
            lo: FeedId([1u8; 32]),
            hi: FeedId([2u8; 32]),
            xor: [0u8; 32],
            sz: 2,
        };
        match Frame::parse(&c.to_body()) {
            Some(Frame::Claim(parsed)) => assert_eq!(parsed, c),
            other => panic!("expected claim, got {other:?}"),
        }
    }

    #[test]
    fn test_frame_rejects_garbage() {
        assert_eq!(Frame::parse(&[0u8; 10]), None);
    }

    #[test]
    fn test_frame_includes_fixed_dmx_prefix() {
        let n = Novelty { key: FeedId([1u8; 32]) };
        let frame = n.to_frame();
        assert_eq!(&frame[..7], &goset_dmx());
        assert_eq!(frame.len(), 7 + NOVELTY_LEN);
    }
}
