//! The 120-byte log file header block (§3 "Log file").

use tinyssb_types::{FeedId, Mid, PACKET_LEN};

use crate::{Result, StoreError};

/// `reserved(4) ‖ fid(32) ‖ parent_fid(32) ‖ parent_seq(4) ‖ anchor_seq(4) ‖
/// anchor_mid(20) ‖ front_seq(4) ‖ front_mid(20)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogHeader {
    pub fid: FeedId,
    pub parent_fid: FeedId,
    pub parent_seq: u32,
    pub anchor_seq: u32,
    pub anchor_mid: Mid,
    pub front_seq: u32,
    pub front_mid: Mid,
}

impl LogHeader {
    pub fn to_bytes(&self) -> [u8; PACKET_LEN] {
        let mut buf = [0u8; PACKET_LEN];
        // buf[0..4] reserved, stays zero.
        buf[4..36].copy_from_slice(self.fid.as_bytes());
        buf[36..68].copy_from_slice(self.parent_fid.as_bytes());
        buf[68..72].copy_from_slice(&self.parent_seq.to_be_bytes());
        buf[72..76].copy_from_slice(&self.anchor_seq.to_be_bytes());
        buf[76..96].copy_from_slice(self.anchor_mid.as_ref());
        buf[96..100].copy_from_slice(&self.front_seq.to_be_bytes());
        buf[100..120].copy_from_slice(self.front_mid.as_ref());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() != PACKET_LEN {
            return Err(StoreError::HeaderCorrupt);
        }
        let fid = FeedId::from_slice(&buf[4..36]).map_err(|_| StoreError::HeaderCorrupt)?;
        let parent_fid =
            FeedId::from_slice(&buf[36..68]).map_err(|_| StoreError::HeaderCorrupt)?;
        let parent_seq = u32::from_be_bytes(buf[68..72].try_into().expect("4-byte slice"));
        let anchor_seq = u32::from_be_bytes(buf[72..76].try_into().expect("4-byte slice"));
        let anchor_mid = Mid::from_slice(&buf[76..96]).ok_or(StoreError::HeaderCorrupt)?;
        let front_seq = u32::from_be_bytes(buf[96..100].try_into().expect("4-byte slice"));
        let front_mid = Mid::from_slice(&buf[100..120]).ok_or(StoreError::HeaderCorrupt)?;
        Ok(Self {
            fid,
            parent_fid,
            parent_seq,
            anchor_seq,
            anchor_mid,
            front_seq,
            front_mid,
        })
    }

    /// Offset of the front-seq/front-mid fields within the header block,
    /// for in-place updates on append.
    pub const FRONT_OFFSET: u64 = 96;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrips() {
        let hdr = LogHeader {
            fid: FeedId([1u8; 32]),
            parent_fid: FeedId::ZERO,
            parent_seq: 0,
            anchor_seq: 0,
            anchor_mid: Mid([2u8; 20]),
            front_seq: 3,
            front_mid: Mid([4u8; 20]),
        };
        let bytes = hdr.to_bytes();
        assert_eq!(bytes.len(), PACKET_LEN);
        let parsed = LogHeader::from_bytes(&bytes).expect("parse");
        assert_eq!(parsed, hdr);
    }
}
