//! Bitcoin-style VarInt encoding, used only for the chain-length field of a
//! `chain20` payload (§4.B, step 1). Not to be confused with BIPF's own
//! variable-length integers, which are out of scope (§1).

use crate::{PacketError, Result};

/// Encode a length as a Bitcoin VarInt: 1, 3, 5, or 9 bytes depending on
/// magnitude.
pub fn encode(value: u64) -> Vec<u8> {
    if value <= 252 {
        vec![value as u8]
    } else if value <= 0xFFFF {
        let mut out = vec![0xFD];
        out.extend_from_slice(&(value as u16).to_le_bytes());
        out
    } else if value <= 0xFFFF_FFFF {
        let mut out = vec![0xFE];
        out.extend_from_slice(&(value as u32).to_le_bytes());
        out
    } else {
        let mut out = vec![0xFF];
        out.extend_from_slice(&value.to_le_bytes());
        out
    }
}

/// Decode a VarInt from the start of `buf`, returning `(value, bytes_consumed)`.
pub fn decode(buf: &[u8]) -> Result<(u64, usize)> {
    if buf.is_empty() {
        return Err(PacketError::InvalidVarInt);
    }
    let head = buf[0];
    if head <= 252 {
        return Ok((head as u64, 1));
    }
    if head == 0xFD {
        if buf.len() < 3 {
            return Err(PacketError::InvalidVarInt);
        }
        let mut b = [0u8; 2];
        b.copy_from_slice(&buf[1..3]);
        return Ok((u16::from_le_bytes(b) as u64, 3));
    }
    if head == 0xFE {
        if buf.len() < 5 {
            return Err(PacketError::InvalidVarInt);
        }
        let mut b = [0u8; 4];
        b.copy_from_slice(&buf[1..5]);
        return Ok((u32::from_le_bytes(b) as u64, 5));
    }
    // head == 0xFF
    if buf.len() < 9 {
        return Err(PacketError::InvalidVarInt);
    }
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[1..9]);
    Ok((u64::from_le_bytes(b), 9))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_values_are_one_byte() {
        assert_eq!(encode(0), vec![0]);
        assert_eq!(encode(252), vec![252]);
    }

    #[test]
    fn test_boundary_253_uses_0xfd() {
        let enc = encode(253);
        assert_eq!(enc[0], 0xFD);
        assert_eq!(enc.len(), 3);
    }

    #[test]
    fn test_boundary_0x10000_uses_0xfe() {
        let enc = encode(0x10000);
        assert_eq!(enc[0], 0xFE);
        assert_eq!(enc.len(), 5);
    }

    #[test]
    fn test_boundary_0x1_0000_0000_uses_0xff() {
        let enc = encode(0x1_0000_0000);
        assert_eq!(enc[0], 0xFF);
        assert_eq!(enc.len(), 9);
    }

    #[test]
    fn test_decode_matches_known_vectors() {
        assert_eq!(decode(&[0xFC]).unwrap(), (0xFC, 1));
        assert_eq!(decode(&[0xFD, 0x01, 0x00]).unwrap(), (1, 3));
        assert_eq!(
            decode(&[0xFE, 0x00, 0x00, 0x01, 0x00]).unwrap(),
            (0x0001_0000, 5)
        );
        assert_eq!(
            decode(&[0xFF, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]).unwrap(),
            (0x0000_0001_0000_0000, 9)
        );
    }

    #[test]
    fn test_roundtrip_various_sizes() {
        for v in [0u64, 1, 127, 252, 253, 0xFFFF, 0x10000, 5000, 65536, 0xFFFF_FFFF, 0x1_0000_0001] {
            let enc = encode(v);
            let (decoded, used) = decode(&enc).expect("decode");
            assert_eq!(decoded, v);
            assert_eq!(used, enc.len());
        }
    }

    #[test]
    fn test_decode_rejects_truncated_buffers() {
        assert!(decode(&[]).is_err());
        assert!(decode(&[0xFD, 0x01]).is_err());
        assert!(decode(&[0xFE, 0x00, 0x00]).is_err());
        assert!(decode(&[0xFF, 0x00, 0x00, 0x00]).is_err());
    }
}
