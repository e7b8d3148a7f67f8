//! Blob sidechain: splitting an arbitrarily long payload into a `chain20`
//! head packet plus a hash-linked list of 120-byte blobs, and reassembling
//! it back (§4.B).

use tinyssb_types::{FeedId, Mid, PacketType, SIGNATURE_LEN};

use crate::codec::{encode_typed, Packet};
use crate::varint;
use crate::{PacketError, Result};

/// A single 120-byte blob: `100 B data ‖ 20 B next_ptr` (`next_ptr = 0…0`
/// terminates the chain).
pub type Blob = [u8; 120];

/// Outcome of attempting to reassemble a `chain20` entry's full content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainOutcome {
    /// All content bytes have been gathered.
    Complete(Vec<u8>),
    /// Reassembly is blocked on a blob not yet available locally.
    NeedBlob(Mid),
}

fn blob_hash(blob: &Blob) -> Mid {
    tinyssb_crypto::hashing::mid20(blob)
}

/// Build a `chain20` head packet plus its blobs (head-first) for `content`.
pub fn mk_chain(
    fid: &FeedId,
    seq: u32,
    prev_mid: &Mid,
    content: &[u8],
    sign_fn: impl FnOnce(&[u8]) -> [u8; SIGNATURE_LEN],
) -> Result<(Packet, Vec<Blob>)> {
    let len_prefix = varint::encode(content.len() as u64);
    let mut buf = len_prefix;
    buf.extend_from_slice(content);

    let mut blobs: Vec<Blob> = Vec::new();
    let payload: Vec<u8>;

    if buf.len() <= 28 {
        let mut p = vec![0u8; 48];
        p[..buf.len()].copy_from_slice(&buf);
        // bytes 28..48 are already zero (no sidechain pointer).
        payload = p;
    } else {
        let head = buf[..28].to_vec();
        let mut tail = buf[28..].to_vec();
        let rem = tail.len() % 100;
        if rem > 0 {
            tail.resize(tail.len() + (100 - rem), 0);
        }

        let mut ptr = Mid::ZERO;
        while !tail.is_empty() {
            let slab_start = tail.len() - 100;
            let mut blob = [0u8; 120];
            blob[..100].copy_from_slice(&tail[slab_start..]);
            blob[100..].copy_from_slice(ptr.as_ref());
            ptr = blob_hash(&blob);
            blobs.push(blob);
            tail.truncate(slab_start);
        }
        blobs.reverse();

        let mut p = head;
        p.extend_from_slice(ptr.as_ref());
        payload = p;
    }

    let head_pkt = encode_typed(fid, seq, prev_mid, PacketType::Chain20, &payload, sign_fn)?;
    Ok((head_pkt, blobs))
}

/// Attempt to reassemble a `chain20` packet's content, fetching blobs via
/// `fetch_blob_fn` as needed. Returns [`ChainOutcome::NeedBlob`] the moment a
/// required blob is unavailable, so the caller can arm a handler for it and
/// resume later with the same head packet.
pub fn undo_chain(
    packet: &Packet,
    mut fetch_blob_fn: impl FnMut(&Mid) -> Option<Blob>,
) -> Result<ChainOutcome> {
    if packet.typ != PacketType::Chain20 {
        return Err(PacketError::InvalidVarInt);
    }

    let (chain_len, varlen) = varint::decode(&packet.payload)?;
    let chain_len = chain_len as usize;
    let head_content_len = (28usize.saturating_sub(varlen)).min(chain_len);
    let mut content = packet.payload[varlen..varlen + head_content_len].to_vec();

    if content.len() == chain_len {
        return Ok(ChainOutcome::Complete(content));
    }

    let mut next_ptr = Mid::from_slice(&packet.payload[28..48]).expect("20 bytes");
    if next_ptr.is_zero() {
        // Malformed: more content claimed than fits, but no chain pointer.
        return Ok(ChainOutcome::Complete(content));
    }

    loop {
        let Some(blob) = fetch_blob_fn(&next_ptr) else {
            return Ok(ChainOutcome::NeedBlob(next_ptr));
        };
        let remaining = chain_len - content.len();
        let take = remaining.min(100);
        content.extend_from_slice(&blob[..take]);

        if content.len() == chain_len {
            return Ok(ChainOutcome::Complete(content));
        }

        let ptr = Mid::from_slice(&blob[100..120]).expect("20 bytes");
        if ptr.is_zero() {
            // Chain terminated before all claimed bytes arrived; treat what
            // we have as the final content rather than looping forever.
            return Ok(ChainOutcome::Complete(content));
        }
        next_ptr = ptr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinyssb_crypto::ed25519::KeyPair;

    fn fid_of(kp: &KeyPair) -> FeedId {
        FeedId(kp.verifying_key.to_bytes())
    }

    fn roundtrip(content: &[u8]) {
        let kp = KeyPair::generate();
        let fid = fid_of(&kp);
        let prev = Mid([1u8; 20]);
        let (head, blobs) =
            mk_chain(&fid, 1, &prev, content, |msg| kp.signing_key.sign(msg).to_bytes())
                .expect("mk_chain");

        let store: std::collections::HashMap<Mid, Blob> = blobs
            .iter()
            .map(|b| (blob_hash(b), *b))
            .collect();

        let outcome = undo_chain(&head, |h| store.get(h).copied()).expect("undo_chain");
        match outcome {
            ChainOutcome::Complete(bytes) => assert_eq!(bytes, content),
            ChainOutcome::NeedBlob(_) => panic!("expected complete reassembly"),
        }
    }

    #[test]
    fn test_boundary_lengths() {
        for len in [0usize, 27, 28, 29, 128, 65536] {
            roundtrip(&vec![0xABu8; len]);
        }
    }

    #[test]
    fn test_large_payload_matches_expected_blob_count() {
        let content = vec![0x11u8; 5000];
        let kp = KeyPair::generate();
        let fid = fid_of(&kp);
        let prev = Mid::ZERO;
        let (_, blobs) =
            mk_chain(&fid, 1, &prev, &content, |msg| kp.signing_key.sign(msg).to_bytes())
                .expect("mk_chain");
        let varlen = varint::encode(content.len() as u64).len();
        let expected = (content.len() + varlen - 28).div_ceil(100);
        assert_eq!(blobs.len(), expected);
    }

    #[test]
    fn test_missing_blob_reports_need_blob() {
        let content = vec![0x22u8; 300];
        let kp = KeyPair::generate();
        let fid = fid_of(&kp);
        let prev = Mid::ZERO;
        let (head, blobs) =
            mk_chain(&fid, 1, &prev, &content, |msg| kp.signing_key.sign(msg).to_bytes())
                .expect("mk_chain");
        assert!(blobs.len() > 1);

        let outcome = undo_chain(&head, |_| None).expect("undo_chain");
        match outcome {
            ChainOutcome::NeedBlob(h) => assert_eq!(h, blob_hash(&blobs[0])),
            ChainOutcome::Complete(_) => panic!("expected NeedBlob"),
        }
    }

    #[test]
    fn test_fits_in_head_needs_no_blobs() {
        let kp = KeyPair::generate();
        let fid = fid_of(&kp);
        let prev = Mid::ZERO;
        let (_, blobs) = mk_chain(&fid, 1, &prev, b"short", |msg| {
            kp.signing_key.sign(msg).to_bytes()
        })
        .expect("mk_chain");
        assert!(blobs.is_empty());
    }
}
