//! WANT/CHNK control-frame bodies (§4.F, §6 External Interfaces).
//!
//! The distilled protocol leaves these BIPF-encoded; BIPF itself is out of
//! scope here (§1 Purpose & Scope), so the rotating index vectors are
//! encoded with the same fixed-width, big-endian discipline the rest of the
//! wire format uses, over the reference's `[offset, s0, s1, …]` /
//! `[[feed_index, seq, chunk_index], …]` shapes.

/// Max encoded body size a control frame is allowed to grow to before the
/// sender stops packing more entries in (mirrors the reference's "BIPF
/// vector would exceed 100 bytes" cutoff).
pub const MAX_BODY_LEN: usize = 100;

/// How many packets/blobs a single incoming WANT/CHNK request is served.
pub const CREDIT: u32 = 3;

/// Encode a WANT body: `offset(1) ‖ (seq:u32 BE)*`.
pub fn encode_want(offset: u8, seqs: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + 4 * seqs.len());
    out.push(offset);
    for s in seqs {
        out.extend_from_slice(&s.to_be_bytes());
    }
    out
}

/// Decode a WANT body back into `(offset, seqs)`.
pub fn decode_want(body: &[u8]) -> Option<(u8, Vec<u32>)> {
    if body.is_empty() {
        return None;
    }
    let offset = body[0];
    let rest = &body[1..];
    if rest.len() % 4 != 0 {
        return None;
    }
    let seqs = rest
        .chunks_exact(4)
        .map(|c| u32::from_be_bytes(c.try_into().expect("chunk is 4 bytes")))
        .collect();
    Some((offset, seqs))
}

/// How many WANT entries fit under [`MAX_BODY_LEN`].
pub fn want_capacity() -> usize {
    (MAX_BODY_LEN - 1) / 4
}

/// A single CHNK request triple: `(feed_index, seq, blob_index)`.
pub type ChnkEntry = (u8, u32, u8);

/// Encode a CHNK body: repeated `feed_index(1) ‖ seq:u32 BE ‖ blob_index(1)`.
pub fn encode_chnk(entries: &[ChnkEntry]) -> Vec<u8> {
    let mut out = Vec::with_capacity(6 * entries.len());
    for (idx, seq, blob_idx) in entries {
        out.push(*idx);
        out.extend_from_slice(&seq.to_be_bytes());
        out.push(*blob_idx);
    }
    out
}

/// Decode a CHNK body back into its triples.
pub fn decode_chnk(body: &[u8]) -> Option<Vec<ChnkEntry>> {
    if body.len() % 6 != 0 {
        return None;
    }
    Some(
        body.chunks_exact(6)
            .map(|c| {
                let seq = u32::from_be_bytes([c[1], c[2], c[3], c[4]]);
                (c[0], seq, c[5])
            })
            .collect(),
    )
}

/// How many CHNK entries fit under [`MAX_BODY_LEN`].
pub fn chnk_capacity() -> usize {
    MAX_BODY_LEN / 6
}
