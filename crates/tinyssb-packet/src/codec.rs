//! 120-byte packet encode/decode/sign/verify (§3, §4.A).

use tinyssb_types::{FeedId, Mid, PacketType, DMX_LEN, PACKET_LEN, PAYLOAD_LEN, SIGNATURE_LEN};

use crate::{PacketError, Result};

/// A decoded or freshly-built 120-byte log packet, plus the fields needed
/// to re-derive its DMX/name and to arm the handler for the next entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    pub fid: FeedId,
    pub seq: u32,
    pub prev_mid: Mid,
    pub typ: PacketType,
    pub payload: [u8; PAYLOAD_LEN],
    pub signature: [u8; SIGNATURE_LEN],
    pub wire: [u8; PACKET_LEN],
    pub mid: Mid,
}

/// `nam = PFX ‖ fid ‖ be32(seq) ‖ prev_mid` — the expanded entry name that
/// everything else (DMX, signature, MID) is derived from.
fn name(fid: &FeedId, seq: u32, prev_mid: &Mid) -> Vec<u8> {
    let mut buf = Vec::with_capacity(tinyssb_crypto::hashing::WIRE_PREFIX.len() + 32 + 4 + 20);
    buf.extend_from_slice(tinyssb_crypto::hashing::WIRE_PREFIX);
    buf.extend_from_slice(fid.as_bytes());
    buf.extend_from_slice(&seq.to_be_bytes());
    buf.extend_from_slice(prev_mid.as_ref());
    buf
}

/// `dmx = sha256("tinyssb-v0" ‖ fid ‖ be32(seq) ‖ prev_mid)[:7]`.
pub fn compute_dmx(fid: &FeedId, seq: u32, prev_mid: &Mid) -> [u8; DMX_LEN] {
    tinyssb_crypto::hashing::dmx(&name(fid, seq, prev_mid))
}

fn pad_payload(payload: &[u8]) -> Result<[u8; PAYLOAD_LEN]> {
    if payload.len() > PAYLOAD_LEN {
        return Err(PacketError::PayloadTooLong(payload.len()));
    }
    let mut buf = [0u8; PAYLOAD_LEN];
    buf[..payload.len()].copy_from_slice(payload);
    Ok(buf)
}

/// Encode, sign, and finalize a `plain48` entry.
pub fn encode_plain(
    fid: &FeedId,
    seq: u32,
    prev_mid: &Mid,
    payload: &[u8],
    sign_fn: impl FnOnce(&[u8]) -> [u8; SIGNATURE_LEN],
) -> Result<Packet> {
    encode_typed(fid, seq, prev_mid, PacketType::Plain48, payload, sign_fn)
}

/// Encode, sign, and finalize an entry of the given type.
pub fn encode_typed(
    fid: &FeedId,
    seq: u32,
    prev_mid: &Mid,
    typ: PacketType,
    payload: &[u8],
    sign_fn: impl FnOnce(&[u8]) -> [u8; SIGNATURE_LEN],
) -> Result<Packet> {
    let padded = pad_payload(payload)?;
    let nam = name(fid, seq, prev_mid);
    let dmx = tinyssb_crypto::hashing::dmx(&nam);

    let mut msg = Vec::with_capacity(DMX_LEN + 1 + PAYLOAD_LEN);
    msg.extend_from_slice(&dmx);
    msg.push(typ.to_byte());
    msg.extend_from_slice(&padded);

    let mut signed_over = nam.clone();
    signed_over.extend_from_slice(&msg);
    let signature = sign_fn(&signed_over);

    let mut wire = [0u8; PACKET_LEN];
    wire[..msg.len()].copy_from_slice(&msg);
    wire[msg.len()..].copy_from_slice(&signature);

    let mut mid_input = nam;
    mid_input.extend_from_slice(&wire);
    let mid = tinyssb_crypto::hashing::mid20(&mid_input);

    Ok(Packet {
        fid: *fid,
        seq,
        prev_mid: *prev_mid,
        typ,
        payload: padded,
        signature,
        wire,
        mid,
    })
}

/// Decode and verify a 120-byte buffer against the feed it is expected to
/// extend. Recomputes the DMX and compares it to `buf[0..7]`, then checks
/// the Ed25519 signature over the expanded name+message.
pub fn decode(
    buf: &[u8],
    fid: &FeedId,
    seq: u32,
    prev_mid: &Mid,
    verify_fn: impl FnOnce(&FeedId, &[u8; SIGNATURE_LEN], &[u8]) -> bool,
) -> Result<Packet> {
    if buf.len() != PACKET_LEN {
        return Err(PacketError::ShortBuffer {
            expected: PACKET_LEN,
            actual: buf.len(),
        });
    }

    let nam = name(fid, seq, prev_mid);
    let expected_dmx = tinyssb_crypto::hashing::dmx(&nam);
    if expected_dmx != buf[..DMX_LEN] {
        return Err(PacketError::InvalidDmx);
    }

    let typ = PacketType::from_byte(buf[7])?;
    let mut payload = [0u8; PAYLOAD_LEN];
    payload.copy_from_slice(&buf[8..56]);
    let mut signature = [0u8; SIGNATURE_LEN];
    signature.copy_from_slice(&buf[56..120]);

    let mut signed_over = nam.clone();
    signed_over.extend_from_slice(&buf[..56]);
    if !verify_fn(fid, &signature, &signed_over) {
        return Err(PacketError::BadSignature);
    }

    let mut wire = [0u8; PACKET_LEN];
    wire.copy_from_slice(buf);

    let mut mid_input = nam;
    mid_input.extend_from_slice(&wire);
    let mid = tinyssb_crypto::hashing::mid20(&mid_input);

    Ok(Packet {
        fid: *fid,
        seq,
        prev_mid: *prev_mid,
        typ,
        payload,
        signature,
        wire,
        mid,
    })
}

/// Parse a 120-byte buffer into a [`Packet`] without recomputing the DMX or
/// checking the signature. Used only to read back entries a log store has
/// already verified at append time (§4.C: `LogHandle.read` does not
/// persist per-entry MIDs, so it cannot reverify the previous-hash link on
/// every read; it trusts the file).
pub fn decode_unchecked(buf: &[u8], fid: &FeedId, seq: u32, prev_mid: &Mid) -> Result<Packet> {
    if buf.len() != PACKET_LEN {
        return Err(PacketError::ShortBuffer {
            expected: PACKET_LEN,
            actual: buf.len(),
        });
    }
    let typ = PacketType::from_byte(buf[7])?;
    let mut payload = [0u8; PAYLOAD_LEN];
    payload.copy_from_slice(&buf[8..56]);
    let mut signature = [0u8; SIGNATURE_LEN];
    signature.copy_from_slice(&buf[56..120]);
    let mut wire = [0u8; PACKET_LEN];
    wire.copy_from_slice(buf);

    let nam = name(fid, seq, prev_mid);
    let mut mid_input = nam;
    mid_input.extend_from_slice(&wire);
    let mid = tinyssb_crypto::hashing::mid20(&mid_input);

    Ok(Packet {
        fid: *fid,
        seq,
        prev_mid: *prev_mid,
        typ,
        payload,
        signature,
        wire,
        mid,
    })
}

impl Packet {
    /// The DMX a receiver should arm to recognize this feed's *next* entry.
    pub fn predict_next_dmx(&self) -> [u8; DMX_LEN] {
        compute_dmx(&self.fid, self.seq + 1, &self.mid)
    }

    pub fn has_sidechain(&self) -> bool {
        self.typ == PacketType::Chain20
    }
}
