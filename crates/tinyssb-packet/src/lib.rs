//! # tinyssb-packet
//!
//! The 120-byte packet codec (§4.A) and the blob sidechain (§4.B).
//!
//! Grounded on `tinyssb/packet.py`'s `PACKET`/`_dmx`/`_mid`/`mk_chain`/
//! `undo_chain`/`btc_var_int*` functions, byte-exact.

pub mod chain;
pub mod codec;
pub mod varint;

pub use chain::{undo_chain, ChainOutcome};
pub use codec::{decode, decode_unchecked, encode_plain, encode_typed, Packet};

/// Errors from encoding, decoding, or chain reassembly. Validation
/// failures — never panics, per §4.A.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PacketError {
    /// Input buffer was not exactly 120 bytes where 120 was required.
    #[error("short buffer: expected {expected}, got {actual}")]
    ShortBuffer { expected: usize, actual: usize },

    /// Recomputed DMX did not match the buffer's leading 7 bytes.
    #[error("DMX mismatch: packet does not extend the expected feed/seq/prev")]
    InvalidDmx,

    /// Ed25519 signature verification failed.
    #[error("signature verification failed")]
    BadSignature,

    /// Payload exceeded the 48-byte field width.
    #[error("payload too long: {0} bytes, max 48")]
    PayloadTooLong(usize),

    /// Packet type byte was not one of the known `PacketType` variants.
    #[error(transparent)]
    UnknownType(#[from] tinyssb_types::packet_type::UnknownPacketType),

    /// VarInt-encoded chain length did not fit in a usable range.
    #[error("invalid varint encoding")]
    InvalidVarInt,
}

pub type Result<T> = std::result::Result<T, PacketError>;
