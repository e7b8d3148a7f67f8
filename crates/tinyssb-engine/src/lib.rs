//! # tinyssb-engine
//!
//! The replication engine (`NODE`, §4.F): a DMX/blob-hash dispatch table
//! routing incoming frames to feed-entry, blob-chain, WANT, CHNK, and GOset
//! handlers, plus the WANT/CHNK generation loop and pending-chain crash
//! recovery.
//!
//! Grounded on `original_source/tinyssb/tinyssb/node.py`'s `NODE` class
//! (the GOset-based revision only — see `DESIGN.md`).

pub mod engine;
pub mod handler;
pub mod pending;
pub mod wire;

pub use engine::Engine;
pub use handler::Handler;

/// Errors from the replication engine. Validation/protocol rejections are
/// handled as silent drops per §7; these variants are for genuine faults.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] tinyssb_store::StoreError),

    #[error(transparent)]
    Packet(#[from] tinyssb_packet::PacketError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("corrupt pending_chains.json entry")]
    Corrupt,

    #[error("unknown feed id")]
    UnknownFeed,
}

pub type Result<T> = std::result::Result<T, EngineError>;
