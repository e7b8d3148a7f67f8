//! # tinyssb-store
//!
//! The on-disk append-only log store (§4.C) and the feed registry (§4.D):
//! per-feed log files, a content-addressed blob store, and classification
//! of known feeds as private / public-local / public-remote.
//!
//! Grounded on `repository.py` (on-disk layout, `mk_child_log` /
//! `mk_continuation_log`, blob sharding).

pub mod blob;
pub mod header;
pub mod log;
pub mod registry;
pub mod store;

pub use blob::BlobStore;
pub use log::LogHandle;
pub use registry::{FeedKind, FeedRegistry};
pub use store::Store;

/// Errors from the log store and blob store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("packet error: {0}")]
    Packet(#[from] tinyssb_packet::PacketError),

    #[error("log already exists for this feed")]
    AlreadyExists,

    #[error("no log for this feed")]
    NotFound,

    #[error("log header is corrupt or truncated")]
    HeaderCorrupt,

    #[error("append is out of sequence: expected {expected}, got {actual}")]
    SeqOutOfOrder { expected: u32, actual: u32 },

    #[error("feed has been terminated by a contdas entry")]
    FeedTerminated,
}

pub type Result<T> = std::result::Result<T, StoreError>;
