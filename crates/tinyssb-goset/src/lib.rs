//! # tinyssb-goset
//!
//! The GOset anti-entropy protocol (§4.E): novelty/claim wire framing and
//! the beacon-round state machine that converges two peers' tracked
//! feed-ID sets without either holding a back-pointer into the other.
//!
//! Grounded on `old/tinyssb/goset.py`'s `GOset` class.

pub mod goset;
pub mod wire;

pub use goset::{GOset, GosetEvent, GOSET_MAX_KEYS, GOSET_ROUND_LEN_SECS};
pub use wire::{Claim, Frame, Novelty, CLAIM_LEN, NOVELTY_LEN};

/// Errors surfaced while parsing GOset wire frames.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GosetError {
    /// A frame was shorter than the 7-byte DMX prefix it must carry.
    #[error("GOset frame too short: {0} bytes")]
    FrameTooShort(usize),

    /// The frame body didn't match either the novelty or claim shape.
    #[error("unrecognized GOset frame body")]
    UnrecognizedFrame,
}

pub type Result<T> = std::result::Result<T, GosetError>;
