//! The closed dispatch-table entry type (§4.F, §9 design notes): fingerprints
//! map to one of these instead of boxed closures, so the table stays
//! `Debug`-able and the `ChainBlob` variant can be journaled verbatim into
//! `pending_chains.json`.

use tinyssb_types::{FeedId, Mid};

/// What to do when a DMX or blob-hash fingerprint matches an incoming frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handler {
    /// The next expected entry of a feed we're replicating.
    FeedEntry { fid: FeedId, seq: u32 },
    /// The next expected blob of a chain we're reassembling.
    ChainBlob { hash: Mid, fid: FeedId, seq: u32, idx: u32 },
    /// Serves incoming WANT requests from peers.
    Want,
    /// Serves incoming CHNK (blob chain) requests from peers.
    Chnk,
    /// Feeds incoming frames to the GOset state machine.
    Goset,
}
