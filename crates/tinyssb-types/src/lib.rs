//! # tinyssb-types
//!
//! Shared plain-data types for the tinySSB replication fabric: feed
//! identifiers, message identifiers, and the packet-type enum. These types
//! carry no behavior of their own so that every other crate in the
//! workspace can depend on them without pulling in codec, storage, or
//! networking logic.

pub mod feed_id;
pub mod mid;
pub mod packet_type;

pub use feed_id::FeedId;
pub use mid::Mid;
pub use packet_type::PacketType;

/// Length in bytes of a feed identifier (an Ed25519 public key).
pub const FID_LEN: usize = 32;

/// Length in bytes of a message ID / blob hash pointer (truncated SHA-256).
pub const MID_LEN: usize = 20;

/// Length in bytes of the DMX demultiplexing field (truncated SHA-256).
pub const DMX_LEN: usize = 7;

/// Size in bytes of every wire packet and every blob record.
pub const PACKET_LEN: usize = 120;

/// Size in bytes of a packet's payload field.
pub const PAYLOAD_LEN: usize = 48;

/// Size in bytes of an Ed25519 signature.
pub const SIGNATURE_LEN: usize = 64;

/// A 7-byte DMX (demultiplexor) prefix.
pub type Dmx = [u8; DMX_LEN];
