//! # tinyssb-crypto
//!
//! Cryptographic primitives for the tinySSB replication fabric: Ed25519
//! signing/verification and the SHA-256 truncations (DMX, MID, blob hash)
//! used throughout the wire format. The signature scheme is fixed; no
//! algorithm negotiation is performed.
//!
//! ## Modules
//!
//! - [`ed25519`] — signing/verifying key and signature newtypes.
//! - [`hashing`] — `sha256`-based DMX / MID / blob-hash truncation helpers.

pub mod ed25519;
pub mod hashing;

/// Error types for cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Ed25519 signature verification failed.
    #[error("signature verification failed")]
    SignatureVerification,

    /// Invalid key or signature length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Invalid input data.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
