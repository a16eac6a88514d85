//! Error types for the weftnet core.
//!
//! Network-facing failures (malformed packets, bad signatures, MAC
//! mismatches, wrong link state) are dropped silently at the dispatch
//! boundary. Caller contract violations (dotted names, missing private
//! keys, unsupported destination types) are returned loudly.

use thiserror::Error;

/// Core error type for weftnet operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Cryptographic operation failed.
    /// Details are intentionally vague to prevent oracle attacks.
    #[error("cryptographic operation failed")]
    Crypto(String),

    /// Key validation or derivation failed.
    #[error("invalid key material")]
    InvalidKey(String),

    /// Wire protocol error. Malformed packets are silently dropped.
    #[error("protocol error")]
    Protocol(String),

    /// Destination name contains forbidden characters.
    #[error("invalid destination name")]
    InvalidName(String),

    /// Operation is not supported for this destination type.
    #[error("unsupported destination type")]
    Unsupported(String),

    /// An operation requiring a private key was attempted on a
    /// public-only identity.
    #[error("no private key loaded")]
    MissingPrivateKey,

    /// A link operation was attempted in the wrong lifecycle state.
    #[error("invalid link state")]
    LinkState(String),

    /// A registry lookup came up empty.
    #[error("not found")]
    NotFound(String),

    /// A carrier failed to move bytes.
    #[error("carrier error")]
    Carrier(String),
}

/// Result type alias using the weftnet [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error should cause a silent packet drop.
    ///
    /// Malformed input, failed cryptography and protocol state violations
    /// are all network conditions: log locally and move on.
    pub fn should_silent_drop(&self) -> bool {
        matches!(
            self,
            Error::Crypto(_) | Error::Protocol(_) | Error::LinkState(_)
        )
    }
}
