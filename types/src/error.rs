//! Top-level error type shared across crates.

use thiserror::Error;

/// Common error type for the Weave protocol.
#[derive(Debug, Error)]
pub enum WeaveError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key: {0}")]
    InvalidKey(String),

    #[error("invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("probability out of range [0, 1]: {0}")]
    InvalidProbability(f64),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),
}
