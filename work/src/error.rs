use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkError {
    #[error("work search was cancelled")]
    Cancelled,

    #[error("nonce space exhausted at difficulty {0}")]
    Exhausted(u32),
}
