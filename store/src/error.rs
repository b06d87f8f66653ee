use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend refused a block write for lack of space.
    #[error("not enough space to store block")]
    NotEnoughSpace,

    /// Operator policy rejected a transaction write.
    #[error("transaction rejected by storage firewall")]
    FirewallRejected,

    /// The requested entity is not present.
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("corrupt entry: {0}")]
    Corrupt(String),
}
