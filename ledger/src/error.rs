use thiserror::Error;
use weave_types::{Address, TxId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient balance for {address}: need {needed}, have {available}")]
    InsufficientBalance {
        address: Address,
        needed: u128,
        available: u128,
    },

    #[error("balance overflow for {0}")]
    BalanceOverflow(Address),

    #[error("transaction field {field} is {len} bytes, limit {max}")]
    FieldTooLarge {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("transaction is {size} bytes, limit {max}")]
    TxTooLarge { size: u64, max: u64 },

    #[error("declared data_size {declared} does not match payload length {actual}")]
    DataSizeMismatch { declared: u64, actual: u64 },

    #[error("declared data_root does not match payload")]
    DataRootMismatch,

    #[error("invalid transaction signature")]
    InvalidSignature,

    #[error("transaction {0} not found")]
    MissingTx(TxId),
}
