use thiserror::Error;
use weave_types::TxId;

use crate::validator::ValidationError;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("ledger error: {0}")]
    Ledger(#[from] weave_ledger::LedgerError),

    #[error("store error: {0}")]
    Store(#[from] weave_store::StoreError),

    #[error("gossip error: {0}")]
    Gossip(#[from] weave_gossip::GossipError),

    #[error("work error: {0}")]
    Work(#[from] weave_work::WorkError),

    #[error("block validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Invalid(#[from] weave_types::WeaveError),

    #[error("config error: {0}")]
    Config(String),

    #[error("node has not joined a network")]
    NotJoined,

    #[error("recall block is unavailable")]
    RecallUnavailable,

    #[error("transaction {0} is not available")]
    MissingTx(TxId),

    #[error("no peers available")]
    NoPeers,

    #[error("call timed out")]
    Timeout,

    #[error("node worker is gone")]
    ChannelClosed,

    #[error("fork recovery was cancelled")]
    RecoveryCancelled,

    #[error("{0}")]
    Other(String),
}
