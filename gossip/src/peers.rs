//! Peer identity and the chain-fetch seam.

use std::fmt;

use serde::{Deserialize, Serialize};

use weave_ledger::{Block, BlockIndex, Transaction, WalletList};
use weave_types::{BlockHash, TxId};

use crate::error::GossipError;

/// An opaque peer identity (host:port or similar).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote chain data, as fork recovery and joining need it.
///
/// Implementations back this with the wire protocol; tests script it.
pub trait PeerSource: Send + Sync {
    fn block_index(&self, peer: &PeerId) -> Result<BlockIndex, GossipError>;

    fn block(&self, peer: &PeerId, hash: &BlockHash) -> Result<Block, GossipError>;

    fn tx(&self, peer: &PeerId, id: &TxId) -> Result<Transaction, GossipError>;

    fn wallet_list(&self, peer: &PeerId, root: &[u8; 32]) -> Result<WalletList, GossipError>;
}

/// A peer source with nobody behind it. Stand-alone nodes use this; every
/// fetch reports the peer unavailable.
pub struct NoPeers;

impl PeerSource for NoPeers {
    fn block_index(&self, peer: &PeerId) -> Result<BlockIndex, GossipError> {
        Err(GossipError::PeerUnavailable(peer.clone()))
    }

    fn block(&self, peer: &PeerId, _hash: &BlockHash) -> Result<Block, GossipError> {
        Err(GossipError::PeerUnavailable(peer.clone()))
    }

    fn tx(&self, peer: &PeerId, _id: &TxId) -> Result<Transaction, GossipError> {
        Err(GossipError::PeerUnavailable(peer.clone()))
    }

    fn wallet_list(&self, peer: &PeerId, _root: &[u8; 32]) -> Result<WalletList, GossipError> {
        Err(GossipError::PeerUnavailable(peer.clone()))
    }
}
