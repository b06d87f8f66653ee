//! Gossip messages.

use serde::{Deserialize, Serialize};

use weave_crypto::sha256;
use weave_ledger::{Block, Transaction};

/// A message propagated through the gossip network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GossipMessage {
    /// A newly integrated block, with its recall block when the sender has it.
    NewBlock {
        height: u64,
        block: Block,
        recall_block: Option<Block>,
    },
    /// A newly admitted transaction.
    NewTx(Transaction),
}

impl GossipMessage {
    /// Stable message id for deduplication.
    pub fn id(&self) -> [u8; 32] {
        let bytes = bincode::serialize(self).expect("gossip messages are serializable");
        sha256(&bytes)
    }

    /// Approximate wire size, used for transfer-speed accounting.
    pub fn wire_size(&self) -> u64 {
        bincode::serialized_size(self).unwrap_or(0)
    }
}
