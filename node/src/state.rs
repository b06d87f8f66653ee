//! Node state.
//!
//! Owned exclusively by the worker. Handlers mutate a clone that is
//! committed only when the handler succeeds, so every published snapshot is
//! a consistent batch update — readers never observe a partial write.

use weave_gossip::GossipState;
use weave_ledger::{BlockIndex, Tag, Transaction, WalletList};
use weave_types::{BlockHash, RewardAddress, Timestamp, TxId, Winston};

/// The chain as this node knows it.
#[derive(Clone, Debug)]
pub enum ChainIndex {
    /// No chain adopted yet; the first fork recovery joins.
    NotJoined,
    Joined(BlockIndex),
}

impl ChainIndex {
    pub fn is_joined(&self) -> bool {
        matches!(self, ChainIndex::Joined(_))
    }

    pub fn as_index(&self) -> Option<&BlockIndex> {
        match self {
            ChainIndex::NotJoined => None,
            ChainIndex::Joined(index) => Some(index),
        }
    }
}

/// The full mutable state of a node.
#[derive(Clone, Debug)]
pub struct NodeState {
    /// Stable node identifier.
    pub id: Vec<u8>,
    pub chain: ChainIndex,
    /// Chain height; kept equal to `chain` length minus one while joined.
    pub height: u64,
    /// Confirmed wallet tree.
    pub wallet_list: WalletList,
    /// Wallet tree with the active txs speculatively applied.
    pub floating_wallet_list: WalletList,
    /// Active txs, in admission order: propagated long enough to enter the
    /// next block.
    pub txs: Vec<Transaction>,
    /// Txs still inside their propagation delay.
    pub waiting_txs: Vec<Transaction>,
    /// Txs deferred by conflict or late arrival; reconsidered after forks.
    pub potential_txs: Vec<Transaction>,
    pub reward_pool: Winston,
    pub reward_addr: RewardAddress,
    pub weave_size: u64,
    pub diff: u32,
    pub last_retarget: Timestamp,
    /// Tags stamped onto blocks this node mines.
    pub tags: Vec<Tag>,
    /// Throttle between PoW attempts, in milliseconds.
    pub mining_delay_ms: u64,
    pub gossip: GossipState,
    pub automine: bool,
}

impl NodeState {
    /// A fresh, not-joined node.
    pub fn new(id: Vec<u8>, gossip: GossipState, initial_diff: u32) -> Self {
        Self {
            id,
            chain: ChainIndex::NotJoined,
            height: 0,
            wallet_list: WalletList::new(),
            floating_wallet_list: WalletList::new(),
            txs: Vec::new(),
            waiting_txs: Vec::new(),
            potential_txs: Vec::new(),
            reward_pool: Winston::ZERO,
            reward_addr: RewardAddress::Unclaimed,
            weave_size: 0,
            diff: initial_diff,
            last_retarget: Timestamp::EPOCH,
            tags: Vec::new(),
            mining_delay_ms: 0,
            gossip,
            automine: false,
        }
    }

    /// The current tip's independent hash.
    pub fn tip_hash(&self) -> Option<BlockHash> {
        self.chain
            .as_index()
            .and_then(|index| index.tip())
            .map(|entry| entry.indep_hash)
    }

    /// All pooled transactions: active ++ waiting ++ potential.
    pub fn aggregate(&self) -> impl Iterator<Item = &Transaction> {
        self.txs
            .iter()
            .chain(self.waiting_txs.iter())
            .chain(self.potential_txs.iter())
    }

    /// Look a transaction up across all three pools.
    pub fn find_pooled_tx(&self, id: &TxId) -> Option<&Transaction> {
        self.aggregate().find(|tx| tx.id == *id)
    }

    /// Whether any pool already holds this id.
    pub fn has_pooled_tx(&self, id: &TxId) -> bool {
        self.find_pooled_tx(id).is_some()
    }

    /// Pairwise disjointness of the three pools (sanity checks in tests).
    pub fn pools_disjoint(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.aggregate().all(|tx| seen.insert(tx.id))
    }
}
