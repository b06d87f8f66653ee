//! Blocks.
//!
//! A block's independent hash covers every header field except the nonce, so
//! the miner can fix the header, then search nonces against the proof-of-work
//! predicate `PoW(indep_hash, nonce, recall_hash, diff)`.

use serde::{Deserialize, Serialize};

use weave_crypto::{merkle_root, sha256_multi};
use weave_types::{BlockHash, RewardAddress, Timestamp, TxId, Winston};

use crate::tx::{Tag, Transaction};
use crate::wallet_list::WalletList;

/// A Weave block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Hash of the header (everything below except `nonce`).
    pub indep_hash: BlockHash,
    /// The previous block's independent hash; zero for genesis.
    pub previous: BlockHash,
    pub height: u64,
    pub timestamp: Timestamp,
    /// Timestamp of the last difficulty retarget.
    pub last_retarget: Timestamp,
    /// Difficulty: required leading zero bits of the work digest.
    pub diff: u32,
    /// The proof-of-work nonce.
    pub nonce: u64,
    /// Ids of the transactions confirmed by this block, in order.
    pub txs: Vec<TxId>,
    /// Merkle root over the confirmed transactions.
    pub tx_root: [u8; 32],
    /// Merkle root of the wallet tree after applying this block.
    pub wallet_root: [u8; 32],
    pub reward_addr: RewardAddress,
    /// The reward pool after paying this block's finder.
    pub reward_pool: Winston,
    /// Cumulative bytes of transaction data across the whole chain.
    pub weave_size: u64,
    /// Bytes of transaction data in this block alone.
    pub block_size: u64,
    pub tags: Vec<Tag>,
}

impl Block {
    /// Recompute the independent hash from the header fields.
    pub fn compute_indep_hash(&self) -> BlockHash {
        let mut tx_ids = Vec::with_capacity(self.txs.len() * 32);
        for id in &self.txs {
            tx_ids.extend_from_slice(id.as_bytes());
        }
        let mut tag_bytes = Vec::new();
        for tag in &self.tags {
            tag_bytes.extend_from_slice(&(tag.name.len() as u32).to_be_bytes());
            tag_bytes.extend_from_slice(&tag.name);
            tag_bytes.extend_from_slice(&(tag.value.len() as u32).to_be_bytes());
            tag_bytes.extend_from_slice(&tag.value);
        }
        BlockHash::new(sha256_multi(&[
            self.previous.as_bytes(),
            &self.height.to_be_bytes(),
            &self.timestamp.as_secs().to_be_bytes(),
            &self.last_retarget.as_secs().to_be_bytes(),
            &self.diff.to_be_bytes(),
            &tx_ids,
            &self.tx_root,
            &self.wallet_root,
            &self.reward_addr.to_bytes(),
            &self.reward_pool.raw().to_be_bytes(),
            &self.weave_size.to_be_bytes(),
            &self.block_size.to_be_bytes(),
            &tag_bytes,
        ]))
    }

    /// Seal the header: set `indep_hash` from the current fields.
    pub fn seal(&mut self) {
        self.indep_hash = self.compute_indep_hash();
    }

    /// Whether the carried `indep_hash` matches the header fields.
    pub fn verify_indep_hash(&self) -> bool {
        self.indep_hash == self.compute_indep_hash()
    }

    /// Merkle root over a block's transactions: sized leaves of
    /// `(id, data_size)`.
    pub fn tx_root_for(txs: &[Transaction]) -> [u8; 32] {
        let leaves: Vec<[u8; 32]> = txs
            .iter()
            .map(|tx| sha256_multi(&[tx.id.as_bytes(), &tx.data_size.to_be_bytes()]))
            .collect();
        merkle_root(&leaves)
    }

    /// Total data bytes carried by a transaction set.
    pub fn data_size_of(txs: &[Transaction]) -> u64 {
        txs.iter().map(|tx| tx.data_size).sum()
    }

    /// Construct the genesis block over an initial wallet allocation.
    pub fn genesis(
        wallets: &WalletList,
        timestamp: Timestamp,
        diff: u32,
        reward_pool: Winston,
    ) -> Block {
        let mut block = Block {
            indep_hash: BlockHash::ZERO,
            previous: BlockHash::ZERO,
            height: 0,
            timestamp,
            last_retarget: timestamp,
            diff,
            nonce: 0,
            txs: Vec::new(),
            tx_root: merkle_root(&[]),
            wallet_root: wallets.root_hash(),
            reward_addr: RewardAddress::Unclaimed,
            reward_pool,
            weave_size: 0,
            block_size: 0,
            tags: Vec::new(),
        };
        block.seal();
        block
    }
}
