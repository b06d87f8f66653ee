//! The block index: the chain's hash list, tip first.
//!
//! Each entry pairs a block's independent hash with the cumulative weave size
//! and transaction root at that height. The index is what fork recovery
//! exchanges with peers and what the recall-block selection runs over.

use serde::{Deserialize, Serialize};

use weave_types::BlockHash;

use crate::block::Block;

/// One entry of the block index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockIndexEntry {
    pub indep_hash: BlockHash,
    pub weave_size: u64,
    pub tx_root: [u8; 32],
}

impl BlockIndexEntry {
    pub fn from_block(block: &Block) -> Self {
        Self {
            indep_hash: block.indep_hash,
            weave_size: block.weave_size,
            tx_root: block.tx_root,
        }
    }
}

/// Ordered block index from tip to genesis.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockIndex(Vec<BlockIndexEntry>);

impl BlockIndex {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build from blocks ordered tip first.
    pub fn from_blocks(blocks: &[Block]) -> Self {
        Self(blocks.iter().map(BlockIndexEntry::from_block).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Chain height: entries minus one. Panics on an empty index.
    pub fn height(&self) -> u64 {
        debug_assert!(!self.0.is_empty());
        self.0.len() as u64 - 1
    }

    pub fn tip(&self) -> Option<&BlockIndexEntry> {
        self.0.first()
    }

    /// Entries from tip to genesis.
    pub fn iter(&self) -> impl Iterator<Item = &BlockIndexEntry> {
        self.0.iter()
    }

    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.0.iter().any(|e| e.indep_hash == *hash)
    }

    /// The entry at a given chain height (0 = genesis).
    pub fn entry_at_height(&self, height: u64) -> Option<&BlockIndexEntry> {
        let len = self.0.len() as u64;
        if height >= len {
            return None;
        }
        self.0.get((len - 1 - height) as usize)
    }

    /// Prepend a newly integrated block.
    pub fn push_tip(&mut self, entry: BlockIndexEntry) {
        self.0.insert(0, entry);
    }

    /// The recall entry selected by a block hash: the seed modulo the chain
    /// length picks a height counted from genesis.
    pub fn recall_entry(&self, from: &BlockHash) -> Option<&BlockIndexEntry> {
        self.recall_entry_bounded(from, self.0.len() as u64)
    }

    /// Recall selection over only the oldest `chain_len` entries, for
    /// validating historical blocks mid-chain.
    pub fn recall_entry_bounded(
        &self,
        from: &BlockHash,
        chain_len: u64,
    ) -> Option<&BlockIndexEntry> {
        if chain_len == 0 || chain_len > self.0.len() as u64 {
            return None;
        }
        let height = from.as_seed() % chain_len;
        self.entry_at_height(height)
    }

    /// The deepest entry shared with `other`, scanning from our tip.
    pub fn common_ancestor(&self, other: &BlockIndex) -> Option<BlockHash> {
        self.0
            .iter()
            .find(|e| other.contains(&e.indep_hash))
            .map(|e| e.indep_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(byte: u8, weave_size: u64) -> BlockIndexEntry {
        BlockIndexEntry {
            indep_hash: BlockHash::new([byte; 32]),
            weave_size,
            tx_root: [0u8; 32],
        }
    }

    fn index_of(bytes: &[u8]) -> BlockIndex {
        let mut idx = BlockIndex::new();
        for (i, b) in bytes.iter().rev().enumerate() {
            idx.push_tip(entry(*b, i as u64));
        }
        idx
    }

    #[test]
    fn height_tracks_length() {
        let idx = index_of(&[3, 2, 1]);
        assert_eq!(idx.len(), 3);
        assert_eq!(idx.height(), 2);
        assert_eq!(idx.tip().unwrap().indep_hash, BlockHash::new([3; 32]));
    }

    #[test]
    fn entry_at_height_counts_from_genesis() {
        let idx = index_of(&[3, 2, 1]);
        assert_eq!(
            idx.entry_at_height(0).unwrap().indep_hash,
            BlockHash::new([1; 32])
        );
        assert_eq!(
            idx.entry_at_height(2).unwrap().indep_hash,
            BlockHash::new([3; 32])
        );
        assert!(idx.entry_at_height(3).is_none());
    }

    #[test]
    fn recall_entry_is_deterministic() {
        let idx = index_of(&[3, 2, 1]);
        let from = BlockHash::new([7; 32]);
        let a = idx.recall_entry(&from).copied();
        let b = idx.recall_entry(&from).copied();
        assert_eq!(a, b);
        assert!(a.is_some());
    }

    #[test]
    fn recall_entry_none_for_empty_index() {
        let idx = BlockIndex::new();
        assert!(idx.recall_entry(&BlockHash::new([1; 32])).is_none());
    }

    #[test]
    fn common_ancestor_finds_shared_suffix() {
        let ours = index_of(&[3, 2, 1]);
        let theirs = index_of(&[5, 4, 2, 1]);
        assert_eq!(ours.common_ancestor(&theirs), Some(BlockHash::new([2; 32])));
    }

    #[test]
    fn common_ancestor_none_for_disjoint_chains() {
        let ours = index_of(&[3, 2]);
        let theirs = index_of(&[9, 8]);
        assert_eq!(ours.common_ancestor(&theirs), None);
    }
}
