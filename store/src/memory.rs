//! In-memory storage backend.
//!
//! Thread-safe maps behind mutexes. Tests can inject the storage refusals
//! the node must survive: `NotEnoughSpace` on block writes and
//! `FirewallRejected` on transaction writes.

use std::collections::HashMap;
use std::sync::Mutex;

use weave_ledger::{Block, BlockIndex, Transaction, WalletList};
use weave_types::{BlockHash, TxId};

use crate::traits::{BlockIndexStore, BlockStore, TxStore, WalletStore};
use crate::StoreError;

/// An in-memory store for development and testing.
#[derive(Default)]
pub struct MemStore {
    blocks: Mutex<HashMap<BlockHash, Block>>,
    txs: Mutex<HashMap<TxId, Transaction>>,
    index: Mutex<Option<BlockIndex>>,
    wallet_lists: Mutex<HashMap<[u8; 32], WalletList>>,
    reject_block_writes: Mutex<bool>,
    reject_tx_writes: Mutex<bool>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent block writes fail with `NotEnoughSpace`.
    pub fn set_reject_block_writes(&self, reject: bool) {
        *self.reject_block_writes.lock().unwrap() = reject;
    }

    /// Make subsequent tx writes fail with `FirewallRejected`.
    pub fn set_reject_tx_writes(&self, reject: bool) {
        *self.reject_tx_writes.lock().unwrap() = reject;
    }

    pub fn tx_count(&self) -> usize {
        self.txs.lock().unwrap().len()
    }
}

impl BlockStore for MemStore {
    fn write_block(&self, block: &Block) -> Result<(), StoreError> {
        if *self.reject_block_writes.lock().unwrap() {
            return Err(StoreError::NotEnoughSpace);
        }
        self.blocks
            .lock()
            .unwrap()
            .insert(block.indep_hash, block.clone());
        Ok(())
    }

    fn read_block(&self, hash: &BlockHash) -> Result<Block, StoreError> {
        self.blocks
            .lock()
            .unwrap()
            .get(hash)
            .cloned()
            .ok_or_else(|| StoreError::Unavailable(format!("block {hash}")))
    }

    fn has_block(&self, hash: &BlockHash) -> Result<bool, StoreError> {
        Ok(self.blocks.lock().unwrap().contains_key(hash))
    }

    fn block_count(&self) -> Result<u64, StoreError> {
        Ok(self.blocks.lock().unwrap().len() as u64)
    }
}

impl TxStore for MemStore {
    fn write_tx(&self, tx: &Transaction) -> Result<(), StoreError> {
        if *self.reject_tx_writes.lock().unwrap() {
            return Err(StoreError::FirewallRejected);
        }
        self.txs.lock().unwrap().insert(tx.id, tx.clone());
        Ok(())
    }

    fn read_tx(&self, id: &TxId) -> Result<Transaction, StoreError> {
        self.txs
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::Unavailable(format!("tx {id}")))
    }

    fn has_tx(&self, id: &TxId) -> Result<bool, StoreError> {
        Ok(self.txs.lock().unwrap().contains_key(id))
    }
}

impl BlockIndexStore for MemStore {
    fn write_block_index(&self, index: &BlockIndex) -> Result<(), StoreError> {
        *self.index.lock().unwrap() = Some(index.clone());
        Ok(())
    }

    fn read_block_index(&self) -> Result<BlockIndex, StoreError> {
        self.index
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| StoreError::Unavailable("block index".into()))
    }
}

impl WalletStore for MemStore {
    fn write_wallet_list(&self, root: &[u8; 32], list: &WalletList) -> Result<(), StoreError> {
        self.wallet_lists
            .lock()
            .unwrap()
            .insert(*root, list.clone());
        Ok(())
    }

    fn read_wallet_list(&self, root: &[u8; 32]) -> Result<WalletList, StoreError> {
        self.wallet_lists
            .lock()
            .unwrap()
            .get(root)
            .cloned()
            .ok_or_else(|| StoreError::Unavailable("wallet list".into()))
    }
}
