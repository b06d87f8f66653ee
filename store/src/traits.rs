//! Storage traits.

use weave_ledger::{Block, BlockIndex, Transaction, WalletList};
use weave_types::{BlockHash, TxId};

use crate::StoreError;

/// Block storage.
pub trait BlockStore: Send + Sync {
    /// Store a block. May refuse with [`StoreError::NotEnoughSpace`].
    fn write_block(&self, block: &Block) -> Result<(), StoreError>;

    /// Retrieve a block by independent hash.
    fn read_block(&self, hash: &BlockHash) -> Result<Block, StoreError>;

    /// Retrieve the block at a chain height, resolving through the index.
    fn read_block_at(&self, height: u64, index: &BlockIndex) -> Result<Block, StoreError> {
        let entry = index
            .entry_at_height(height)
            .ok_or_else(|| StoreError::Unavailable(format!("no index entry at height {height}")))?;
        self.read_block(&entry.indep_hash)
    }

    fn has_block(&self, hash: &BlockHash) -> Result<bool, StoreError>;

    fn block_count(&self) -> Result<u64, StoreError>;
}

/// Transaction storage.
pub trait TxStore: Send + Sync {
    /// Store a transaction. May refuse with [`StoreError::FirewallRejected`].
    fn write_tx(&self, tx: &Transaction) -> Result<(), StoreError>;

    fn read_tx(&self, id: &TxId) -> Result<Transaction, StoreError>;

    fn has_tx(&self, id: &TxId) -> Result<bool, StoreError>;
}

/// Block index storage.
pub trait BlockIndexStore: Send + Sync {
    fn write_block_index(&self, index: &BlockIndex) -> Result<(), StoreError>;

    fn read_block_index(&self) -> Result<BlockIndex, StoreError>;
}

/// Wallet tree storage, keyed by root hash.
///
/// Backends may store the tree in chunks; the root-keyed interface is the
/// only contract.
pub trait WalletStore: Send + Sync {
    fn write_wallet_list(&self, root: &[u8; 32], list: &WalletList) -> Result<(), StoreError>;

    fn read_wallet_list(&self, root: &[u8; 32]) -> Result<WalletList, StoreError>;
}

/// The full storage surface the node worker requires.
pub trait Store: BlockStore + TxStore + BlockIndexStore + WalletStore {}

impl<T: BlockStore + TxStore + BlockIndexStore + WalletStore> Store for T {}
