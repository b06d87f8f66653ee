//! Filesystem storage backend.
//!
//! Entities are bincode files under the data directory:
//! `blocks/<indep_hash>.bin`, `txs/<id>.bin`, `wallets/<root>.bin` and
//! `block_index.bin`. A full disk (ENOSPC) surfaces as `NotEnoughSpace` on
//! block writes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use weave_ledger::{Block, BlockIndex, Transaction, WalletList};
use weave_types::{BlockHash, TxId};

use crate::traits::{BlockIndexStore, BlockStore, TxStore, WalletStore};
use crate::StoreError;

const ENOSPC: i32 = 28;

/// A bincode-file store rooted at a data directory.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open (creating directories as needed) a store under `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        for dir in ["blocks", "txs", "wallets"] {
            fs::create_dir_all(root.join(dir)).map_err(io_err)?;
        }
        Ok(Self { root })
    }

    fn block_path(&self, hash: &BlockHash) -> PathBuf {
        self.root.join("blocks").join(format!("{hash}.bin"))
    }

    fn tx_path(&self, id: &TxId) -> PathBuf {
        self.root.join("txs").join(format!("{id}.bin"))
    }

    fn wallet_path(&self, root_hash: &[u8; 32]) -> PathBuf {
        let mut name = String::with_capacity(68);
        for b in root_hash {
            name.push_str(&format!("{b:02x}"));
        }
        name.push_str(".bin");
        self.root.join("wallets").join(name)
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("block_index.bin")
    }
}

fn io_err(e: io::Error) -> StoreError {
    StoreError::Io(e.to_string())
}

fn write_entity<T: Serialize>(path: &Path, entity: &T) -> Result<(), io::Error> {
    let bytes = bincode::serialize(entity)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    fs::write(path, bytes)
}

fn read_entity<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(StoreError::Unavailable(what.to_string()))
        }
        Err(e) => return Err(io_err(e)),
    };
    bincode::deserialize(&bytes).map_err(|e| StoreError::Corrupt(format!("{what}: {e}")))
}

impl BlockStore for FsStore {
    fn write_block(&self, block: &Block) -> Result<(), StoreError> {
        write_entity(&self.block_path(&block.indep_hash), block).map_err(|e| {
            if e.raw_os_error() == Some(ENOSPC) {
                StoreError::NotEnoughSpace
            } else {
                io_err(e)
            }
        })
    }

    fn read_block(&self, hash: &BlockHash) -> Result<Block, StoreError> {
        let block: Block = read_entity(&self.block_path(hash), &format!("block {hash}"))?;
        if !block.verify_indep_hash() {
            return Err(StoreError::Corrupt(format!(
                "block {hash} fails hash verification"
            )));
        }
        Ok(block)
    }

    fn has_block(&self, hash: &BlockHash) -> Result<bool, StoreError> {
        Ok(self.block_path(hash).exists())
    }

    fn block_count(&self) -> Result<u64, StoreError> {
        let entries = fs::read_dir(self.root.join("blocks")).map_err(io_err)?;
        Ok(entries.count() as u64)
    }
}

impl TxStore for FsStore {
    fn write_tx(&self, tx: &Transaction) -> Result<(), StoreError> {
        write_entity(&self.tx_path(&tx.id), tx).map_err(io_err)
    }

    fn read_tx(&self, id: &TxId) -> Result<Transaction, StoreError> {
        read_entity(&self.tx_path(id), &format!("tx {id}"))
    }

    fn has_tx(&self, id: &TxId) -> Result<bool, StoreError> {
        Ok(self.tx_path(id).exists())
    }
}

impl BlockIndexStore for FsStore {
    fn write_block_index(&self, index: &BlockIndex) -> Result<(), StoreError> {
        write_entity(&self.index_path(), index).map_err(io_err)
    }

    fn read_block_index(&self) -> Result<BlockIndex, StoreError> {
        read_entity(&self.index_path(), "block index")
    }
}

impl WalletStore for FsStore {
    fn write_wallet_list(&self, root: &[u8; 32], list: &WalletList) -> Result<(), StoreError> {
        write_entity(&self.wallet_path(root), list).map_err(io_err)
    }

    fn read_wallet_list(&self, root: &[u8; 32]) -> Result<WalletList, StoreError> {
        read_entity(&self.wallet_path(root), "wallet list")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_ledger::WalletEntry;
    use weave_types::{Address, Timestamp, Winston};

    fn test_block() -> Block {
        let mut wallets = WalletList::new();
        wallets.insert(
            Address::new([3; 32]),
            WalletEntry {
                balance: Winston::new(42),
                last_tx: TxId::ZERO,
            },
        );
        Block::genesis(&wallets, Timestamp::new(5000), 3, Winston::ZERO)
    }

    #[test]
    fn block_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();

        let block = test_block();
        store.write_block(&block).unwrap();
        assert_eq!(store.read_block(&block.indep_hash).unwrap(), block);
        assert!(store.has_block(&block.indep_hash).unwrap());
    }

    #[test]
    fn corrupt_block_detected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();

        let mut block = test_block();
        store.write_block(&block).unwrap();

        // Overwrite with a header that no longer matches its hash.
        block.weave_size += 1;
        write_entity(&store.block_path(&block.indep_hash), &block).unwrap();
        assert!(matches!(
            store.read_block(&block.indep_hash),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn missing_entities_are_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.read_block(&BlockHash::new([7; 32])),
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            store.read_block_index(),
            Err(StoreError::Unavailable(_))
        ));
    }

    #[test]
    fn index_and_wallets_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();

        let block = test_block();
        let index = BlockIndex::from_blocks(&[block]);
        store.write_block_index(&index).unwrap();
        assert_eq!(store.read_block_index().unwrap(), index);

        let mut wallets = WalletList::new();
        wallets.insert(
            Address::new([4; 32]),
            WalletEntry {
                balance: Winston::new(9),
                last_tx: TxId::ZERO,
            },
        );
        let root = wallets.root_hash();
        store.write_wallet_list(&root, &wallets).unwrap();
        assert_eq!(store.read_wallet_list(&root).unwrap(), wallets);
    }
}
