//! Abstract storage traits for the Weave node.
//!
//! The node depends only on these traits; the bundled backends are
//! [`MemStore`] (development and tests, with failure injection) and
//! [`FsStore`] (bincode files under a data directory). Writes are serialized
//! by the node worker; reads may happen concurrently.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use error::StoreError;
pub use fs::FsStore;
pub use memory::MemStore;
pub use traits::{BlockIndexStore, BlockStore, Store, TxStore, WalletStore};
