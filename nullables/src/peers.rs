//! Scripted peers — an in-memory peer network for testing.

use std::collections::HashMap;
use std::sync::Mutex;

use weave_gossip::{GossipError, PeerId, PeerSource};
use weave_ledger::{Block, BlockIndex, Transaction, WalletList};
use weave_types::{BlockHash, TxId};

#[derive(Default)]
struct PeerData {
    index: Option<BlockIndex>,
    blocks: HashMap<BlockHash, Block>,
    txs: HashMap<TxId, Transaction>,
    wallet_lists: HashMap<[u8; 32], WalletList>,
}

/// A programmable peer set.
///
/// Script each peer's chain with [`ScriptedPeers::serve_chain`] or the
/// granular setters; unknown peers report as unavailable.
#[derive(Default)]
pub struct ScriptedPeers {
    peers: Mutex<HashMap<PeerId, PeerData>>,
}

impl ScriptedPeers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a peer serving `blocks` (tip first) with the matching index,
    /// transactions and per-block wallet lists.
    pub fn serve_chain(
        &self,
        peer: PeerId,
        blocks: Vec<Block>,
        txs: Vec<Transaction>,
        wallet_lists: Vec<WalletList>,
    ) {
        let mut peers = self.peers.lock().unwrap();
        let data = peers.entry(peer).or_default();
        data.index = Some(BlockIndex::from_blocks(&blocks));
        for (block, wallets) in blocks.iter().zip(wallet_lists) {
            data.wallet_lists.insert(block.wallet_root, wallets);
        }
        for block in blocks {
            data.blocks.insert(block.indep_hash, block);
        }
        for tx in txs {
            data.txs.insert(tx.id, tx);
        }
    }

    /// Make a previously scripted peer vanish.
    pub fn disconnect(&self, peer: &PeerId) {
        self.peers.lock().unwrap().remove(peer);
    }
}

impl PeerSource for ScriptedPeers {
    fn block_index(&self, peer: &PeerId) -> Result<BlockIndex, GossipError> {
        let peers = self.peers.lock().unwrap();
        let data = peers
            .get(peer)
            .ok_or_else(|| GossipError::PeerUnavailable(peer.clone()))?;
        data.index
            .clone()
            .ok_or_else(|| GossipError::NotFound {
                peer: peer.clone(),
                what: "block index".into(),
            })
    }

    fn block(&self, peer: &PeerId, hash: &BlockHash) -> Result<Block, GossipError> {
        let peers = self.peers.lock().unwrap();
        let data = peers
            .get(peer)
            .ok_or_else(|| GossipError::PeerUnavailable(peer.clone()))?;
        data.blocks.get(hash).cloned().ok_or_else(|| GossipError::NotFound {
            peer: peer.clone(),
            what: format!("block {hash}"),
        })
    }

    fn tx(&self, peer: &PeerId, id: &TxId) -> Result<Transaction, GossipError> {
        let peers = self.peers.lock().unwrap();
        let data = peers
            .get(peer)
            .ok_or_else(|| GossipError::PeerUnavailable(peer.clone()))?;
        data.txs.get(id).cloned().ok_or_else(|| GossipError::NotFound {
            peer: peer.clone(),
            what: format!("tx {id}"),
        })
    }

    fn wallet_list(&self, peer: &PeerId, root: &[u8; 32]) -> Result<WalletList, GossipError> {
        let peers = self.peers.lock().unwrap();
        let data = peers
            .get(peer)
            .ok_or_else(|| GossipError::PeerUnavailable(peer.clone()))?;
        data.wallet_lists
            .get(root)
            .cloned()
            .ok_or_else(|| GossipError::NotFound {
                peer: peer.clone(),
                what: "wallet list".into(),
            })
    }
}
