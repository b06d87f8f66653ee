//! Fork recovery.
//!
//! When a longer chain is observed, a recovery task fetches the peer's block
//! index, finds the common ancestor, and re-validates the divergent suffix
//! block by block — rebuilding the wallet list as it goes and persisting
//! everything it accepts. The validated index comes back to the worker as a
//! `ForkRecovered` event. At most one recovery runs at a time; registration
//! is an explicit atomic flag, and deregistration cancels the walk at its
//! next block boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use weave_gossip::{PeerId, PeerSource};
use weave_ledger::{split_reward, Block, BlockIndex, Transaction};
use weave_store::Store;
use weave_types::{BlockHash, Clock, ProtocolParams};

use crate::error::NodeError;
use crate::events::{Event, Request};
use crate::validator::validate_block;

/// Exclusive registration for the single recovery slot.
#[derive(Default)]
pub struct ForkRegistry {
    active: AtomicBool,
}

impl ForkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot; `false` when a recovery is already running.
    pub fn try_begin(&self) -> bool {
        self.active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn end(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Deregister the running recovery; it stops at its next check.
    pub fn cancel(&self) {
        self.end();
    }
}

/// Everything a recovery task needs, captured at spawn time.
pub(crate) struct RecoveryContext {
    pub registry: Arc<ForkRegistry>,
    pub peers: Arc<dyn PeerSource>,
    pub store: Arc<dyn Store>,
    pub events: mpsc::Sender<Request>,
    pub clock: Arc<dyn Clock>,
    pub params: ProtocolParams,
}

/// Try to start a recovery toward `peer`. Returns `false` when one is
/// already in flight.
pub(crate) fn maybe_spawn_recovery(
    ctx: RecoveryContext,
    peer: PeerId,
    target: BlockHash,
    our_index: Option<BlockIndex>,
) -> bool {
    if !ctx.registry.try_begin() {
        debug!(%peer, "fork recovery already in progress");
        return false;
    }
    info!(%peer, %target, "fork recovery started");

    tokio::task::spawn_blocking(move || {
        let result = recover(&ctx, &peer, our_index);
        ctx.registry.end();
        match result {
            Ok(index) => {
                info!(%peer, height = index.height(), "fork recovery completed");
                let request = Request::cast(Event::ForkRecovered(index));
                if ctx.events.blocking_send(request).is_err() {
                    debug!("worker gone; recovered chain dropped");
                }
            }
            Err(err) => {
                warn!(%peer, error = %err, "fork recovery failed");
            }
        }
    });
    true
}

/// Fetch, validate and persist the peer's chain from the common ancestor.
fn recover(
    ctx: &RecoveryContext,
    peer: &PeerId,
    our_index: Option<BlockIndex>,
) -> Result<BlockIndex, NodeError> {
    let peer_index = ctx.peers.block_index(peer)?;
    if peer_index.is_empty() {
        return Err(NodeError::Other("peer offered an empty chain".into()));
    }
    if let Some(ours) = &our_index {
        if peer_index.len() <= ours.len() {
            return Err(NodeError::Other(
                "peer chain is not longer than ours".into(),
            ));
        }
    }

    let ancestor = our_index
        .as_ref()
        .and_then(|ours| ours.common_ancestor(&peer_index));

    let (mut prev, mut wallets) = match ancestor {
        Some(hash) => {
            let block = ctx.store.read_block(&hash)?;
            let wallets = ctx.store.read_wallet_list(&block.wallet_root)?;
            debug!(ancestor = %hash, height = block.height, "recovering from common ancestor");
            (block, wallets)
        }
        None => {
            let genesis = fetch_block(ctx, peer, &peer_index, 0)?;
            if genesis.height != 0 || !genesis.previous.is_zero() || !genesis.verify_indep_hash() {
                return Err(NodeError::Other("peer genesis is malformed".into()));
            }
            let wallets = ctx.peers.wallet_list(peer, &genesis.wallet_root)?;
            if wallets.root_hash() != genesis.wallet_root {
                return Err(NodeError::Other(
                    "peer genesis wallet list does not match its root".into(),
                ));
            }
            persist(ctx, &genesis, &[], &wallets);
            debug!("recovering from the peer's genesis");
            (genesis, wallets)
        }
    };

    for height in (prev.height + 1)..peer_index.len() as u64 {
        if !ctx.registry.is_active() {
            return Err(NodeError::RecoveryCancelled);
        }

        let block = fetch_block(ctx, peer, &peer_index, height)?;
        let txs = fetch_txs(ctx, peer, &block)?;
        let recall_entry = peer_index
            .recall_entry_bounded(&block.previous, height)
            .ok_or(NodeError::RecallUnavailable)?;
        let recall = match ctx.store.read_block(&recall_entry.indep_hash) {
            Ok(found) => found,
            Err(_) => ctx.peers.block(peer, &recall_entry.indep_hash)?,
        };

        validate_block(
            &ctx.params,
            ctx.clock.now(),
            &block,
            &txs,
            &prev,
            &recall,
            &wallets,
        )?;

        let split = split_reward(
            prev.reward_pool,
            &txs,
            &block.reward_addr,
            recall.block_size,
            block.weave_size,
            block.height,
            &ctx.params,
        );
        wallets = wallets.apply_txs(&txs)?;
        wallets.apply_mining_reward(&block.reward_addr, split.finder);

        persist(ctx, &block, &txs, &wallets);
        prev = block;
    }

    ctx.store.write_block_index(&peer_index)?;
    Ok(peer_index)
}

/// Fetch the block at `height` of the peer's chain, preferring our store,
/// and insist it matches the index entry.
fn fetch_block(
    ctx: &RecoveryContext,
    peer: &PeerId,
    index: &BlockIndex,
    height: u64,
) -> Result<Block, NodeError> {
    let entry = index
        .entry_at_height(height)
        .ok_or_else(|| NodeError::Other(format!("peer index has no entry at {height}")))?;
    let block = match ctx.store.read_block(&entry.indep_hash) {
        Ok(found) => found,
        Err(_) => ctx.peers.block(peer, &entry.indep_hash)?,
    };
    if block.indep_hash != entry.indep_hash {
        return Err(NodeError::Other(format!(
            "peer served a block that does not match its index at {height}"
        )));
    }
    Ok(block)
}

fn fetch_txs(
    ctx: &RecoveryContext,
    peer: &PeerId,
    block: &Block,
) -> Result<Vec<Transaction>, NodeError> {
    let mut txs = Vec::with_capacity(block.txs.len());
    for id in &block.txs {
        let tx = match ctx.store.read_tx(id) {
            Ok(found) => found,
            Err(_) => ctx.peers.tx(peer, id)?,
        };
        txs.push(tx);
    }
    Ok(txs)
}

fn persist(ctx: &RecoveryContext, block: &Block, txs: &[Transaction], wallets: &weave_ledger::WalletList) {
    if let Err(err) = ctx.store.write_block(block) {
        warn!(hash = %block.indep_hash, error = %err, "failed to persist recovered block");
    }
    for tx in txs {
        if let Err(err) = ctx.store.write_tx(tx) {
            debug!(tx_id = %tx.id, error = %err, "failed to persist recovered tx");
        }
    }
    if let Err(err) = ctx.store.write_wallet_list(&block.wallet_root, wallets) {
        warn!(error = %err, "failed to persist recovered wallet list");
    }
}
