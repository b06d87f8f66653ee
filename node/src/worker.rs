//! The node worker: the single writer over node state.
//!
//! One inbound queue serializes every event. Each event is dispatched
//! against a clone of the state that is committed only when the handler
//! succeeds, then published as a snapshot; a failing or panicking handler
//! leaves the committed state untouched and the loop running. Only `Stop`
//! ends the worker.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use weave_gossip::{GossipMessage, PeerId, PeerSource};
use weave_ledger::{Block, BlockIndex, BlockIndexEntry, Transaction};
use weave_store::{Store, StoreError};
use weave_types::{Clock, ProtocolParams, Timestamp, TxId};

use crate::diagnostics::TxDiagnostics;
use crate::error::NodeError;
use crate::events::{Ack, Event, Request};
use crate::fork::{maybe_spawn_recovery, ForkRegistry, RecoveryContext};
use crate::memory::MemoryMonitor;
use crate::miner::{build_candidate, MinerSupervisor};
use crate::state::{ChainIndex, NodeState};
use crate::timer;
use crate::tx_pool::{self, AddTxOutcome, PromoteOutcome};
use crate::validator::validate_block;

/// Probability of wiping the tx pools after the miner produced an invalid
/// block.
const POOL_WIPE_PROBABILITY: f64 = 0.2;

/// The single-writer event worker.
pub struct NodeWorker {
    state: NodeState,
    rx: mpsc::Receiver<Request>,
    events: mpsc::Sender<Request>,
    store: Arc<dyn Store>,
    peers: Arc<dyn PeerSource>,
    clock: Arc<dyn Clock>,
    memory: Arc<dyn MemoryMonitor>,
    diagnostics: TxDiagnostics,
    miner: MinerSupervisor,
    fork: Arc<ForkRegistry>,
    params: ProtocolParams,
    rng: StdRng,
    fixed_delay_ms: Option<u64>,
    snapshot: watch::Sender<Arc<NodeState>>,
}

#[allow(clippy::too_many_arguments)]
impl NodeWorker {
    pub(crate) fn new(
        state: NodeState,
        rx: mpsc::Receiver<Request>,
        events: mpsc::Sender<Request>,
        store: Arc<dyn Store>,
        peers: Arc<dyn PeerSource>,
        clock: Arc<dyn Clock>,
        memory: Arc<dyn MemoryMonitor>,
        diagnostics: TxDiagnostics,
        fork: Arc<ForkRegistry>,
        params: ProtocolParams,
        rng: StdRng,
        fixed_delay_ms: Option<u64>,
        snapshot: watch::Sender<Arc<NodeState>>,
    ) -> Self {
        let miner = MinerSupervisor::new(events.clone(), Arc::clone(&clock), params.clone());
        Self {
            state,
            rx,
            events,
            store,
            peers,
            clock,
            memory,
            diagnostics,
            miner,
            fork,
            params,
            rng,
            fixed_delay_ms,
            snapshot,
        }
    }

    /// Run until `Stop` or all senders are gone.
    pub async fn run(mut self) {
        info!("node worker started");
        while let Some(request) = self.rx.recv().await {
            if self.process(request) {
                break;
            }
        }
        self.miner.reset();
        self.fork.cancel();
        info!("node worker stopped");
    }

    /// Handle one request. Returns `true` on `Stop`.
    fn process(&mut self, request: Request) -> bool {
        let Request { event, reply } = request;

        if matches!(event, Event::Stop) {
            if let Some(tx) = reply {
                let _ = tx.send(Ack::Ok("stopping"));
            }
            return true;
        }

        let mut scratch = self.state.clone();
        let outcome = catch_unwind(AssertUnwindSafe(|| self.dispatch(&mut scratch, event)));

        let ack = match outcome {
            Ok(Ok(tag)) => {
                self.state = scratch;
                self.snapshot.send_replace(Arc::new(self.state.clone()));
                Ack::Ok(tag)
            }
            Ok(Err(err)) => {
                warn!(error = %err, "event rejected; state unchanged");
                Ack::Rejected(err.to_string())
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".into());
                error!(%reason, "node worker exception; state unchanged");
                Ack::Rejected(format!("internal exception: {reason}"))
            }
        };

        if let Some(tx) = reply {
            let _ = tx.send(ack);
        }
        false
    }

    fn dispatch(&mut self, state: &mut NodeState, event: Event) -> Result<&'static str, NodeError> {
        match event {
            Event::AddTx(tx) => self.handle_add_tx(state, tx),
            Event::PromoteTx(id) => self.handle_promote_tx(state, id),
            Event::ProcessNewBlock {
                peer,
                block,
                recall,
                hash_list,
            } => self.handle_process_new_block(state, peer, block, recall, hash_list),
            Event::WorkComplete {
                txs,
                diff,
                nonce,
                timestamp,
            } => self.handle_work_complete(state, txs, diff, nonce, timestamp),
            Event::ForkRecovered(index) => self.handle_fork_recovered(state, index),
            Event::Mine => self.handle_mine(state, None),
            Event::MineAtDiff(diff) => self.handle_mine(state, Some(diff)),
            Event::AutoMine => {
                state.automine = true;
                if state.chain.is_joined() {
                    self.miner.start_mining(state, &self.store, None);
                }
                Ok("automine")
            }
            Event::ReplaceBlockIndex(blocks) => self.handle_replace_block_index(state, blocks),
            Event::Ignore(id) => {
                state.gossip.mark_seen(id);
                Ok("ignored")
            }
            Event::SetRewardAddr(addr) => {
                state.reward_addr = addr;
                Ok("set_reward_addr")
            }
            Event::SetLossProbability(p) => {
                state.gossip.set_loss_probability(p)?;
                Ok("set_loss_probability")
            }
            Event::SetDelay(ms) => {
                state.gossip.set_delay(ms);
                Ok("set_delay")
            }
            Event::SetXferSpeed(bps) => {
                state.gossip.set_xfer_speed(bps);
                Ok("set_xfer_speed")
            }
            Event::SetMiningDelay(ms) => {
                state.mining_delay_ms = ms;
                Ok("set_mining_delay")
            }
            Event::AddPeers(peers) => {
                state.gossip.add_peers(peers);
                Ok("add_peers")
            }
            Event::Stop => unreachable!("Stop is intercepted before dispatch"),
        }
    }

    // ── Transactions ────────────────────────────────────────────────────

    fn handle_add_tx(
        &mut self,
        state: &mut NodeState,
        tx: Transaction,
    ) -> Result<&'static str, NodeError> {
        let id = tx.id;
        let message = GossipMessage::NewTx(tx.clone());
        match tx_pool::add_tx(
            state,
            tx,
            &self.diagnostics,
            &self.params,
            self.fixed_delay_ms,
        ) {
            AddTxOutcome::Queued { delay_ms } => {
                state.gossip.send(&message, &mut self.rng);
                timer::schedule(
                    self.events.clone(),
                    Event::PromoteTx(id),
                    Duration::from_millis(delay_ms),
                );
                debug!(tx_id = %id, delay_ms, "tx queued for propagation");
                Ok("add_waiting_tx")
            }
            AddTxOutcome::Conflict => Ok("add_potential_tx"),
            AddTxOutcome::Duplicate => Ok("ignore_duplicate_tx"),
        }
    }

    fn handle_promote_tx(
        &mut self,
        state: &mut NodeState,
        id: TxId,
    ) -> Result<&'static str, NodeError> {
        let free = self.memory.free_bytes();
        match tx_pool::promote(state, &id, free, &self.params) {
            PromoteOutcome::Promoted => {
                debug!(tx_id = %id, "tx active");
                Ok("encounter_new_tx")
            }
            PromoteOutcome::Evicted => Ok("move_tx_to_potential"),
            PromoteOutcome::DroppedLowMemory => Ok("drop_waiting_tx"),
            PromoteOutcome::NotWaiting => Ok("not_waiting"),
        }
    }

    // ── Blocks from peers ───────────────────────────────────────────────

    fn handle_process_new_block(
        &mut self,
        state: &mut NodeState,
        peer: Option<PeerId>,
        block: Block,
        recall: Option<Block>,
        hash_list: Option<BlockIndex>,
    ) -> Result<&'static str, NodeError> {
        let Some(index) = state.chain.as_index().cloned() else {
            // Not joined yet: the first observed block starts a join.
            let target = block.indep_hash;
            let toward = peer
                .or_else(|| state.gossip.peers().next().cloned())
                .ok_or(NodeError::NoPeers)?;
            maybe_spawn_recovery(self.recovery_context(), toward, target, None);
            return Ok("joining");
        };

        if block.height <= state.height {
            info!(
                height = block.height,
                ours = state.height,
                hash = %block.indep_hash,
                "ignoring block at or below our height"
            );
            state.gossip.mark_seen(*block.indep_hash.as_bytes());
            return Ok("ignore_old_block");
        }

        if block.height > state.height + 1 {
            let toward = peer
                .or_else(|| state.gossip.peers().next().cloned())
                .ok_or(NodeError::NoPeers)?;
            info!(
                height = block.height,
                ours = state.height,
                "chain gap observed; recovering"
            );
            maybe_spawn_recovery(
                self.recovery_context(),
                toward,
                block.indep_hash,
                Some(index),
            );
            return Ok("fork_recovery");
        }

        // Exactly the next height.
        let lookup = hash_list.as_ref().unwrap_or(&index);
        let recall_block = match recall {
            Some(found) => found,
            None => self.fetch_recall(lookup, &block, peer.as_ref())?,
        };

        let txs = self.reconstruct_txs(state, &block)?;

        let tip_hash = state.tip_hash().ok_or(NodeError::NotJoined)?;
        let prev = self.store.read_block(&tip_hash)?;

        match validate_block(
            &self.params,
            self.clock.now(),
            &block,
            &txs,
            &prev,
            &recall_block,
            &state.wallet_list,
        ) {
            Ok(()) if !self.fork.is_active() => {
                let new_wallets = apply_block(&self.params, state, &block, &txs, &recall_block)?;
                self.integrate(state, block, txs, new_wallets, Some(recall_block));
                Ok("process_new_block")
            }
            Ok(()) => {
                debug!("valid block during recovery; deferring to recovery");
                Ok("fork_recovery")
            }
            Err(reason) => {
                warn!(hash = %block.indep_hash, %reason, "invalid block from peer");
                if let Some(toward) = peer.or_else(|| state.gossip.peers().next().cloned()) {
                    maybe_spawn_recovery(
                        self.recovery_context(),
                        toward,
                        block.indep_hash,
                        Some(index),
                    );
                }
                Ok("fork_recovery")
            }
        }
    }

    fn fetch_recall(
        &self,
        lookup: &BlockIndex,
        block: &Block,
        peer: Option<&PeerId>,
    ) -> Result<Block, NodeError> {
        let entry = lookup
            .recall_entry(&block.previous)
            .ok_or(NodeError::RecallUnavailable)?;
        match self.store.read_block(&entry.indep_hash) {
            Ok(found) => Ok(found),
            Err(_) => {
                let peer = peer.ok_or(NodeError::RecallUnavailable)?;
                self.peers
                    .block(peer, &entry.indep_hash)
                    .map_err(|_| NodeError::RecallUnavailable)
            }
        }
    }

    /// Resolve a block's tx ids against the pools, then the store.
    fn reconstruct_txs(
        &self,
        state: &NodeState,
        block: &Block,
    ) -> Result<Vec<Transaction>, NodeError> {
        let mut txs = Vec::with_capacity(block.txs.len());
        for id in &block.txs {
            let tx = match state.find_pooled_tx(id) {
                Some(found) => found.clone(),
                None => self
                    .store
                    .read_tx(id)
                    .map_err(|_| NodeError::MissingTx(*id))?,
            };
            txs.push(tx);
        }
        Ok(txs)
    }

    // ── Mined blocks ────────────────────────────────────────────────────

    fn handle_work_complete(
        &mut self,
        state: &mut NodeState,
        txs: Vec<Transaction>,
        diff: u32,
        nonce: u64,
        timestamp: Timestamp,
    ) -> Result<&'static str, NodeError> {
        let tip_hash = state.tip_hash().ok_or(NodeError::NotJoined)?;
        let prev = self.store.read_block(&tip_hash)?;

        let recall_hash = state
            .chain
            .as_index()
            .and_then(|index| index.recall_entry(&prev.indep_hash))
            .map(|entry| entry.indep_hash)
            .ok_or(NodeError::RecallUnavailable)?;
        let recall = self.store.read_block(&recall_hash)?;

        let built = build_candidate(
            &self.params,
            &prev,
            &txs,
            &state.wallet_list,
            &state.reward_addr,
            state.tags.clone(),
            &recall,
            timestamp,
            Some(diff),
        );

        let validated: Result<_, NodeError> = match built {
            Ok((mut candidate, wallets)) => {
                candidate.nonce = nonce;
                match validate_block(
                    &self.params,
                    self.clock.now(),
                    &candidate,
                    &txs,
                    &prev,
                    &recall,
                    &state.wallet_list,
                ) {
                    Ok(()) => Ok((candidate, wallets)),
                    Err(err) => Err(err.into()),
                }
            }
            Err(err) => Err(err.into()),
        };

        match validated {
            Ok((candidate, wallets)) => {
                let height = candidate.height;
                self.integrate(state, candidate, txs, wallets, Some(recall));
                info!(height, "mined block integrated");
                Ok("work_complete")
            }
            Err(err) => {
                warn!(error = %err, "discarding mined block");
                if self.rng.gen::<f64>() < POOL_WIPE_PROBABILITY {
                    info!("clearing tx pools after invalid mined block");
                    state.txs.clear();
                    state.potential_txs.clear();
                    state.floating_wallet_list = state.wallet_list.clone();
                }
                self.miner.reset();
                if state.automine {
                    self.miner.start_mining(state, &self.store, None);
                }
                Ok("work_rejected")
            }
        }
    }

    // ── Fork recovery results ───────────────────────────────────────────

    fn handle_fork_recovered(
        &mut self,
        state: &mut NodeState,
        index: BlockIndex,
    ) -> Result<&'static str, NodeError> {
        let adopt = match state.chain.as_index() {
            None => true,
            Some(ours) => index.len() > ours.len(),
        };
        if !adopt {
            debug!(
                theirs = index.len(),
                ours = state.height + 1,
                "recovered chain is not longer; ignoring"
            );
            return Ok("fork_ignored");
        }

        let tip_entry = index
            .tip()
            .ok_or_else(|| NodeError::Other("recovered chain is empty".into()))?;
        let tip = self.store.read_block(&tip_entry.indep_hash)?;
        let wallets = self.store.read_wallet_list(&tip.wallet_root)?;

        state.chain = ChainIndex::Joined(index.clone());
        state.height = tip.height;
        state.wallet_list = wallets;
        state.reward_pool = tip.reward_pool;
        state.diff = tip.diff;
        state.last_retarget = tip.last_retarget;
        state.weave_size = tip.weave_size;

        // Reconsider every deferred tx against the new wallet list.
        let mut pool: Vec<Transaction> = Vec::with_capacity(state.txs.len() + state.potential_txs.len());
        pool.append(&mut state.txs);
        pool.append(&mut state.potential_txs);
        let kept = state.wallet_list.filter_out_of_order(&pool);
        let kept_ids: HashSet<TxId> = kept.iter().map(|tx| tx.id).collect();
        state.potential_txs = pool
            .into_iter()
            .filter(|tx| !kept_ids.contains(&tx.id))
            .collect();
        state.txs = kept;
        state.floating_wallet_list = state
            .wallet_list
            .apply_txs(&state.txs)
            .unwrap_or_else(|_| state.wallet_list.clone());

        if let Err(err) = self.store.write_block_index(&index) {
            warn!(error = %err, "failed to persist adopted block index");
        }

        self.miner.reset();
        if state.automine {
            self.miner.start_mining(state, &self.store, None);
        }

        info!(height = state.height, tip = %tip.indep_hash, "adopted recovered chain");
        Ok("fork_recovered")
    }

    // ── Mining control ──────────────────────────────────────────────────

    fn handle_mine(
        &mut self,
        state: &mut NodeState,
        diff_override: Option<u32>,
    ) -> Result<&'static str, NodeError> {
        if !state.chain.is_joined() {
            return Err(NodeError::NotJoined);
        }
        self.miner.start_mining(state, &self.store, diff_override);
        Ok("mining")
    }

    // ── Forced chain replacement ────────────────────────────────────────

    fn handle_replace_block_index(
        &mut self,
        state: &mut NodeState,
        blocks: Vec<Block>,
    ) -> Result<&'static str, NodeError> {
        let Some(tip) = blocks.first().cloned() else {
            state.chain = ChainIndex::NotJoined;
            state.height = 0;
            self.miner.reset();
            return Ok("replace_block_index");
        };

        for block in &blocks {
            if let Err(err) = self.store.write_block(block) {
                warn!(hash = %block.indep_hash, error = %err, "failed to persist replacement block");
            }
        }

        let index = BlockIndex::from_blocks(&blocks);
        state.chain = ChainIndex::Joined(index.clone());
        state.height = tip.height;
        state.reward_pool = tip.reward_pool;
        state.diff = tip.diff;
        state.last_retarget = tip.last_retarget;
        state.weave_size = tip.weave_size;

        match self.store.read_wallet_list(&tip.wallet_root) {
            Ok(wallets) => {
                state.wallet_list = wallets;
            }
            Err(err) => {
                warn!(error = %err, "no stored wallet list for replacement tip; keeping current");
            }
        }
        state.floating_wallet_list = state
            .wallet_list
            .apply_txs(&state.txs)
            .unwrap_or_else(|_| state.wallet_list.clone());

        if let Err(err) = self.store.write_block_index(&index) {
            warn!(error = %err, "failed to persist replacement block index");
        }

        self.miner.reset();
        info!(height = state.height, "block index replaced");
        Ok("replace_block_index")
    }

    // ── Integration ─────────────────────────────────────────────────────

    /// Advance the head to `block`. Post-conditions per the consensus rules:
    /// index prepended, pools rotated and re-filtered, potential pool
    /// cleared, floating list rebuilt, chain scalars taken from the block,
    /// everything persisted, the block gossiped and the miner reseeded.
    fn integrate(
        &mut self,
        state: &mut NodeState,
        block: Block,
        block_txs: Vec<Transaction>,
        new_wallets: weave_ledger::WalletList,
        recall: Option<Block>,
    ) {
        let mut index = match state.chain.as_index() {
            Some(existing) => existing.clone(),
            None => BlockIndex::new(),
        };
        index.push_tip(BlockIndexEntry::from_block(&block));
        state.chain = ChainIndex::Joined(index.clone());
        state.height = block.height;

        let confirmed: HashSet<TxId> = block.txs.iter().copied().collect();
        let remaining: Vec<Transaction> = state
            .txs
            .drain(..)
            .filter(|tx| !confirmed.contains(&tx.id))
            .collect();
        state.waiting_txs.retain(|tx| !confirmed.contains(&tx.id));
        state.txs = new_wallets.filter_out_of_order(&remaining);
        state.potential_txs.clear();

        state.wallet_list = new_wallets;
        state.floating_wallet_list = state
            .wallet_list
            .apply_txs(&state.txs)
            .unwrap_or_else(|_| state.wallet_list.clone());

        state.reward_pool = block.reward_pool;
        state.weave_size = block.weave_size;
        state.diff = block.diff;
        state.last_retarget = block.last_retarget;

        match self.store.write_block(&block) {
            Ok(()) => {}
            Err(StoreError::NotEnoughSpace) => {
                warn!(hash = %block.indep_hash, "not enough space to store block");
            }
            Err(err) => {
                warn!(hash = %block.indep_hash, error = %err, "failed to store block");
            }
        }
        for tx in &block_txs {
            match self.store.write_tx(tx) {
                Ok(()) | Err(StoreError::FirewallRejected) => {}
                Err(err) => {
                    warn!(tx_id = %tx.id, error = %err, "failed to store tx");
                }
            }
        }
        let root = state.wallet_list.root_hash();
        if let Err(err) = self.store.write_wallet_list(&root, &state.wallet_list) {
            warn!(error = %err, "failed to store wallet list");
        }
        if let Err(err) = self.store.write_block_index(&index) {
            warn!(error = %err, "failed to store block index");
        }

        let message = GossipMessage::NewBlock {
            height: block.height,
            block: block.clone(),
            recall_block: recall,
        };
        let report = state.gossip.send(&message, &mut self.rng);
        info!(
            height = block.height,
            hash = %block.indep_hash,
            delivered = report.delivered.len(),
            "integrated new block"
        );

        self.miner.reset();
        if state.automine {
            self.miner.start_mining(state, &self.store, None);
        }
    }

    fn recovery_context(&self) -> RecoveryContext {
        RecoveryContext {
            registry: Arc::clone(&self.fork),
            peers: Arc::clone(&self.peers),
            store: Arc::clone(&self.store),
            events: self.events.clone(),
            clock: Arc::clone(&self.clock),
            params: self.params.clone(),
        }
    }
}

/// Apply a validated block's txs and finder reward to the confirmed wallet
/// list.
fn apply_block(
    params: &ProtocolParams,
    state: &NodeState,
    block: &Block,
    txs: &[Transaction],
    recall: &Block,
) -> Result<weave_ledger::WalletList, NodeError> {
    let split = weave_ledger::split_reward(
        state.reward_pool,
        txs,
        &block.reward_addr,
        recall.block_size,
        block.weave_size,
        block.height,
        params,
    );
    let mut wallets = state.wallet_list.apply_txs(txs)?;
    wallets.apply_mining_reward(&block.reward_addr, split.finder);
    Ok(wallets)
}
