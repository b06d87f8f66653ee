//! Miner supervision.
//!
//! The supervisor snapshots the mining inputs (active txs, difficulty,
//! reward address, recall block), builds the candidate header and hands the
//! nonce search to a blocking task. The search checks a cancellation flag
//! between attempt windows; a found nonce comes back to the worker only as a
//! `WorkComplete` event, so no half-finished block is ever observable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use weave_ledger::{split_reward, Block, LedgerError, Tag, Transaction, WalletList};
use weave_store::Store;
use weave_types::{Clock, ProtocolParams, RewardAddress, Timestamp};
use weave_work::{retarget, WorkError, WorkGenerator};

use crate::events::{Event, Request};
use crate::state::NodeState;

/// Build the candidate block following `prev`, together with the wallet
/// list it confirms.
///
/// The header is sealed (indep hash computed) with a zero nonce; the PoW
/// search fills the nonce in afterwards.
#[allow(clippy::too_many_arguments)]
pub fn build_candidate(
    params: &ProtocolParams,
    prev: &Block,
    txs: &[Transaction],
    wallet_list: &WalletList,
    reward_addr: &RewardAddress,
    tags: Vec<Tag>,
    recall: &Block,
    timestamp: Timestamp,
    diff_override: Option<u32>,
) -> Result<(Block, WalletList), LedgerError> {
    let height = prev.height + 1;
    let (retarget_diff, last_retarget) =
        retarget(params, height, prev.diff, prev.last_retarget, timestamp);
    let diff = diff_override.unwrap_or(retarget_diff);

    let applied = wallet_list.apply_txs(txs)?;
    let block_size = Block::data_size_of(txs);
    let weave_size = prev.weave_size + block_size;
    let split = split_reward(
        prev.reward_pool,
        txs,
        reward_addr,
        recall.block_size,
        weave_size,
        height,
        params,
    );
    let mut wallets = applied;
    wallets.apply_mining_reward(reward_addr, split.finder);

    let mut block = Block {
        indep_hash: weave_types::BlockHash::ZERO,
        previous: prev.indep_hash,
        height,
        timestamp,
        last_retarget,
        diff,
        nonce: 0,
        txs: txs.iter().map(|tx| tx.id).collect(),
        tx_root: Block::tx_root_for(txs),
        wallet_root: wallets.root_hash(),
        reward_addr: *reward_addr,
        reward_pool: split.new_pool,
        weave_size,
        block_size,
        tags,
    };
    block.seal();
    Ok((block, wallets))
}

/// Starts, cancels and reseeds the PoW worker.
pub struct MinerSupervisor {
    events: mpsc::Sender<Request>,
    clock: Arc<dyn Clock>,
    params: ProtocolParams,
    cancel: Arc<AtomicBool>,
}

impl MinerSupervisor {
    pub fn new(
        events: mpsc::Sender<Request>,
        clock: Arc<dyn Clock>,
        params: ProtocolParams,
    ) -> Self {
        Self {
            events,
            clock,
            params,
            cancel: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Cancel the current PoW search, if any.
    pub fn reset(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Start a PoW search over the node's current mining inputs.
    ///
    /// A no-op while the node has not joined a chain or when the recall or
    /// previous block cannot be read.
    pub fn start_mining(
        &mut self,
        state: &NodeState,
        store: &Arc<dyn Store>,
        diff_override: Option<u32>,
    ) {
        let Some(index) = state.chain.as_index() else {
            debug!("not joined; mining skipped");
            return;
        };
        let Some(tip) = index.tip() else {
            debug!("empty block index; mining skipped");
            return;
        };
        let prev = match store.read_block(&tip.indep_hash) {
            Ok(block) => block,
            Err(err) => {
                warn!(error = %err, "cannot read head block; mining skipped");
                return;
            }
        };
        let Some(recall_entry) = index.recall_entry(&tip.indep_hash) else {
            debug!("no recall entry; mining skipped");
            return;
        };
        let recall = match store.read_block(&recall_entry.indep_hash) {
            Ok(block) => block,
            Err(err) => {
                warn!(error = %err, "cannot read recall block; mining skipped");
                return;
            }
        };

        let timestamp = self.clock.now();
        let txs = state.txs.clone();
        let (candidate, _) = match build_candidate(
            &self.params,
            &prev,
            &txs,
            &state.wallet_list,
            &state.reward_addr,
            state.tags.clone(),
            &recall,
            timestamp,
            diff_override,
        ) {
            Ok(built) => built,
            Err(err) => {
                warn!(error = %err, "active txs do not apply; mining skipped");
                return;
            }
        };

        self.reset();
        let cancel = Arc::new(AtomicBool::new(false));
        self.cancel = Arc::clone(&cancel);

        let indep_hash = candidate.indep_hash;
        let recall_hash = recall.indep_hash;
        let diff = candidate.diff;
        let delay = (state.mining_delay_ms > 0)
            .then(|| Duration::from_millis(state.mining_delay_ms));
        let events = self.events.clone();

        info!(
            height = candidate.height,
            diff,
            recall = %recall_hash,
            txs = txs.len(),
            "mining started"
        );

        tokio::task::spawn_blocking(move || {
            match WorkGenerator.generate(&indep_hash, &recall_hash, diff, &cancel, delay) {
                Ok(nonce) => {
                    let event = Event::WorkComplete {
                        txs,
                        diff,
                        nonce: nonce.0,
                        timestamp,
                    };
                    if events.blocking_send(Request::cast(event)).is_err() {
                        debug!("worker gone; mined nonce dropped");
                    }
                }
                Err(WorkError::Cancelled) => {
                    debug!("work search cancelled");
                }
                Err(err) => {
                    warn!(error = %err, "work search failed");
                }
            }
        });
    }
}
