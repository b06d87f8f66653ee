//! The public node handle.
//!
//! `WeaveNode` wires the worker, its queue, the snapshot channel and the
//! diagnostics store together, and exposes a typed async API over the event
//! set. Components never hold the worker's state — only this handle's
//! queue sender.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::warn;

use weave_crypto::sha256;
use weave_gossip::{GossipState, PeerId, PeerSource};
use weave_ledger::{Block, BlockIndex, Transaction};
use weave_store::Store;
use weave_types::{Clock, ProtocolParams, RewardAddress};

use crate::config::NodeConfig;
use crate::diagnostics::TxDiagnostics;
use crate::error::NodeError;
use crate::events::{Ack, Event, Request};
use crate::fork::ForkRegistry;
use crate::memory::MemoryMonitor;
use crate::state::NodeState;
use crate::worker::NodeWorker;

/// How long a synchronous call waits for the worker before reporting a
/// timeout. The event is still processed; only the caller gives up.
pub const CALL_TIMEOUT: Duration = Duration::from_millis(5000);

/// Capacity of the worker's inbound event queue.
const EVENT_QUEUE_CAPACITY: usize = 1024;

/// A running Weave node.
pub struct WeaveNode {
    events: mpsc::Sender<Request>,
    snapshot: watch::Receiver<Arc<NodeState>>,
    diagnostics: TxDiagnostics,
    fork: Arc<ForkRegistry>,
    worker: JoinHandle<()>,
}

impl WeaveNode {
    /// Spawn a node worker and return its handle.
    pub fn spawn(
        config: &NodeConfig,
        params: ProtocolParams,
        store: Arc<dyn Store>,
        peers: Arc<dyn PeerSource>,
        clock: Arc<dyn Clock>,
        memory: Arc<dyn MemoryMonitor>,
    ) -> Result<Self, NodeError> {
        let seed = config.rng_seed.unwrap_or_else(rand::random);
        let rng = StdRng::seed_from_u64(seed);

        let mut gossip = GossipState::new();
        gossip.add_peers(config.peers.iter().map(PeerId::new));
        gossip.set_loss_probability(config.loss_probability)?;
        gossip.set_delay(config.gossip_delay_ms);
        if let Some(bps) = config.xfer_speed_bps {
            gossip.set_xfer_speed(bps);
        }

        let id = sha256(&seed.to_be_bytes()).to_vec();
        let mut state = NodeState::new(id, gossip, config.initial_diff);
        state.reward_addr = config.reward_address()?;
        state.automine = config.automine;
        state.mining_delay_ms = config.mining_delay_ms;

        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(state.clone()));
        let diagnostics = TxDiagnostics::new();
        let fork = Arc::new(ForkRegistry::new());

        let worker = NodeWorker::new(
            state,
            events_rx,
            events_tx.clone(),
            store,
            peers,
            clock,
            memory,
            diagnostics.clone(),
            Arc::clone(&fork),
            params,
            rng,
            config.fixed_propagation_delay_ms,
            snapshot_tx,
        );
        let worker = tokio::spawn(worker.run());

        Ok(Self {
            events: events_tx,
            snapshot: snapshot_rx,
            diagnostics,
            fork,
            worker,
        })
    }

    /// Post an event and wait for the worker's reply, up to [`CALL_TIMEOUT`].
    pub async fn call(&self, event: Event) -> Result<Ack, NodeError> {
        let (request, reply) = Request::call(event);
        self.events
            .send(request)
            .await
            .map_err(|_| NodeError::ChannelClosed)?;
        match tokio::time::timeout(CALL_TIMEOUT, reply).await {
            Ok(Ok(ack)) => Ok(ack),
            Ok(Err(_)) => Err(NodeError::ChannelClosed),
            Err(_) => Err(NodeError::Timeout),
        }
    }

    /// Post an event without waiting for a reply.
    pub async fn cast(&self, event: Event) -> Result<(), NodeError> {
        self.events
            .send(Request::cast(event))
            .await
            .map_err(|_| NodeError::ChannelClosed)
    }

    // ── Typed wrappers ──────────────────────────────────────────────────

    pub async fn add_tx(&self, tx: Transaction) -> Result<Ack, NodeError> {
        self.call(Event::AddTx(tx)).await
    }

    pub async fn process_block(
        &self,
        peer: Option<PeerId>,
        block: Block,
        recall: Option<Block>,
        hash_list: Option<BlockIndex>,
    ) -> Result<Ack, NodeError> {
        self.call(Event::ProcessNewBlock {
            peer,
            block,
            recall,
            hash_list,
        })
        .await
    }

    pub async fn mine(&self) -> Result<Ack, NodeError> {
        self.call(Event::Mine).await
    }

    pub async fn mine_at_diff(&self, diff: u32) -> Result<Ack, NodeError> {
        self.call(Event::MineAtDiff(diff)).await
    }

    pub async fn automine(&self) -> Result<Ack, NodeError> {
        self.call(Event::AutoMine).await
    }

    pub async fn replace_block_index(&self, blocks: Vec<Block>) -> Result<Ack, NodeError> {
        self.call(Event::ReplaceBlockIndex(blocks)).await
    }

    pub async fn set_reward_addr(&self, addr: RewardAddress) -> Result<Ack, NodeError> {
        self.call(Event::SetRewardAddr(addr)).await
    }

    pub async fn set_loss_probability(&self, p: f64) -> Result<Ack, NodeError> {
        self.call(Event::SetLossProbability(p)).await
    }

    pub async fn set_delay(&self, ms: u64) -> Result<Ack, NodeError> {
        self.call(Event::SetDelay(ms)).await
    }

    pub async fn set_xfer_speed(&self, bps: u64) -> Result<Ack, NodeError> {
        self.call(Event::SetXferSpeed(bps)).await
    }

    pub async fn set_mining_delay(&self, ms: u64) -> Result<Ack, NodeError> {
        self.call(Event::SetMiningDelay(ms)).await
    }

    pub async fn add_peers(&self, peers: Vec<PeerId>) -> Result<Ack, NodeError> {
        self.call(Event::AddPeers(peers)).await
    }

    /// Stop the worker and wait for it to exit.
    pub async fn stop(self) -> Result<(), NodeError> {
        match self.call(Event::Stop).await {
            Ok(_) | Err(NodeError::Timeout) => {}
            Err(err) => return Err(err),
        }
        if let Err(err) = self.worker.await {
            warn!(error = %err, "worker task ended abnormally");
        }
        Ok(())
    }

    // ── Observation ─────────────────────────────────────────────────────

    /// The latest committed state snapshot.
    pub fn snapshot(&self) -> Arc<NodeState> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to state snapshots.
    pub fn subscribe(&self) -> watch::Receiver<Arc<NodeState>> {
        self.snapshot.clone()
    }

    pub fn diagnostics(&self) -> &TxDiagnostics {
        &self.diagnostics
    }

    /// Whether a fork recovery is currently registered.
    pub fn recovering(&self) -> bool {
        self.fork.is_active()
    }
}
