//! The gossip cursor.
//!
//! A plain value owned by the node state and mutated only by the node
//! worker. `send` simulates flood propagation over the configured peer set:
//! each peer independently drops the message with `loss_probability`, and
//! the report carries the simulated latency derived from the delay and
//! transfer-speed knobs.

use std::collections::BTreeSet;

use rand::Rng;

use weave_types::WeaveError;

use crate::dedup::MessageDedup;
use crate::message::GossipMessage;
use crate::peers::PeerId;

/// Outcome of a send: which peers the message reached.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SendReport {
    pub delivered: Vec<PeerId>,
    pub dropped: usize,
    /// Simulated per-peer latency in milliseconds.
    pub latency_ms: u64,
}

/// The gossip-layer cursor.
#[derive(Clone, Debug)]
pub struct GossipState {
    peers: BTreeSet<PeerId>,
    seen: MessageDedup,
    loss_probability: f64,
    delay_ms: u64,
    xfer_speed_bps: Option<u64>,
}

impl GossipState {
    pub fn new() -> Self {
        Self {
            peers: BTreeSet::new(),
            seen: MessageDedup::default(),
            loss_probability: 0.0,
            delay_ms: 0,
            xfer_speed_bps: None,
        }
    }

    pub fn peers(&self) -> impl Iterator<Item = &PeerId> {
        self.peers.iter()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn add_peers(&mut self, peers: impl IntoIterator<Item = PeerId>) {
        self.peers.extend(peers);
    }

    pub fn loss_probability(&self) -> f64 {
        self.loss_probability
    }

    pub fn set_loss_probability(&mut self, p: f64) -> Result<(), WeaveError> {
        if !(0.0..=1.0).contains(&p) || p.is_nan() {
            return Err(WeaveError::InvalidProbability(p));
        }
        self.loss_probability = p;
        Ok(())
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    pub fn set_delay(&mut self, ms: u64) {
        self.delay_ms = ms;
    }

    pub fn xfer_speed_bps(&self) -> Option<u64> {
        self.xfer_speed_bps
    }

    pub fn set_xfer_speed(&mut self, bps: u64) {
        self.xfer_speed_bps = Some(bps);
    }

    /// Record an inbound message; returns `false` for an already-seen
    /// duplicate (the caller just advances its cursor).
    pub fn observe(&mut self, msg: &GossipMessage) -> bool {
        !self.seen.is_duplicate(&msg.id())
    }

    /// Mark a message id seen without processing it.
    pub fn mark_seen(&mut self, id: [u8; 32]) {
        self.seen.is_duplicate(&id);
    }

    /// Flood a message to the peer set.
    ///
    /// The message is recorded as seen so our own broadcast does not bounce
    /// back into the worker.
    pub fn send<R: Rng>(&mut self, msg: &GossipMessage, rng: &mut R) -> SendReport {
        self.seen.is_duplicate(&msg.id());

        let mut report = SendReport {
            latency_ms: self.latency_for(msg.wire_size()),
            ..SendReport::default()
        };
        for peer in &self.peers {
            if self.loss_probability > 0.0 && rng.gen::<f64>() < self.loss_probability {
                report.dropped += 1;
            } else {
                report.delivered.push(peer.clone());
            }
        }
        report
    }

    fn latency_for(&self, bytes: u64) -> u64 {
        let xfer = match self.xfer_speed_bps {
            Some(bps) if bps > 0 => bytes.saturating_mul(1000) / bps,
            _ => 0,
        };
        self.delay_ms + xfer
    }
}

impl Default for GossipState {
    fn default() -> Self {
        Self::new()
    }
}
