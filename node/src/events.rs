//! The closed event set of the node worker.
//!
//! Every state mutation enters through exactly one of these variants.
//! Callers may attach a oneshot reply to any event; asynchronous producers
//! (timers, the miner, fork recovery) post fire-and-forget requests.

use tokio::sync::oneshot;

use weave_gossip::PeerId;
use weave_ledger::{Block, BlockIndex, Transaction};
use weave_types::{RewardAddress, Timestamp, TxId};

/// Everything that can alter node state.
#[derive(Debug)]
pub enum Event {
    /// A transaction arrived (from gossip or a local submitter).
    AddTx(Transaction),
    /// A waiting transaction's propagation delay elapsed.
    PromoteTx(TxId),
    /// A candidate block arrived from a peer.
    ProcessNewBlock {
        peer: Option<PeerId>,
        block: Block,
        recall: Option<Block>,
        hash_list: Option<BlockIndex>,
    },
    /// The PoW worker found a nonce.
    WorkComplete {
        txs: Vec<Transaction>,
        diff: u32,
        nonce: u64,
        timestamp: Timestamp,
    },
    /// Fork recovery produced a validated replacement chain.
    ForkRecovered(BlockIndex),
    /// Start mining at the current difficulty.
    Mine,
    /// Start mining at an explicit difficulty.
    MineAtDiff(u32),
    /// Mine continuously: restart the miner after every integrated block.
    AutoMine,
    /// Force-replace the chain with the given blocks, tip first.
    ReplaceBlockIndex(Vec<Block>),
    /// Mark a gossip message seen; only the cursor changes.
    Ignore([u8; 32]),
    SetRewardAddr(RewardAddress),
    SetLossProbability(f64),
    SetDelay(u64),
    SetXferSpeed(u64),
    SetMiningDelay(u64),
    AddPeers(Vec<PeerId>),
    /// Terminate the worker.
    Stop,
}

/// Reply to a synchronous caller: an accepted tag or a rejection reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    Ok(&'static str),
    Rejected(String),
}

impl Ack {
    pub fn is_ok(&self) -> bool {
        matches!(self, Ack::Ok(_))
    }

    pub fn tag(&self) -> Option<&'static str> {
        match self {
            Ack::Ok(tag) => Some(tag),
            Ack::Rejected(_) => None,
        }
    }
}

/// An event together with its optional reply channel.
#[derive(Debug)]
pub struct Request {
    pub event: Event,
    pub reply: Option<oneshot::Sender<Ack>>,
}

impl Request {
    /// Fire-and-forget.
    pub fn cast(event: Event) -> Self {
        Self { event, reply: None }
    }

    /// A request expecting a reply.
    pub fn call(event: Event) -> (Self, oneshot::Receiver<Ack>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                event,
                reply: Some(tx),
            },
            rx,
        )
    }
}
