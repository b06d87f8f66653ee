//! The gossip layer as seen by the node core.
//!
//! The node owns a value-typed [`GossipState`] cursor: the peer set, the
//! loss/delay/transfer-speed knobs and a rolling dedup cache. `send` computes
//! which peers a message reaches; delivery itself is the transport's job.
//! Fork recovery fetches chain data from peers through the [`PeerSource`]
//! seam.

pub mod dedup;
pub mod error;
pub mod message;
pub mod peers;
pub mod state;

pub use dedup::MessageDedup;
pub use error::GossipError;
pub use message::GossipMessage;
pub use peers::{NoPeers, PeerId, PeerSource};
pub use state::{GossipState, SendReport};
