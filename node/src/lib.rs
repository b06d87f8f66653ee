//! The Weave core node.
//!
//! A single-writer event worker serializes every mutation of chain state:
//! incoming transactions, gossiped blocks, mined blocks, fork-recovery
//! results and configuration changes. Everything else — the miner, timers,
//! fork recovery, callers — talks to it by posting events.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod fork;
pub mod logging;
pub mod memory;
pub mod miner;
pub mod node;
pub mod state;
pub mod timer;
pub mod tx_pool;
pub mod validator;
pub mod worker;

pub use config::NodeConfig;
pub use diagnostics::TxDiagnostics;
pub use error::NodeError;
pub use events::{Ack, Event, Request};
pub use node::{WeaveNode, CALL_TIMEOUT};
pub use state::{ChainIndex, NodeState};
pub use validator::{validate_block, ValidationError};
