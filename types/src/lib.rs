//! Fundamental types for the Weave protocol.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: addresses, hashes, token amounts, timestamps, protocol
//! parameters, and the shared error type.

pub mod address;
pub mod amount;
pub mod error;
pub mod hash;
pub mod params;
pub mod time;

pub use address::{Address, RewardAddress};
pub use amount::Winston;
pub use error::WeaveError;
pub use hash::{BlockHash, TxId};
pub use params::ProtocolParams;
pub use time::{Clock, SystemClock, Timestamp};
