//! Nullable infrastructure for deterministic testing.
//!
//! External dependencies of the node worker (time, remote peers) live
//! behind traits; this crate provides implementations that return
//! programmed values and never touch the clock or the network. Swap them in
//! for the real implementations in tests.

pub mod clock;
pub mod peers;

pub use clock::NullClock;
pub use peers::ScriptedPeers;
