//! Protocol parameters.
//!
//! Chain-timing and admission constants shared by the validator, the miner
//! and the transaction pools. Transaction field size limits are protocol
//! constants and live with the transaction type itself.

use serde::{Deserialize, Serialize};

/// Chain parameters stored by every node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProtocolParams {
    /// Target seconds between blocks.
    pub target_block_time_secs: u64,

    /// Difficulty retargets every this many blocks.
    pub retarget_blocks: u64,

    /// Minimum difficulty (leading zero bits of the work digest).
    pub min_diff: u32,

    /// Maximum difficulty.
    pub max_diff: u32,

    /// Tolerated clock skew for block timestamps, in seconds.
    pub clock_skew_secs: u64,

    /// Base transaction propagation delay in milliseconds.
    pub propagation_base_delay_ms: u64,

    /// Per-byte propagation delay, numerator (milliseconds scale).
    pub propagation_delay_num: u64,

    /// Per-byte propagation delay, denominator.
    pub propagation_delay_den: u64,

    /// A waiting tx is only promoted while free memory exceeds this multiple
    /// of its data size.
    pub memory_headroom_multiple: u64,

    /// Below this height the finder's recall-size share of the pool is
    /// doubled.
    pub proportion_ramp_height: u64,
}

impl ProtocolParams {
    /// Fast timings for development networks and tests.
    pub fn dev_defaults() -> Self {
        Self {
            target_block_time_secs: 2,
            retarget_blocks: 5,
            min_diff: 1,
            max_diff: 64,
            clock_skew_secs: 15,
            propagation_base_delay_ms: 30_000,
            propagation_delay_num: 300,
            propagation_delay_den: 1000,
            memory_headroom_multiple: 4,
            proportion_ramp_height: 100,
        }
    }
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            target_block_time_secs: 120,
            retarget_blocks: 10,
            min_diff: 1,
            max_diff: 64,
            clock_skew_secs: 15,
            propagation_base_delay_ms: 30_000,
            propagation_delay_num: 300,
            propagation_delay_den: 1000,
            memory_headroom_multiple: 4,
            proportion_ramp_height: 100_000,
        }
    }
}
