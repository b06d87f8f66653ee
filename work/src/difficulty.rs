//! Difficulty retargeting.
//!
//! Every `retarget_blocks` blocks the difficulty steps by at most one bit:
//! up when the interval took less than half the target time, down when it
//! took more than double, clamped to the protocol bounds. Between retarget
//! heights the difficulty and retarget timestamp carry over unchanged.

use weave_types::{ProtocolParams, Timestamp};

/// The difficulty and retarget timestamp a block at `height` must carry.
///
/// `prev_diff` / `prev_last_retarget` come from the prior head; `timestamp`
/// is the candidate block's own timestamp.
pub fn retarget(
    params: &ProtocolParams,
    height: u64,
    prev_diff: u32,
    prev_last_retarget: Timestamp,
    timestamp: Timestamp,
) -> (u32, Timestamp) {
    if height == 0 || height % params.retarget_blocks != 0 {
        return (prev_diff, prev_last_retarget);
    }

    let actual_secs = prev_last_retarget.elapsed_since(timestamp);
    let target_secs = params.retarget_blocks * params.target_block_time_secs;

    let new_diff = if actual_secs < target_secs / 2 {
        prev_diff.saturating_add(1).min(params.max_diff)
    } else if actual_secs > target_secs * 2 {
        prev_diff.saturating_sub(1).max(params.min_diff)
    } else {
        prev_diff
    };

    (new_diff, timestamp)
}
