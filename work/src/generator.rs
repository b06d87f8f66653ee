//! PoW generation (CPU).

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use weave_types::BlockHash;

use crate::validator::validate_work;
use crate::{WorkError, WorkNonce};

/// How many nonces to try between cancellation checks.
const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Generates proof-of-work for a candidate block.
pub struct WorkGenerator;

impl WorkGenerator {
    /// Search nonces until one satisfies the difficulty, the flag cancels
    /// the search, or the nonce space is exhausted.
    ///
    /// `attempt_delay` throttles the search (the node's mining delay); it is
    /// applied once per cancellation-check window.
    pub fn generate(
        &self,
        indep_hash: &BlockHash,
        recall_hash: &BlockHash,
        diff: u32,
        cancel: &AtomicBool,
        attempt_delay: Option<Duration>,
    ) -> Result<WorkNonce, WorkError> {
        let mut nonce: u64 = 0;
        loop {
            if validate_work(indep_hash, nonce, recall_hash, diff) {
                return Ok(WorkNonce(nonce));
            }
            if nonce % CANCEL_CHECK_INTERVAL == CANCEL_CHECK_INTERVAL - 1 {
                if cancel.load(Ordering::Relaxed) {
                    return Err(WorkError::Cancelled);
                }
                if let Some(delay) = attempt_delay {
                    std::thread::sleep(delay);
                }
            }
            nonce = nonce.checked_add(1).ok_or(WorkError::Exhausted(diff))?;
        }
    }
}
