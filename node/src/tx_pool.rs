//! Transaction pool management.
//!
//! Incoming transactions wait out a size-scaled propagation delay before
//! becoming active; conflicting or unaffordable ones are parked in the
//! potential pool so fork recovery can reconsider them. All pools are
//! deduplicated by id and the three stay pairwise disjoint.

use tracing::debug;

use weave_types::{ProtocolParams, TxId};

use weave_ledger::Transaction;

use crate::diagnostics::{TxDiagnostics, LAST_TX_NOT_VALID};
use crate::state::NodeState;

/// Two transactions conflict when they spend from the same wallet position.
pub fn conflicting(a: &Transaction, b: &Transaction) -> bool {
    a.last_tx == b.last_tx && a.owner == b.owner
}

/// Propagation delay for a transaction of `data_size` bytes, in
/// milliseconds: `base + (size × num) / den`, integer division.
pub fn propagation_delay_ms(params: &ProtocolParams, data_size: u64, fixed: Option<u64>) -> u64 {
    if let Some(ms) = fixed {
        return ms;
    }
    params.propagation_base_delay_ms
        + data_size.saturating_mul(params.propagation_delay_num) / params.propagation_delay_den
}

/// Outcome of admitting a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddTxOutcome {
    /// Parked in `waiting_txs`; promote after the delay.
    Queued { delay_ms: u64 },
    /// Conflicts with a pooled transaction; parked in `potential_txs`.
    Conflict,
    /// Already pooled.
    Duplicate,
}

/// Admit a transaction into the pools.
pub fn add_tx(
    state: &mut NodeState,
    tx: Transaction,
    diagnostics: &TxDiagnostics,
    params: &ProtocolParams,
    fixed_delay_ms: Option<u64>,
) -> AddTxOutcome {
    if state.has_pooled_tx(&tx.id) {
        debug!(tx_id = %tx.id, "duplicate transaction ignored");
        return AddTxOutcome::Duplicate;
    }

    if state.aggregate().any(|pooled| conflicting(pooled, &tx)) {
        debug!(tx_id = %tx.id, "conflicting transaction parked as potential");
        diagnostics.flag(tx.id, LAST_TX_NOT_VALID);
        state.potential_txs.push(tx);
        return AddTxOutcome::Conflict;
    }

    let delay_ms = propagation_delay_ms(params, tx.data_size, fixed_delay_ms);
    state.waiting_txs.push(tx);
    AddTxOutcome::Queued { delay_ms }
}

/// Outcome of a promotion attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromoteOutcome {
    /// Moved from waiting to active; the floating wallet list reflects it.
    Promoted,
    /// Unaffordable against the floating wallet list; parked as potential.
    Evicted,
    /// Dropped outright: free memory below the admission headroom.
    DroppedLowMemory,
    /// The id is not in the waiting pool.
    NotWaiting,
}

/// Promote a waiting transaction whose propagation delay elapsed.
pub fn promote(
    state: &mut NodeState,
    id: &TxId,
    free_memory_bytes: u64,
    params: &ProtocolParams,
) -> PromoteOutcome {
    let Some(position) = state.waiting_txs.iter().position(|tx| tx.id == *id) else {
        return PromoteOutcome::NotWaiting;
    };
    let tx = state.waiting_txs.remove(position);

    let headroom = tx.data_size.saturating_mul(params.memory_headroom_multiple);
    if free_memory_bytes <= headroom {
        debug!(tx_id = %tx.id, free_memory_bytes, headroom, "waiting tx dropped under memory pressure");
        return PromoteOutcome::DroppedLowMemory;
    }

    match state.floating_wallet_list.apply_tx(&tx) {
        Ok(()) => {
            state.txs.push(tx);
            PromoteOutcome::Promoted
        }
        Err(err) => {
            debug!(tx_id = %tx.id, error = %err, "tx unaffordable; parked as potential");
            state.potential_txs.push(tx);
            PromoteOutcome::Evicted
        }
    }
}
