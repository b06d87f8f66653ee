//! Candidate block validation.
//!
//! Pure checks against the prior head, the recall block and the confirmed
//! wallet list. Runs in the order below and short-circuits on the first
//! failure; every failure carries a reason tag and nothing mutates state.

use thiserror::Error;

use weave_ledger::{split_reward, Block, Transaction, WalletList};
use weave_types::{ProtocolParams, Timestamp};
use weave_work::{retarget, validate_work};

/// Why a candidate block was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("indep_hash does not match the header")]
    IndepHashMismatch,

    #[error("height {got} does not extend head height {head}")]
    HeightMismatch { head: u64, got: u64 },

    #[error("previous hash does not match the head")]
    PreviousMismatch,

    #[error("timestamp {got} outside the allowed window")]
    TimestampOutOfRange { got: u64 },

    #[error("difficulty {got} does not match expected retarget {expected}")]
    DifficultyMismatch { expected: u32, got: u32 },

    #[error("last_retarget does not match the retarget schedule")]
    LastRetargetMismatch,

    #[error("proof of work does not satisfy difficulty {0}")]
    WorkInvalid(u32),

    #[error("transaction set does not match tx_root")]
    TxRootMismatch,

    #[error("transaction application failed: {0}")]
    InvalidTx(String),

    #[error("wallet_root does not match the applied wallet list")]
    WalletRootMismatch,

    #[error("reward_pool {got} does not match expected {expected}")]
    RewardPoolMismatch { expected: u128, got: u128 },

    #[error("weave_size {got} does not match expected {expected}")]
    WeaveSizeMismatch { expected: u64, got: u64 },
}

/// Validate `candidate` as the next block after `prev`.
///
/// `txs` must be the full transactions for `candidate.txs`, in block order.
pub fn validate_block(
    params: &ProtocolParams,
    now: Timestamp,
    candidate: &Block,
    txs: &[Transaction],
    prev: &Block,
    recall: &Block,
    wallet_list: &WalletList,
) -> Result<(), ValidationError> {
    if !candidate.verify_indep_hash() {
        return Err(ValidationError::IndepHashMismatch);
    }

    if candidate.height != prev.height + 1 {
        return Err(ValidationError::HeightMismatch {
            head: prev.height,
            got: candidate.height,
        });
    }

    if candidate.previous != prev.indep_hash {
        return Err(ValidationError::PreviousMismatch);
    }

    let ts = candidate.timestamp.as_secs();
    let lower = prev.timestamp.as_secs().saturating_sub(params.clock_skew_secs);
    let upper = now.as_secs().saturating_add(params.clock_skew_secs);
    if ts < lower || ts > upper {
        return Err(ValidationError::TimestampOutOfRange { got: ts });
    }

    let (expected_diff, expected_retarget) = retarget(
        params,
        candidate.height,
        prev.diff,
        prev.last_retarget,
        candidate.timestamp,
    );
    if candidate.diff != expected_diff {
        return Err(ValidationError::DifficultyMismatch {
            expected: expected_diff,
            got: candidate.diff,
        });
    }
    if candidate.last_retarget != expected_retarget {
        return Err(ValidationError::LastRetargetMismatch);
    }

    if !validate_work(
        &candidate.indep_hash,
        candidate.nonce,
        &recall.indep_hash,
        candidate.diff,
    ) {
        return Err(ValidationError::WorkInvalid(candidate.diff));
    }

    let ids_match = candidate.txs.len() == txs.len()
        && candidate.txs.iter().zip(txs).all(|(id, tx)| *id == tx.id);
    if !ids_match || candidate.tx_root != Block::tx_root_for(txs) {
        return Err(ValidationError::TxRootMismatch);
    }

    let applied = wallet_list
        .apply_txs(txs)
        .map_err(|e| ValidationError::InvalidTx(e.to_string()))?;

    let split = split_reward(
        prev.reward_pool,
        txs,
        &candidate.reward_addr,
        recall.block_size,
        candidate.weave_size,
        candidate.height,
        params,
    );
    let mut rewarded = applied;
    rewarded.apply_mining_reward(&candidate.reward_addr, split.finder);
    if candidate.wallet_root != rewarded.root_hash() {
        return Err(ValidationError::WalletRootMismatch);
    }
    if candidate.reward_pool != split.new_pool {
        return Err(ValidationError::RewardPoolMismatch {
            expected: split.new_pool.raw(),
            got: candidate.reward_pool.raw(),
        });
    }

    let expected_weave = prev.weave_size + Block::data_size_of(txs);
    if candidate.weave_size != expected_weave || candidate.block_size != Block::data_size_of(txs) {
        return Err(ValidationError::WeaveSizeMismatch {
            expected: expected_weave,
            got: candidate.weave_size,
        });
    }

    Ok(())
}
