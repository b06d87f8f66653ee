//! Finder reward and reward-pool accounting.
//!
//! Transaction fees flow into a persistent pool; each block's miner takes the
//! share of the pool proportional to the recall block's fraction of the
//! weave. All arithmetic is integer (u128) so every node computes the same
//! split. Conservation holds unconditionally:
//! `finder + new_pool = old_pool + Σ tx.reward`.

use weave_types::{ProtocolParams, RewardAddress, Winston};

use crate::tx::Transaction;

/// The outcome of splitting the reward pool for one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RewardSplit {
    pub finder: Winston,
    pub new_pool: Winston,
}

/// Sum of fees over a transaction set.
pub fn tx_fees(txs: &[Transaction]) -> Winston {
    txs.iter().map(|tx| tx.reward).sum()
}

/// Split the pool between the block finder and the carried-forward pool.
///
/// The finder share is `recall_block_size / weave_size` of the pooled fees,
/// doubled while the chain is below the ramp height and capped at the whole
/// pool. An unclaimed reward address forfeits the share to the pool.
pub fn split_reward(
    old_pool: Winston,
    txs: &[Transaction],
    reward_addr: &RewardAddress,
    recall_block_size: u64,
    weave_size: u64,
    height: u64,
    params: &ProtocolParams,
) -> RewardSplit {
    let base = old_pool
        .checked_add(tx_fees(txs))
        .unwrap_or(old_pool);

    if reward_addr.is_unclaimed() || weave_size == 0 {
        return RewardSplit {
            finder: Winston::ZERO,
            new_pool: base,
        };
    }

    let multiplier: u128 = if height < params.proportion_ramp_height {
        2
    } else {
        1
    };
    let numerator = (recall_block_size.min(weave_size) as u128) * multiplier;
    let weave = weave_size as u128;
    let finder_raw = match base.raw().checked_mul(numerator) {
        Some(product) => product / weave,
        // Divide-first when the product would overflow u128.
        None => (base.raw() / weave).saturating_mul(numerator),
    }
    .min(base.raw());

    let finder = Winston::new(finder_raw);
    RewardSplit {
        finder,
        new_pool: base - finder,
    }
}
