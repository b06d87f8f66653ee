//! The wallet ledger: address → (balance, last transaction).
//!
//! Application order matters: a transfer debits `quantity + reward` from the
//! owner and credits `quantity` to the target; a pure data transaction debits
//! only the fee. A debit that would underflow leaves the ledger untouched and
//! signals the transaction invalid.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use weave_crypto::{merkle_root, sha256_multi};
use weave_types::{Address, RewardAddress, TxId, Winston};

use crate::error::LedgerError;
use crate::tx::Transaction;

/// A single wallet's confirmed state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletEntry {
    pub balance: Winston,
    pub last_tx: TxId,
}

/// The wallet tree. Keys are kept sorted so the root hash is deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletList(BTreeMap<Address, WalletEntry>);

impl WalletList {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, address: &Address) -> Option<&WalletEntry> {
        self.0.get(address)
    }

    pub fn balance(&self, address: &Address) -> Winston {
        self.0
            .get(address)
            .map(|e| e.balance)
            .unwrap_or(Winston::ZERO)
    }

    /// Seed a wallet directly (genesis allocation, tests).
    pub fn insert(&mut self, address: Address, entry: WalletEntry) {
        self.0.insert(address, entry);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &WalletEntry)> {
        self.0.iter()
    }

    /// Apply a single transaction. On any failure the ledger is unchanged.
    pub fn apply_tx(&mut self, tx: &Transaction) -> Result<(), LedgerError> {
        let owner = tx.owner_address();
        let debit = if tx.is_transfer() {
            tx.quantity
                .checked_add(tx.reward)
                .ok_or(LedgerError::BalanceOverflow(owner))?
        } else {
            tx.reward
        };

        let available = self.balance(&owner);
        let remaining = available
            .checked_sub(debit)
            .ok_or(LedgerError::InsufficientBalance {
                address: owner,
                needed: debit.raw(),
                available: available.raw(),
            })?;

        // The credit is checked before any mutation; a self-transfer
        // credits the already-debited balance.
        if tx.is_transfer() {
            let target_before = if tx.target == owner {
                remaining
            } else {
                self.balance(&tx.target)
            };
            target_before
                .checked_add(tx.quantity)
                .ok_or(LedgerError::BalanceOverflow(tx.target))?;
        }

        let owner_entry = self.0.entry(owner).or_insert(WalletEntry {
            balance: Winston::ZERO,
            last_tx: TxId::ZERO,
        });
        owner_entry.balance = remaining;
        owner_entry.last_tx = tx.id;

        if tx.is_transfer() {
            let target_entry = self.0.entry(tx.target).or_insert(WalletEntry {
                balance: Winston::ZERO,
                last_tx: TxId::ZERO,
            });
            target_entry.balance = target_entry.balance + tx.quantity;
        }
        Ok(())
    }

    /// Fold a sequence of transactions in order; the first invalid
    /// transaction aborts the fold and returns its error.
    pub fn apply_txs(&self, txs: &[Transaction]) -> Result<WalletList, LedgerError> {
        let mut next = self.clone();
        for tx in txs {
            next.apply_tx(tx)?;
        }
        Ok(next)
    }

    /// Greedy pass keeping the transactions that apply cleanly against the
    /// running wallet state; invalid ones are skipped, not aborted on.
    ///
    /// Idempotent: filtering an already-filtered sequence is the identity.
    pub fn filter_out_of_order(&self, txs: &[Transaction]) -> Vec<Transaction> {
        let mut scratch = self.clone();
        let mut kept = Vec::with_capacity(txs.len());
        for tx in txs {
            if scratch.apply_tx(tx).is_ok() {
                kept.push(tx.clone());
            }
        }
        kept
    }

    /// Credit the finder reward, unless the address is unclaimed.
    pub fn apply_mining_reward(&mut self, addr: &RewardAddress, amount: Winston) {
        let Some(wallet) = addr.as_wallet() else {
            return;
        };
        let entry = self.0.entry(*wallet).or_insert(WalletEntry {
            balance: Winston::ZERO,
            last_tx: TxId::ZERO,
        });
        entry.balance = entry
            .balance
            .checked_add(amount)
            .unwrap_or(entry.balance);
    }

    /// Merkle root of the wallet tree, over sorted `(address, balance,
    /// last_tx)` leaves.
    pub fn root_hash(&self) -> [u8; 32] {
        let leaves: Vec<[u8; 32]> = self
            .0
            .iter()
            .map(|(addr, entry)| {
                sha256_multi(&[
                    addr.as_bytes(),
                    &entry.balance.raw().to_be_bytes(),
                    entry.last_tx.as_bytes(),
                ])
            })
            .collect();
        merkle_root(&leaves)
    }
}
