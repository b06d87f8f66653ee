//! Out-of-band transaction diagnostics.
//!
//! Write-only from the worker; external consumers (an API layer, tests)
//! read the flags to explain why a transaction was shunted aside.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use weave_types::TxId;

/// Flag recorded when a transaction conflicts on `(owner, last_tx)`.
pub const LAST_TX_NOT_VALID: &str = "last_tx_not_valid";

/// Shared per-transaction status flags.
#[derive(Clone, Default)]
pub struct TxDiagnostics {
    flags: Arc<Mutex<HashMap<TxId, &'static str>>>,
}

impl TxDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag(&self, id: TxId, status: &'static str) {
        self.flags.lock().unwrap().insert(id, status);
    }

    pub fn get(&self, id: &TxId) -> Option<&'static str> {
        self.flags.lock().unwrap().get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.flags.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.lock().unwrap().is_empty()
    }
}
