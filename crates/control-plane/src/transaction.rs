//! Append-only journal of lock-and-mint and burn-and-release operations.
//!
//! Entries are recorded for audit and reconciliation and are never changed once written.
//! Identifiers hash the operation together with a creation nonce, so the same logical operation
//! submitted twice produces two entries.

use std::{collections::HashMap, fmt, sync::Arc};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use xchain_primitives::{
    clock::{Clock, SystemClock},
    ids::{IdHasher, NonceSource},
};

use crate::{errors::ErrorKind, types::non_empty};

/// Direction of a journaled movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    /// Assets locked on the source chain and minted on the target.
    LockMint,
    /// Assets burned on the target chain and released on the source.
    BurnRelease,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionType::LockMint => "lockmint",
            TransactionType::BurnRelease => "burnrelease",
        };
        f.write_str(s)
    }
}

/// A journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossChainTransaction {
    /// Unique identifier.
    pub id: String,
    /// The bridge the movement went through.
    pub bridge_id: String,
    /// Direction.
    pub tx_type: TransactionType,
    /// The asset moved.
    pub asset_id: String,
    /// Amount in the asset's smallest unit.
    pub amount: u64,
    /// Recipient of a release; `None` for lock-and-mint.
    pub to: Option<String>,
    /// Lock proof; `None` for burn-and-release.
    pub proof: Option<String>,
    /// When the entry was recorded.
    pub created_at: DateTime<Utc>,
}

/// Errors raised by the [`TransactionManager`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// A required field was blank or the amount was zero.
    #[error("invalid transaction: {0}")]
    Invalid(&'static str),
}

impl TransactionError {
    /// The taxonomy bucket of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            TransactionError::Invalid(_) => ErrorKind::Validation,
        }
    }
}

/// The result type for journal operations.
pub type TransactionResult<T> = Result<T, TransactionError>;

/// The cross-chain transaction journal.
#[derive(Debug)]
pub struct TransactionManager {
    clock: Arc<dyn Clock>,
    nonces: NonceSource,
    txs: RwLock<HashMap<String, CrossChainTransaction>>,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    /// Creates an empty journal.
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            nonces: NonceSource::new(),
            txs: RwLock::new(HashMap::new()),
        }
    }

    /// Replaces the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Records a lock-and-mint and returns its id.
    pub fn lock_and_mint(
        &self,
        bridge_id: &str,
        asset_id: &str,
        amount: u64,
        proof: &str,
    ) -> TransactionResult<String> {
        let proof = non_empty(proof).map(str::to_string);
        self.record(TransactionType::LockMint, bridge_id, asset_id, amount, None, proof)
    }

    /// Records a burn-and-release to `to` and returns its id.
    pub fn burn_and_release(
        &self,
        bridge_id: &str,
        to: &str,
        asset_id: &str,
        amount: u64,
    ) -> TransactionResult<String> {
        let to = non_empty(to).ok_or(TransactionError::Invalid("recipient is required"))?;
        self.record(
            TransactionType::BurnRelease,
            bridge_id,
            asset_id,
            amount,
            Some(to.to_string()),
            None,
        )
    }

    /// Returns a copy of an entry.
    pub fn get_transaction(&self, id: &str) -> Option<CrossChainTransaction> {
        self.txs.read().get(id).cloned()
    }

    /// Returns every entry sorted by creation time, then id.
    pub fn list_transactions(&self) -> Vec<CrossChainTransaction> {
        self.sorted(|_| true)
    }

    /// Returns the entries for one bridge sorted by creation time, then id.
    pub fn list_transactions_by_bridge(&self, bridge_id: &str) -> Vec<CrossChainTransaction> {
        self.sorted(|tx| tx.bridge_id == bridge_id)
    }

    fn sorted(&self, keep: impl Fn(&CrossChainTransaction) -> bool) -> Vec<CrossChainTransaction> {
        let mut out: Vec<_> = self
            .txs
            .read()
            .values()
            .filter(|tx| keep(tx))
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        out
    }

    fn record(
        &self,
        tx_type: TransactionType,
        bridge_id: &str,
        asset_id: &str,
        amount: u64,
        to: Option<String>,
        proof: Option<String>,
    ) -> TransactionResult<String> {
        let bridge_id =
            non_empty(bridge_id).ok_or(TransactionError::Invalid("bridge id is required"))?;
        let asset_id =
            non_empty(asset_id).ok_or(TransactionError::Invalid("asset id is required"))?;
        if amount == 0 {
            return Err(TransactionError::Invalid("amount must be positive"));
        }

        let now = self.clock.now();
        let id = IdHasher::new("transaction")
            .field(tx_type.to_string())
            .field(bridge_id)
            .field(asset_id)
            .field(amount.to_be_bytes())
            .field(to.as_deref().unwrap_or_default())
            .field(proof.as_deref().unwrap_or_default())
            .nonce(self.nonces.next(now))
            .finish();

        let tx = CrossChainTransaction {
            id: id.clone(),
            bridge_id: bridge_id.to_string(),
            tx_type,
            asset_id: asset_id.to_string(),
            amount,
            to,
            proof,
            created_at: now,
        };
        self.txs.write().insert(id.clone(), tx);

        info!(%id, %tx_type, %bridge_id, %asset_id, amount, "cross-chain transaction recorded");
        Ok(id)
    }
}
