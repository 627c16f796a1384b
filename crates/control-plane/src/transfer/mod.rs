//! Asset deposits into bridges and their claims on the far side.
//!
//! ```text
//!   Pending ──claim──▶ Claimed
//!      │
//!      ├──fail──▶ Failed
//!      │
//!      └──sweep past expiry──▶ Expired
//! ```
//!
//! All three outcomes are terminal. Bridge ids are opaque: a deposit is not checked against the
//! bridge registry.

pub mod errors;
pub mod machine;
pub mod manager;
#[cfg(test)]
mod tests;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use self::{
    errors::{TransferError, TransferResult},
    machine::{TransferCommand, TransferSM},
    manager::BridgeTransferManager,
};
use crate::types::Metadata;

/// Lifecycle status of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferStatus {
    /// Deposited, waiting for a claim.
    Pending,
    /// Released on the target chain.
    Claimed,
    /// Abandoned after an error.
    Failed,
    /// Not claimed before its deadline.
    Expired,
}

impl TransferStatus {
    /// Whether no further transition is permitted.
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, TransferStatus::Pending)
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Claimed => "claimed",
            TransferStatus::Failed => "failed",
            TransferStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// A token movement through a bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeTransfer {
    /// Unique identifier.
    pub id: String,
    /// The bridge carrying the transfer.
    pub bridge_id: String,
    /// Depositor on the source chain.
    pub from: String,
    /// Recipient on the target chain.
    pub to: String,
    /// Amount in the token's smallest unit.
    pub amount: u64,
    /// The token moved.
    pub token_id: String,
    /// Proof presented with the claim; empty until claimed.
    pub proof: Vec<u8>,
    /// Current status.
    pub status: TransferStatus,
    /// Why the transfer failed, if a reason was given.
    pub failure_reason: Option<String>,
    /// Deposit time.
    pub created_at: DateTime<Utc>,
    /// Time of the last change.
    pub updated_at: DateTime<Utc>,
    /// Claim time.
    pub claimed_at: Option<DateTime<Utc>>,
    /// Claim deadline; `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Arbitrary annotations.
    pub metadata: Metadata,
}

/// Options accepted by [`BridgeTransferManager::deposit`].
#[derive(Debug, Clone, Default)]
pub struct TransferOptions {
    pub(crate) expires_at: Option<DateTime<Utc>>,
    pub(crate) metadata: Metadata,
}

impl TransferOptions {
    /// Sets a claim deadline, overriding the configured default.
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Adds a metadata entry.
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

/// Selects transfers in [`BridgeTransferManager::list_transfers`]. Empty fields match anything.
#[derive(Debug, Clone, Default)]
pub struct TransferFilter {
    /// Only these statuses.
    pub statuses: Vec<TransferStatus>,
    /// Only transfers through this bridge.
    pub bridge_id: Option<String>,
}

impl TransferFilter {
    pub(crate) fn matches(&self, transfer: &BridgeTransfer) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&transfer.status))
            && self
                .bridge_id
                .as_deref()
                .is_none_or(|b| b == transfer.bridge_id)
    }
}

/// Transfer counters, derived from the stored transfers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferMetrics {
    /// Every transfer ever deposited.
    pub total: usize,
    /// Claimed transfers.
    pub claimed: usize,
    /// Failed transfers.
    pub failed: usize,
    /// Expired transfers.
    pub expired: usize,
}

/// What happened to a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferEventKind {
    /// Assets were deposited.
    Deposited,
    /// The transfer was claimed.
    Claimed,
    /// The transfer failed.
    Failed,
    /// The transfer expired unclaimed.
    Expired,
}

impl fmt::Display for TransferEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferEventKind::Deposited => "deposited",
            TransferEventKind::Claimed => "claimed",
            TransferEventKind::Failed => "failed",
            TransferEventKind::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// A transfer lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    /// What happened.
    pub kind: TransferEventKind,
    /// Snapshot of the transfer right after the change.
    pub transfer: BridgeTransfer,
    /// The failure reason, for [`TransferEventKind::Failed`].
    pub reason: Option<String>,
    /// When it happened.
    pub at: DateTime<Utc>,
}
