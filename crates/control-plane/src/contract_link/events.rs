//! Lifecycle events published by the contract link manager.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ContractLink, ContractLinkStatus};

/// What happened to a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractLinkEventKind {
    /// The link was registered.
    Registered,
    /// An approval was recorded.
    ApprovalRecorded,
    /// The approval quorum was reached. Always follows the `ApprovalRecorded` that reached it.
    Activated,
    /// Capabilities, gas profile or metadata changed.
    Updated,
    /// The link was suspended.
    Suspended,
    /// The link became active again after a suspension or failure.
    Resumed,
    /// The link was retired.
    Retired,
    /// A failure was reported.
    FailureReported,
}

impl fmt::Display for ContractLinkEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContractLinkEventKind::Registered => "REGISTERED",
            ContractLinkEventKind::ApprovalRecorded => "APPROVAL_RECORDED",
            ContractLinkEventKind::Activated => "ACTIVATED",
            ContractLinkEventKind::Updated => "UPDATED",
            ContractLinkEventKind::Suspended => "SUSPENDED",
            ContractLinkEventKind::Resumed => "RESUMED",
            ContractLinkEventKind::Retired => "RETIRED",
            ContractLinkEventKind::FailureReported => "FAILURE_REPORTED",
        };
        f.write_str(s)
    }
}

/// A contract link lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractLinkEvent {
    /// What happened.
    pub kind: ContractLinkEventKind,
    /// The link id.
    pub link_id: String,
    /// Status right after the change.
    pub status: ContractLinkStatus,
    /// Snapshot of the link right after the change.
    pub link: ContractLink,
    /// When it happened.
    pub at: DateTime<Utc>,
}

impl ContractLinkEvent {
    pub(crate) fn snapshot(
        kind: ContractLinkEventKind,
        link: &ContractLink,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            link_id: link.id.clone(),
            status: link.status,
            link: link.clone(),
            at,
        }
    }
}
