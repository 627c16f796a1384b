//! Approval-gated mappings from local contracts to remote counterparts.
//!
//! A link is registered against an open connection and becomes usable once enough distinct
//! approvers from its access policy have signed off on it. Links with a zero approval threshold
//! are usable immediately.
//!
//! ```text
//!   Pending ──quorum──▶ Active ──suspend──▶ Suspended ──resume──▶ Active
//!                         │
//!                         └──report failure──▶ Failed ──resume──▶ Active
//!
//!   any non-retired status ──retire──▶ Retired
//! ```
//!
//! `Retired` is terminal. A retired link frees its local `(chain, address)` pair for a new
//! mapping but stays queryable.

pub mod errors;
pub mod events;
pub mod machine;
pub mod manager;
#[cfg(test)]
mod tests;

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use xchain_primitives::ids::IdHasher;

pub use self::{
    errors::{ContractLinkError, ContractLinkResult},
    events::{ContractLinkEvent, ContractLinkEventKind},
    machine::{ContractLinkSM, LinkCommand},
    manager::ContractLinkManager,
};
use crate::{connection::ChainConnection, types::Metadata};

/// Read-only view of connections, used to refuse links over connections that are not active.
///
/// Implementations must return an owned snapshot and must not hold any lock after returning.
pub trait ConnectionSnapshotSource: Send + Sync + fmt::Debug {
    /// Returns a copy of the connection, if it exists.
    fn get_connection(&self, id: &str) -> Option<ChainConnection>;
}

/// Who may approve a link and how many of them must.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    /// Approvers allowed to sign off. Matched case-insensitively. Empty means anyone.
    pub allowed_approvers: Vec<String>,
    /// Distinct approvals needed before the link activates. Zero activates on registration.
    pub required_approvals: u32,
    /// Opaque privacy classification.
    pub privacy_level: String,
    /// Opaque encryption scheme name.
    pub encryption_scheme: String,
}

/// Everything needed to register a link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractLinkSpec {
    /// Chain the local contract lives on.
    pub local_chain: String,
    /// Address of the local contract.
    pub local_address: String,
    /// Chain the remote contract lives on.
    pub remote_chain: String,
    /// Address of the remote contract.
    pub remote_address: String,
    /// The connection the link runs over.
    pub connection_id: String,
    /// What the link may be used for, e.g. `invoke`.
    pub capabilities: Vec<String>,
    /// Opaque gas profile name.
    pub gas_profile: String,
    /// Arbitrary annotations.
    pub metadata: Metadata,
    /// Approval policy.
    pub access_policy: AccessPolicy,
    /// Where audit records for the link should go.
    pub audit_trail_hint: String,
}

impl ContractLinkSpec {
    /// Returns the canonical form of the spec.
    ///
    /// Strings are trimmed. Chains, addresses, capabilities and approvers are lower-cased, and
    /// the two lists are sorted and de-duplicated. Blank list entries and metadata keys are
    /// dropped.
    pub fn normalized(self) -> Self {
        Self {
            local_chain: normalize_key(&self.local_chain),
            local_address: normalize_key(&self.local_address),
            remote_chain: normalize_key(&self.remote_chain),
            remote_address: normalize_key(&self.remote_address),
            connection_id: self.connection_id.trim().to_string(),
            capabilities: normalize_set(&self.capabilities),
            gas_profile: self.gas_profile.trim().to_string(),
            metadata: normalize_metadata(self.metadata),
            access_policy: AccessPolicy {
                allowed_approvers: normalize_set(&self.access_policy.allowed_approvers),
                required_approvals: self.access_policy.required_approvals,
                privacy_level: self.access_policy.privacy_level.trim().to_string(),
                encryption_scheme: self.access_policy.encryption_scheme.trim().to_string(),
            },
            audit_trail_hint: self.audit_trail_hint.trim().to_string(),
        }
    }

    /// Checks a normalized spec.
    pub(crate) fn validate(&self) -> ContractLinkResult<()> {
        let required = [
            (&self.local_chain, "local chain is required"),
            (&self.local_address, "local address is required"),
            (&self.remote_chain, "remote chain is required"),
            (&self.remote_address, "remote address is required"),
            (&self.connection_id, "connection id is required"),
        ];
        if let Some((_, reason)) = required.iter().find(|(v, _)| v.is_empty()) {
            return Err(ContractLinkError::InvalidSpec(reason));
        }

        let policy = &self.access_policy;
        if policy.required_approvals > 0 {
            if policy.allowed_approvers.is_empty() {
                return Err(ContractLinkError::InvalidSpec(
                    "approvals are required but no approvers are allowed",
                ));
            }
            if policy.required_approvals as usize > policy.allowed_approvers.len() {
                return Err(ContractLinkError::InvalidSpec(
                    "required approvals exceed the number of allowed approvers",
                ));
            }
        }
        Ok(())
    }

    /// The content-addressed identifier of a normalized spec.
    pub(crate) fn derive_id(&self) -> String {
        let policy = &self.access_policy;
        IdHasher::new("contract-link")
            .field(&self.local_chain)
            .field(&self.local_address)
            .field(&self.remote_chain)
            .field(&self.remote_address)
            .field(&self.connection_id)
            .list_field(&self.capabilities)
            .field(&self.gas_profile)
            .map_field(&self.metadata)
            .list_field(&policy.allowed_approvers)
            .field(policy.required_approvals.to_be_bytes())
            .field(&policy.privacy_level)
            .field(&policy.encryption_scheme)
            .field(&self.audit_trail_hint)
            .finish()
    }

    /// The uniqueness key of the local side of the link.
    pub(crate) fn local_key(&self) -> (String, String) {
        (self.local_chain.clone(), self.local_address.clone())
    }
}

/// Trims and lower-cases a chain or address.
fn normalize_key(s: &str) -> String {
    s.trim().to_lowercase()
}

fn normalize_set(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn normalize_metadata(metadata: Metadata) -> Metadata {
    metadata
        .into_iter()
        .filter_map(|(k, v)| {
            let k = k.trim();
            (!k.is_empty()).then(|| (k.to_string(), v))
        })
        .collect()
}

/// Normalizes an approver name for comparison and storage.
pub(crate) fn normalize_approver(approver: &str) -> String {
    approver.trim().to_lowercase()
}

/// Lifecycle status of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractLinkStatus {
    /// Waiting for approvals.
    Pending,
    /// Usable.
    Active,
    /// Paused by an operator.
    Suspended,
    /// Withdrawn for good. Terminal.
    Retired,
    /// A failure was reported; resumable.
    Failed,
}

impl ContractLinkStatus {
    /// Whether no further mutation is permitted.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, ContractLinkStatus::Retired)
    }
}

impl fmt::Display for ContractLinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContractLinkStatus::Pending => "PENDING",
            ContractLinkStatus::Active => "ACTIVE",
            ContractLinkStatus::Suspended => "SUSPENDED",
            ContractLinkStatus::Retired => "RETIRED",
            ContractLinkStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// A failure reported against a link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkFailure {
    /// Machine readable code.
    pub code: String,
    /// Human readable detail.
    pub detail: String,
    /// When it was reported.
    pub occurred_at: DateTime<Utc>,
    /// Whether a later resume cleared it.
    pub resolved: bool,
    /// When it was cleared.
    pub resolved_at: Option<DateTime<Utc>>,
}

/// A mapping from a local contract to a remote one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractLink {
    /// Content hash of the normalized spec.
    pub id: String,
    /// The normalized spec; capabilities, gas profile and metadata change through updates.
    pub spec: ContractLinkSpec,
    /// Current status.
    pub status: ContractLinkStatus,
    /// Reason given for the last suspension or retirement.
    pub status_reason: Option<String>,
    /// Starts at 1 and grows by one with every accepted mutation.
    pub version: u64,
    /// Normalized approver to approval time.
    pub approvals: BTreeMap<String, DateTime<Utc>>,
    /// Approvals needed to activate.
    pub approval_threshold: u32,
    /// Reported failures, oldest first.
    pub failures: Vec<LinkFailure>,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Time of the last change.
    pub updated_at: DateTime<Utc>,
    /// When the link first became active.
    pub activated_at: Option<DateTime<Utc>>,
    /// When the link was last suspended.
    pub suspended_at: Option<DateTime<Utc>>,
    /// When the link was retired.
    pub retired_at: Option<DateTime<Utc>>,
}

/// Changes accepted by [`ContractLinkManager::update`].
///
/// Unset fields are left alone. Metadata entries are merged into the existing map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractLinkUpdate {
    pub(crate) capabilities: Option<Vec<String>>,
    pub(crate) gas_profile: Option<String>,
    pub(crate) metadata: Metadata,
}

impl ContractLinkUpdate {
    /// Replaces the capability set.
    pub fn with_capabilities<S: AsRef<str>>(mut self, capabilities: &[S]) -> Self {
        self.capabilities = Some(
            capabilities
                .iter()
                .map(|c| c.as_ref().to_string())
                .collect(),
        );
        self
    }

    /// Replaces the gas profile. A blank profile is ignored.
    pub fn with_gas_profile(mut self, gas_profile: &str) -> Self {
        self.gas_profile = Some(gas_profile.to_string());
        self
    }

    /// Sets a metadata entry.
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub(crate) fn normalized(self) -> Self {
        Self {
            capabilities: self.capabilities.map(|c| normalize_set(&c)),
            gas_profile: self
                .gas_profile
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty()),
            metadata: normalize_metadata(self.metadata),
        }
    }
}

/// Selects links in [`ContractLinkManager::list`]. Empty fields match anything.
#[derive(Debug, Clone, Default)]
pub struct ContractLinkFilter {
    /// Only these statuses.
    pub statuses: Vec<ContractLinkStatus>,
    /// Only links whose local side is on this chain.
    pub local_chain: Option<String>,
    /// Only links whose remote side is on this chain.
    pub remote_chain: Option<String>,
    /// Only links over this connection.
    pub connection_id: Option<String>,
}

impl ContractLinkFilter {
    pub(crate) fn matches(&self, link: &ContractLink) -> bool {
        let chain_matches = |want: &Option<String>, have: &str| {
            want.as_deref()
                .is_none_or(|w| normalize_key(w) == have)
        };
        (self.statuses.is_empty() || self.statuses.contains(&link.status))
            && chain_matches(&self.local_chain, &link.spec.local_chain)
            && chain_matches(&self.remote_chain, &link.spec.remote_chain)
            && self
                .connection_id
                .as_deref()
                .is_none_or(|c| c.trim() == link.spec.connection_id)
    }
}
