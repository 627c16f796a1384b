//! Bridge configurations and relayer authorization.
//!
//! A bridge pairs two chains with a set of relayers allowed to carry proofs across it. Relayer
//! authorization exists both per bridge and globally; the global set is what
//! [`BridgeRegistry::is_relayer_authorized`] consults.

pub mod errors;
pub mod registry;

use std::{collections::BTreeSet, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use self::{
    errors::{BridgeError, BridgeResult},
    registry::BridgeRegistry,
};
use crate::types::Metadata;

/// A registered bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bridge {
    /// Unique identifier derived from the chain pair and a creation nonce.
    pub id: String,
    /// Chain assets leave from.
    pub source_chain: String,
    /// Chain assets arrive on.
    pub target_chain: String,
    /// Relayers authorized on this bridge.
    pub relayers: BTreeSet<String>,
    /// Whether the bridge currently accepts traffic.
    pub active: bool,
    /// Arbitrary annotations.
    pub metadata: Metadata,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Time of the last change.
    pub updated_at: DateTime<Utc>,
}

/// Options accepted by [`BridgeRegistry::register_bridge`].
#[derive(Debug, Clone, Default)]
pub struct BridgeOptions {
    pub(crate) metadata: Metadata,
    pub(crate) inactive: bool,
}

impl BridgeOptions {
    /// Adds a metadata entry.
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// Registers the bridge deactivated.
    pub fn inactive(mut self) -> Self {
        self.inactive = true;
        self
    }
}

/// What happened on the bridge registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BridgeEventKind {
    /// A bridge was registered.
    Registered,
    /// A bridge was reactivated.
    Activated,
    /// A bridge was deactivated.
    Deactivated,
    /// A relayer was authorized, globally or on one bridge.
    RelayerAuthorized,
    /// A relayer was revoked everywhere.
    RelayerRevoked,
    /// A metadata entry changed.
    MetadataUpdated,
}

impl fmt::Display for BridgeEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BridgeEventKind::Registered => "registered",
            BridgeEventKind::Activated => "activated",
            BridgeEventKind::Deactivated => "deactivated",
            BridgeEventKind::RelayerAuthorized => "relayer_authorized",
            BridgeEventKind::RelayerRevoked => "relayer_revoked",
            BridgeEventKind::MetadataUpdated => "metadata_updated",
        };
        f.write_str(s)
    }
}

/// A bridge registry event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeEvent {
    /// What happened.
    pub kind: BridgeEventKind,
    /// Snapshot of the affected bridge; `None` for global relayer changes.
    pub bridge: Option<Bridge>,
    /// The relayer involved, if any.
    pub relayer: Option<String>,
    /// When it happened.
    pub at: DateTime<Utc>,
}

/// Direction of a relayer authorization change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelayerAction {
    /// The relayer was named when the bridge was registered. Not counted as an authorization.
    Assigned,
    /// The relayer gained authorization.
    Authorized,
    /// The relayer lost authorization.
    Revoked,
}

/// One entry of the append-only relayer audit ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayerAuditEntry {
    /// The relayer address.
    pub relayer: String,
    /// The bridge the change applied to; `None` for the global set or a global revocation.
    pub bridge_id: Option<String>,
    /// What happened.
    pub action: RelayerAction,
    /// When it happened.
    pub at: DateTime<Utc>,
}

/// Aggregate counters, computed from the current registry contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BridgeMetrics {
    /// Number of registered bridges.
    pub total: usize,
    /// Number of active bridges.
    pub active: usize,
    /// Number of effective relayer authorizations recorded. Relayers named at registration are
    /// not included.
    pub authorized_relay: usize,
    /// Number of effective relayer revocations recorded.
    pub revoked_relay: usize,
}
