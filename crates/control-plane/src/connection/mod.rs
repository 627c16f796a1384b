//! Authenticated logical connections to remote chains.
//!
//! A connection is opened by a signed handshake: the remote side's signer signs a handshake
//! payload and the injected [`SignatureVerifier`](xchain_primitives::verifier::SignatureVerifier)
//! must accept that proof before the connection is stored. From then on the connection is
//! driven by [`ConnectionSM`]:
//!
//! ```text
//!   Active ──close──▶ Closing ──▶ Closed
//!     │
//!     └──fail──▶ Failed
//! ```
//!
//! `Closed` and `Failed` are terminal. There is no automatic recovery; operators open a new
//! connection instead.

pub mod errors;
pub mod events;
pub mod id;
pub mod machine;
pub mod manager;
#[cfg(test)]
mod tests;

use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use self::{
    errors::{ConnectionError, ConnectionResult},
    events::{ConnectionEvent, ConnectionEventKind},
    id::{ConnectionIdGenerator, ContentAddressedIdGenerator, IdGenerationError},
    machine::{ConnectionCommand, ConnectionSM},
    manager::ConnectionManager,
};
use crate::types::Metadata;

/// Everything needed to open a connection. Immutable once accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSpec {
    /// The chain this node runs on.
    pub local_chain: String,
    /// The chain being connected to.
    pub remote_chain: String,
    /// Endpoint the remote side reaches this node at.
    pub local_endpoint: String,
    /// Endpoint of the remote side.
    pub remote_endpoint: String,
    /// Opaque governance profile name.
    pub governance_profile: String,
    /// Opaque gas profile name.
    pub gas_profile: String,
    /// Arbitrary annotations.
    pub metadata: Metadata,
    /// Expected heartbeat cadence; the manager default applies when unset.
    pub heartbeat_interval: Option<Duration>,
    /// Identifier of the key that signed the handshake.
    pub signer: String,
    /// The signed handshake bytes.
    pub handshake_payload: Vec<u8>,
    /// Signature over [`Self::handshake_payload`].
    pub handshake_proof: Vec<u8>,
}

impl ConnectionSpec {
    /// Trims every string field.
    pub(crate) fn normalized(mut self) -> Self {
        for field in [
            &mut self.local_chain,
            &mut self.remote_chain,
            &mut self.local_endpoint,
            &mut self.remote_endpoint,
            &mut self.governance_profile,
            &mut self.gas_profile,
            &mut self.signer,
        ] {
            let trimmed = field.trim();
            if trimmed.len() != field.len() {
                *field = trimmed.to_string();
            }
        }
        self
    }

    /// Checks that every required field is present.
    pub(crate) fn validate(&self) -> ConnectionResult<()> {
        let required = [
            (&self.local_chain, "local chain"),
            (&self.remote_chain, "remote chain"),
            (&self.local_endpoint, "local endpoint"),
            (&self.remote_endpoint, "remote endpoint"),
            (&self.signer, "signer"),
        ];
        if let Some((_, field)) = required.iter().find(|(v, _)| v.trim().is_empty()) {
            return Err(ConnectionError::InvalidSpec(*field));
        }
        if self.handshake_payload.is_empty() {
            return Err(ConnectionError::InvalidSpec("handshake payload"));
        }
        if self.handshake_proof.is_empty() {
            return Err(ConnectionError::InvalidSpec("handshake proof"));
        }
        if self.heartbeat_interval.is_some_and(|d| d.is_zero()) {
            return Err(ConnectionError::InvalidSpec("heartbeat interval"));
        }
        Ok(())
    }
}

/// Lifecycle status of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// Handshake verified; heartbeats expected.
    Active,
    /// Close requested, draining.
    Closing,
    /// Fully closed. Terminal.
    Closed,
    /// Failed by a fault. Terminal.
    Failed,
}

impl ConnectionStatus {
    /// Whether no further mutation is permitted.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, ConnectionStatus::Closed | ConnectionStatus::Failed)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Active => "ACTIVE",
            ConnectionStatus::Closing => "CLOSING",
            ConnectionStatus::Closed => "CLOSED",
            ConnectionStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// How bad a fault is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultSeverity {
    /// Informational.
    Info,
    /// Degraded but usable.
    #[default]
    Warning,
    /// Unusable.
    Critical,
}

impl fmt::Display for FaultSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FaultSeverity::Info => "info",
            FaultSeverity::Warning => "warning",
            FaultSeverity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// A fault as reported by a caller of
/// [`ConnectionManager::fail_connection`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultReport {
    /// Machine readable code, e.g. `RELAYER_DOWN`. Must not be empty.
    pub code: String,
    /// Human readable detail.
    pub detail: String,
    /// Severity.
    pub severity: FaultSeverity,
    /// When the fault occurred; the manager clock is used when unset.
    pub occurred_at: Option<DateTime<Utc>>,
}

impl FaultReport {
    /// Creates a report that occurred "now".
    pub fn new(code: &str, detail: &str, severity: FaultSeverity) -> Self {
        Self {
            code: code.to_string(),
            detail: detail.to_string(),
            severity,
            occurred_at: None,
        }
    }
}

/// A fault recorded against a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionFault {
    /// Machine readable code.
    pub code: String,
    /// Human readable detail.
    pub detail: String,
    /// Severity.
    pub severity: FaultSeverity,
    /// When it occurred.
    pub occurred_at: DateTime<Utc>,
    /// Whether the fault has since been recovered from.
    pub recovered: bool,
}

/// A logical connection between two chains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConnection {
    /// Deterministic identifier derived from the spec.
    pub id: String,
    /// The spec the connection was opened with.
    pub spec: ConnectionSpec,
    /// Current status.
    pub status: ConnectionStatus,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// Time of the last change.
    pub updated_at: DateTime<Utc>,
    /// When the handshake was accepted.
    pub opened_at: DateTime<Utc>,
    /// When the connection reached a terminal status.
    pub closed_at: Option<DateTime<Utc>>,
    /// Reason supplied to the close call, if any.
    pub closing_reason: Option<String>,
    /// Last recorded heartbeat.
    pub last_heartbeat: DateTime<Utc>,
    /// Effective heartbeat cadence.
    pub heartbeat_interval: Duration,
    /// Faults in the order they were recorded.
    pub faults: Vec<ConnectionFault>,
}

/// Selects connections in [`ConnectionManager::list_connections`].
///
/// Unless [`Self::include_ended`] is set, `Closed` and `Failed` connections are omitted even if
/// their status is listed in [`Self::statuses`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionFilter {
    /// Only these statuses; empty means any.
    pub statuses: Vec<ConnectionStatus>,
    /// Only connections from this local chain.
    pub local_chain: Option<String>,
    /// Only connections to this remote chain.
    pub remote_chain: Option<String>,
    /// Also return terminal connections.
    pub include_ended: bool,
}

impl ConnectionFilter {
    /// A filter returning every connection, terminal or not.
    pub fn all() -> Self {
        Self {
            include_ended: true,
            ..Default::default()
        }
    }

    pub(crate) fn matches(&self, conn: &ChainConnection) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&conn.status) {
            return false;
        }
        if !self.include_ended && conn.status.is_terminal() {
            return false;
        }
        if self
            .local_chain
            .as_deref()
            .is_some_and(|c| c != conn.spec.local_chain)
        {
            return false;
        }
        if self
            .remote_chain
            .as_deref()
            .is_some_and(|c| c != conn.spec.remote_chain)
        {
            return false;
        }
        true
    }
}
