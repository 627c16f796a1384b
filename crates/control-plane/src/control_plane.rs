//! Wires every manager into a single control plane.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use xchain_primitives::{
    clock::{Clock, SystemClock},
    verifier::SignatureVerifier,
};

use crate::{
    bridge::BridgeRegistry,
    config::ControlPlaneConfig,
    connection::{ChainConnection, ConnectionManager},
    contract_link::{ConnectionSnapshotSource, ContractLinkManager},
    errors::ConfigError,
    protocol::ProtocolRegistry,
    transaction::TransactionManager,
    transfer::{BridgeTransfer, BridgeTransferManager},
};

impl ConnectionSnapshotSource for ConnectionManager {
    fn get_connection(&self, id: &str) -> Option<ChainConnection> {
        ConnectionManager::get_connection(self, id)
    }
}

/// What a single [`ControlPlane::run_maintenance`] pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    /// Connections failed for missing heartbeats.
    pub stale_connections: Vec<ChainConnection>,
    /// Transfers expired because nobody claimed them in time.
    pub expired_transfers: Vec<BridgeTransfer>,
}

impl MaintenanceReport {
    /// Whether the pass changed nothing.
    pub fn is_empty(&self) -> bool {
        self.stale_connections.is_empty() && self.expired_transfers.is_empty()
    }
}

/// Every manager of the control plane, sharing one clock.
///
/// The contract link manager reads connection status from the connection manager owned here,
/// so links can only be registered over connections that are currently active.
#[derive(Debug)]
pub struct ControlPlane {
    protocols: ProtocolRegistry,
    bridges: BridgeRegistry,
    connections: Arc<ConnectionManager>,
    contract_links: ContractLinkManager,
    transfers: BridgeTransferManager,
    transactions: TransactionManager,
}

impl ControlPlane {
    /// Builds every manager from `config`, verifying connection handshakes with `verifier`.
    pub fn new(
        config: ControlPlaneConfig,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Result<Self, ConfigError> {
        Self::new_with_clock(config, verifier, Arc::new(SystemClock))
    }

    /// Same as [`ControlPlane::new`] with every manager reading time from `clock`.
    pub fn new_with_clock(
        config: ControlPlaneConfig,
        verifier: Arc<dyn SignatureVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let connections = Arc::new(
            ConnectionManager::new(config.connections, verifier)?.with_clock(clock.clone()),
        );
        let snapshots: Arc<dyn ConnectionSnapshotSource> = connections.clone();

        Ok(Self {
            protocols: ProtocolRegistry::new(config.protocols)?.with_clock(clock.clone()),
            bridges: BridgeRegistry::new().with_clock(clock.clone()),
            contract_links: ContractLinkManager::new(config.contract_links, Some(snapshots))?
                .with_clock(clock.clone()),
            transfers: BridgeTransferManager::new(config.transfers)?.with_clock(clock.clone()),
            transactions: TransactionManager::new().with_clock(clock),
            connections,
        })
    }

    /// The protocol registry.
    pub const fn protocols(&self) -> &ProtocolRegistry {
        &self.protocols
    }

    /// The bridge registry.
    pub const fn bridges(&self) -> &BridgeRegistry {
        &self.bridges
    }

    /// The connection manager.
    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// The contract link manager.
    pub const fn contract_links(&self) -> &ContractLinkManager {
        &self.contract_links
    }

    /// The transfer manager.
    pub const fn transfers(&self) -> &BridgeTransferManager {
        &self.transfers
    }

    /// The transaction journal.
    pub const fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    /// Fails connections that stopped sending heartbeats and expires overdue transfers, both
    /// as of `now`.
    pub fn run_maintenance(&self, now: DateTime<Utc>) -> MaintenanceReport {
        let report = MaintenanceReport {
            stale_connections: self.connections.expire_stale_connections(now),
            expired_transfers: self.transfers.sweep_expired(now),
        };

        if report.is_empty() {
            return report;
        }
        for conn in &report.stale_connections {
            warn!(id = %conn.id, remote = %conn.spec.remote_chain, "stale connection failed");
        }
        info!(
            stale = report.stale_connections.len(),
            expired = report.expired_transfers.len(),
            %now,
            "maintenance pass finished"
        );
        report
    }
}
