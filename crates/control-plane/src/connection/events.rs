//! Lifecycle events published by the connection manager.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ChainConnection, ConnectionFault, ConnectionStatus};

/// What happened to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionEventKind {
    /// The handshake was accepted.
    Opened,
    /// A heartbeat was recorded.
    Heartbeat,
    /// A close was requested.
    Closing,
    /// The connection is fully closed.
    Closed,
    /// The connection failed.
    Failed,
}

impl fmt::Display for ConnectionEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionEventKind::Opened => "OPENED",
            ConnectionEventKind::Heartbeat => "HEARTBEAT",
            ConnectionEventKind::Closing => "CLOSING",
            ConnectionEventKind::Closed => "CLOSED",
            ConnectionEventKind::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// A connection lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEvent {
    /// What happened.
    pub kind: ConnectionEventKind,
    /// The connection id.
    pub connection_id: String,
    /// Status right after the change.
    pub status: ConnectionStatus,
    /// Snapshot of the connection right after the change.
    pub connection: ChainConnection,
    /// The fault that caused a failure, for [`ConnectionEventKind::Failed`].
    pub fault: Option<ConnectionFault>,
    /// When it happened.
    pub at: DateTime<Utc>,
}

impl ConnectionEvent {
    pub(crate) fn snapshot(
        kind: ConnectionEventKind,
        connection: &ChainConnection,
        fault: Option<ConnectionFault>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            connection_id: connection.id.clone(),
            status: connection.status,
            connection: connection.clone(),
            fault,
            at,
        }
    }
}
