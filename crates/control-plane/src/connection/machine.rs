//! The Connection State Machine.
//!
//! Owns a single [`ChainConnection`] record and enforces its transition table. Timestamps are
//! supplied by the caller so that processing is fully deterministic.

use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    ChainConnection, ConnectionError, ConnectionEvent, ConnectionEventKind, ConnectionFault,
    ConnectionSpec, ConnectionStatus,
};
use crate::state_machine::{SMOutput, StateMachine};

/// Inputs accepted by [`ConnectionSM`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionCommand {
    /// Record a heartbeat observed at `at`.
    Heartbeat {
        /// Observation time.
        at: DateTime<Utc>,
    },
    /// Close the connection.
    Close {
        /// Operator supplied reason; may be empty.
        reason: String,
        /// Time of the request.
        at: DateTime<Utc>,
    },
    /// Fail the connection with a fault.
    Fail {
        /// The fault to record.
        fault: ConnectionFault,
    },
}

impl fmt::Display for ConnectionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionCommand::Heartbeat { at } => write!(f, "Heartbeat at {at}"),
            ConnectionCommand::Close { reason, .. } => write!(f, "Close ({reason})"),
            ConnectionCommand::Fail { fault } => write!(f, "Fail with {}", fault.code),
        }
    }
}

/// The state machine tracking one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSM {
    connection: ChainConnection,
}

impl ConnectionSM {
    /// Creates an `Active` connection whose handshake has already been verified, along with
    /// the `Opened` notification.
    pub fn open(
        id: String,
        spec: ConnectionSpec,
        heartbeat_interval: Duration,
        at: DateTime<Utc>,
    ) -> (Self, ConnectionEvent) {
        let connection = ChainConnection {
            id,
            spec,
            status: ConnectionStatus::Active,
            created_at: at,
            updated_at: at,
            opened_at: at,
            closed_at: None,
            closing_reason: None,
            last_heartbeat: at,
            heartbeat_interval,
            faults: Vec::new(),
        };
        let opened = ConnectionEvent::snapshot(ConnectionEventKind::Opened, &connection, None, at);
        (Self { connection }, opened)
    }

    /// Wraps an existing record.
    pub const fn from_connection(connection: ChainConnection) -> Self {
        Self { connection }
    }

    /// The current status.
    pub const fn state(&self) -> ConnectionStatus {
        self.connection.status
    }

    /// The connection record.
    pub const fn connection(&self) -> &ChainConnection {
        &self.connection
    }

    /// Whether the connection missed more than `tolerance` heartbeat intervals as of `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, tolerance: u32) -> bool {
        if self.connection.status != ConnectionStatus::Active {
            return false;
        }
        let Some(window) = self.connection.heartbeat_interval.checked_mul(tolerance) else {
            return false;
        };
        let Ok(window) = chrono::TimeDelta::from_std(window) else {
            return false;
        };
        self.connection
            .last_heartbeat
            .checked_add_signed(window)
            .is_some_and(|deadline| deadline < now)
    }

    fn reject_terminal(&self) -> Result<(), ConnectionError> {
        if self.connection.status.is_terminal() {
            return Err(ConnectionError::Closed {
                id: self.connection.id.clone(),
                status: self.connection.status,
            });
        }
        Ok(())
    }

    fn process_heartbeat(
        &mut self,
        at: DateTime<Utc>,
    ) -> Result<SMOutput<ConnectionEvent>, ConnectionError> {
        if self.connection.status != ConnectionStatus::Active {
            return Err(ConnectionError::InvalidTransition {
                id: self.connection.id.clone(),
                state: self.connection.status,
                reason: "heartbeats are only accepted while active".to_string(),
            });
        }

        self.connection.last_heartbeat = at;
        self.connection.updated_at = at;

        Ok(SMOutput::with_notifications(vec![
            ConnectionEvent::snapshot(ConnectionEventKind::Heartbeat, &self.connection, None, at),
        ]))
    }

    fn process_close(
        &mut self,
        reason: String,
        at: DateTime<Utc>,
    ) -> Result<SMOutput<ConnectionEvent>, ConnectionError> {
        let mut output = SMOutput::new();
        let reason = reason.trim();

        if self.connection.status == ConnectionStatus::Active {
            self.connection.status = ConnectionStatus::Closing;
            self.connection.updated_at = at;
            if !reason.is_empty() {
                self.connection.closing_reason = Some(reason.to_string());
            }
            output.push(ConnectionEvent::snapshot(
                ConnectionEventKind::Closing,
                &self.connection,
                None,
                at,
            ));
        }

        // Closing drains synchronously; nothing is in flight inside the control plane.
        self.connection.status = ConnectionStatus::Closed;
        self.connection.closed_at = Some(at);
        self.connection.updated_at = at;
        output.push(ConnectionEvent::snapshot(
            ConnectionEventKind::Closed,
            &self.connection,
            None,
            at,
        ));

        Ok(output)
    }

    fn process_fail(
        &mut self,
        fault: ConnectionFault,
    ) -> Result<SMOutput<ConnectionEvent>, ConnectionError> {
        let at = fault.occurred_at;
        self.connection.faults.push(fault.clone());
        self.connection.status = ConnectionStatus::Failed;
        self.connection.closed_at = Some(at);
        self.connection.updated_at = at;

        Ok(SMOutput::with_notifications(vec![
            ConnectionEvent::snapshot(
                ConnectionEventKind::Failed,
                &self.connection,
                Some(fault),
                at,
            ),
        ]))
    }
}

impl StateMachine for ConnectionSM {
    type Event = ConnectionCommand;
    type Notification = ConnectionEvent;
    type Error = ConnectionError;

    fn process_event(
        &mut self,
        event: Self::Event,
    ) -> Result<SMOutput<Self::Notification>, Self::Error> {
        self.reject_terminal()?;

        match event {
            ConnectionCommand::Heartbeat { at } => self.process_heartbeat(at),
            ConnectionCommand::Close { reason, at } => self.process_close(reason, at),
            ConnectionCommand::Fail { fault } => self.process_fail(fault),
        }
    }
}
