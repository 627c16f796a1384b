//! The connection manager.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use xchain_primitives::{
    clock::{Clock, SystemClock},
    event_bus::{CancelHandle, EventBus},
    subscription::Subscription,
    verifier::SignatureVerifier,
};

use super::{
    ChainConnection, ConnectionCommand, ConnectionError, ConnectionEvent, ConnectionFault,
    ConnectionFilter, ConnectionIdGenerator, ConnectionResult, ConnectionSM, ConnectionSpec,
    ContentAddressedIdGenerator, FaultReport, FaultSeverity,
};
use crate::{
    config::ConnectionManagerConfig, constants::HEARTBEAT_TIMEOUT_FAULT_CODE, errors::ConfigError,
    state_machine::StateMachine, types::non_empty,
};

/// Opens, tracks and closes connections to remote chains.
#[derive(Debug)]
pub struct ConnectionManager {
    config: ConnectionManagerConfig,
    verifier: Arc<dyn SignatureVerifier>,
    id_generator: Arc<dyn ConnectionIdGenerator>,
    clock: Arc<dyn Clock>,
    connections: RwLock<HashMap<String, ConnectionSM>>,
    events: EventBus<ConnectionEvent>,
}

impl ConnectionManager {
    /// Creates a manager verifying handshakes with `verifier`.
    ///
    /// Ids default to [`ContentAddressedIdGenerator`] and time to the system clock.
    pub fn new(
        config: ConnectionManagerConfig,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            verifier,
            id_generator: Arc::new(ContentAddressedIdGenerator),
            clock: Arc::new(SystemClock),
            connections: RwLock::new(HashMap::new()),
            events: EventBus::new("connections"),
        })
    }

    /// Replaces the id generator.
    pub fn with_id_generator(mut self, id_generator: Arc<dyn ConnectionIdGenerator>) -> Self {
        self.id_generator = id_generator;
        self
    }

    /// Replaces the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Verifies the handshake in `spec` and stores a new `Active` connection.
    ///
    /// Cancellation is observed before and during signature verification only. Once the
    /// connection is being stored the call runs to completion.
    pub async fn open_connection(
        &self,
        cancel: &CancellationToken,
        spec: ConnectionSpec,
    ) -> ConnectionResult<ChainConnection> {
        if cancel.is_cancelled() {
            return Err(ConnectionError::Cancelled);
        }

        let spec = spec.normalized();
        spec.validate()?;

        let verified = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ConnectionError::Cancelled),
            res = self.verifier.verify(
                &spec.handshake_payload,
                &spec.handshake_proof,
                &spec.signer,
            ) => res.map_err(ConnectionError::from),
        };
        if let Err(e) = verified {
            warn!(
                local = %spec.local_chain,
                remote = %spec.remote_chain,
                signer = %spec.signer,
                %e,
                "handshake not accepted"
            );
            return Err(e);
        }

        let id = self.id_generator.new_id(&spec)?;
        if id.trim().is_empty() {
            return Err(ConnectionError::IdGeneration(super::IdGenerationError(
                "generator returned an empty id".to_string(),
            )));
        }

        let interval = spec
            .heartbeat_interval
            .unwrap_or(self.config.default_heartbeat_interval);
        let now = self.clock.now();

        let (snapshot, opened) = {
            trace!(%id, "acquiring connection write lock");
            let mut connections = self.connections.write();
            if connections.contains_key(&id) {
                return Err(ConnectionError::Exists(id));
            }
            let (sm, opened) = ConnectionSM::open(id.clone(), spec, interval, now);
            let snapshot = sm.connection().clone();
            connections.insert(id.clone(), sm);
            (snapshot, opened)
        };

        info!(
            %id,
            local = %snapshot.spec.local_chain,
            remote = %snapshot.spec.remote_chain,
            "connection opened"
        );
        self.events.publish(opened);
        Ok(snapshot)
    }

    /// Closes a connection, moving it through `Closing` to `Closed`.
    ///
    /// Both steps emit an event. Fails with [`ConnectionError::Closed`] if the connection is
    /// already terminal.
    pub async fn close_connection(
        &self,
        cancel: &CancellationToken,
        id: &str,
        reason: &str,
    ) -> ConnectionResult<ChainConnection> {
        if cancel.is_cancelled() {
            return Err(ConnectionError::Cancelled);
        }
        let now = self.clock.now();
        let snapshot = self.apply(
            id,
            ConnectionCommand::Close {
                reason: reason.to_string(),
                at: now,
            },
        )?;
        info!(%id, %reason, "connection closed");
        Ok(snapshot)
    }

    /// Records `fault` and fails the connection.
    pub fn fail_connection(
        &self,
        id: &str,
        fault: FaultReport,
    ) -> ConnectionResult<ChainConnection> {
        let code =
            non_empty(&fault.code).ok_or(ConnectionError::InvalidFault("code is required"))?;
        let fault = ConnectionFault {
            code: code.to_string(),
            detail: fault.detail,
            severity: fault.severity,
            occurred_at: fault.occurred_at.unwrap_or_else(|| self.clock.now()),
            recovered: false,
        };
        let code = fault.code.clone();
        let severity = fault.severity;

        let snapshot = self.apply(id, ConnectionCommand::Fail { fault })?;
        warn!(%id, %code, %severity, "connection failed");
        Ok(snapshot)
    }

    /// Records a heartbeat at `at`, or now if `None`.
    pub fn mark_heartbeat(
        &self,
        id: &str,
        at: Option<DateTime<Utc>>,
    ) -> ConnectionResult<ChainConnection> {
        let at = at.unwrap_or_else(|| self.clock.now());
        let snapshot = self.apply(id, ConnectionCommand::Heartbeat { at })?;
        trace!(%id, %at, "heartbeat recorded");
        Ok(snapshot)
    }

    /// Fails every active connection that missed more heartbeats than the configured
    /// tolerance as of `now`, and returns exactly the connections failed by this call.
    pub fn expire_stale_connections(&self, now: DateTime<Utc>) -> Vec<ChainConnection> {
        let tolerance = self.config.missed_heartbeat_tolerance;
        let mut failed = Vec::new();
        let mut notifications = Vec::new();

        {
            let mut connections = self.connections.write();
            for (id, sm) in connections.iter_mut() {
                if !sm.is_stale(now, tolerance) {
                    continue;
                }
                let fault = ConnectionFault {
                    code: HEARTBEAT_TIMEOUT_FAULT_CODE.to_string(),
                    detail: format!(
                        "no heartbeat since {}, interval {:?}",
                        sm.connection().last_heartbeat,
                        sm.connection().heartbeat_interval
                    ),
                    severity: FaultSeverity::Critical,
                    occurred_at: now,
                    recovered: false,
                };
                match sm.process_event(ConnectionCommand::Fail { fault }) {
                    Ok(output) => {
                        warn!(%id, "connection missed heartbeats, failing");
                        notifications.extend(output.notifications);
                        failed.push(sm.connection().clone());
                    }
                    Err(e) => debug!(%id, %e, "stale connection could not be failed"),
                }
            }
        }

        failed.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        notifications.sort_by(|a, b| {
            (a.connection.created_at, &a.connection_id)
                .cmp(&(b.connection.created_at, &b.connection_id))
        });
        self.events.publish_all(notifications);
        failed
    }

    /// Returns a copy of a connection.
    pub fn get_connection(&self, id: &str) -> Option<ChainConnection> {
        self.connections
            .read()
            .get(id)
            .map(|sm| sm.connection().clone())
    }

    /// Returns copies of the connections matching `filter`, sorted by creation time, then id.
    pub fn list_connections(&self, filter: &ConnectionFilter) -> Vec<ChainConnection> {
        let mut out: Vec<ChainConnection> = self
            .connections
            .read()
            .values()
            .map(ConnectionSM::connection)
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        out
    }

    /// Subscribes to connection events with a queue of `buffer` entries.
    ///
    /// Events that do not fit are dropped for this subscriber; the producer never blocks.
    pub fn subscribe(&self, buffer: usize) -> (Subscription<ConnectionEvent>, CancelHandle) {
        self.events.subscribe(buffer)
    }

    /// Registers a callback invoked for every event.
    pub fn register_listener<F>(&self, listener: F) -> CancelHandle
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        self.events.register_listener(listener)
    }

    /// Runs `command` through the connection's state machine under the write lock and
    /// publishes the resulting notifications after releasing it.
    fn apply(&self, id: &str, command: ConnectionCommand) -> ConnectionResult<ChainConnection> {
        let (snapshot, output) = {
            let mut connections = self.connections.write();
            let sm = connections
                .get_mut(id)
                .ok_or_else(|| ConnectionError::NotFound(id.to_string()))?;
            debug!(%id, state = %sm.state(), %command, "processing connection command");
            let output = sm.process_event(command)?;
            (sm.connection().clone(), output)
        };

        self.events.publish_all(output.notifications);
        Ok(snapshot)
    }
}
