//! Catalogue of named, versioned cross-chain protocol standards that bridges declare
//! conformance to.

use std::{collections::HashMap, fmt, sync::Arc};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use xchain_primitives::{
    clock::{Clock, SystemClock},
    event_bus::{CancelHandle, EventBus},
    ids::{IdHasher, NonceSource},
    subscription::Subscription,
};

use crate::{
    config::ProtocolRegistryConfig,
    errors::{ConfigError, ErrorKind},
    types::{non_empty, Metadata},
};

/// A registered protocol standard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protocol {
    /// Unique identifier.
    pub id: String,
    /// Human readable name, e.g. `IBC-like`.
    pub name: String,
    /// Free-form version label.
    pub version: String,
    /// Whether bridges may currently declare conformance.
    pub active: bool,
    /// Arbitrary annotations.
    pub metadata: Metadata,
    /// Number of effective updates applied since registration.
    pub update_count: u64,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Time of the last change.
    pub updated_at: DateTime<Utc>,
}

/// Options accepted by [`ProtocolRegistry::register_protocol`].
#[derive(Debug, Clone, Default)]
pub struct ProtocolOptions {
    version: Option<String>,
    metadata: Metadata,
    inactive: bool,
}

impl ProtocolOptions {
    /// Sets an explicit version instead of the registry default.
    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    /// Adds a metadata entry.
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// Registers the protocol deactivated.
    pub fn inactive(mut self) -> Self {
        self.inactive = true;
        self
    }
}

/// Changes accepted by [`ProtocolRegistry::update_protocol`].
///
/// Metadata entries are merged into the existing map.
#[derive(Debug, Clone, Default)]
pub struct ProtocolUpdate {
    version: Option<String>,
    metadata: Metadata,
}

impl ProtocolUpdate {
    /// Replaces the version.
    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    /// Sets a metadata entry.
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

/// What happened to a protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolEventKind {
    /// A protocol was registered.
    Registered,
    /// Version or metadata changed.
    Updated,
    /// The protocol was reactivated.
    Activated,
    /// The protocol was deactivated.
    Deactivated,
}

impl fmt::Display for ProtocolEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProtocolEventKind::Registered => "registered",
            ProtocolEventKind::Updated => "updated",
            ProtocolEventKind::Activated => "activated",
            ProtocolEventKind::Deactivated => "deactivated",
        };
        f.write_str(s)
    }
}

/// A protocol lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolEvent {
    /// What happened.
    pub kind: ProtocolEventKind,
    /// Snapshot of the protocol right after the change.
    pub protocol: Protocol,
    /// When it happened.
    pub at: DateTime<Utc>,
}

/// Aggregate counters, computed from the current registry contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProtocolMetrics {
    /// Number of registered protocols.
    pub total: usize,
    /// Number of active protocols.
    pub active: usize,
    /// Sum of effective updates across all protocols.
    pub updates: u64,
}

/// Errors that can occur in the [`ProtocolRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The protocol name is blank.
    #[error("protocol name must not be empty")]
    EmptyName,

    /// No protocol with this id.
    #[error("protocol {0} not found")]
    NotFound(String),
}

impl ProtocolError {
    /// The taxonomy bucket of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::EmptyName => ErrorKind::Validation,
            ProtocolError::NotFound(_) => ErrorKind::NotFound,
        }
    }
}

/// The result type for operations on the [`ProtocolRegistry`].
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// In-memory catalogue of protocols.
#[derive(Debug)]
pub struct ProtocolRegistry {
    config: ProtocolRegistryConfig,
    clock: Arc<dyn Clock>,
    nonces: NonceSource,
    protocols: RwLock<HashMap<String, Protocol>>,
    events: EventBus<ProtocolEvent>,
}

impl ProtocolRegistry {
    /// Creates an empty registry reading time from the system clock.
    pub fn new(config: ProtocolRegistryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            clock: Arc::new(SystemClock),
            nonces: NonceSource::new(),
            protocols: RwLock::new(HashMap::new()),
            events: EventBus::new("protocols"),
        })
    }

    /// Replaces the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Registers a protocol and returns its id.
    pub fn register_protocol(&self, name: &str, opts: ProtocolOptions) -> ProtocolResult<String> {
        let name = non_empty(name).ok_or(ProtocolError::EmptyName)?.to_string();
        let now = self.clock.now();
        let version = opts
            .version
            .as_deref()
            .and_then(non_empty)
            .unwrap_or(&self.config.default_version)
            .to_string();

        let id = IdHasher::new("protocol")
            .field(&name)
            .nonce(self.nonces.next(now))
            .finish();

        let protocol = Protocol {
            id: id.clone(),
            name,
            version,
            active: !opts.inactive,
            metadata: opts.metadata,
            update_count: 0,
            created_at: now,
            updated_at: now,
        };

        self.protocols.write().insert(id.clone(), protocol.clone());
        info!(%id, name = %protocol.name, version = %protocol.version, "protocol registered");

        self.emit(ProtocolEventKind::Registered, protocol, now);
        Ok(id)
    }

    /// Applies `update` to a protocol and returns the resulting snapshot.
    ///
    /// An update that changes nothing emits no event.
    pub fn update_protocol(&self, id: &str, update: ProtocolUpdate) -> ProtocolResult<Protocol> {
        let now = self.clock.now();
        let snapshot = {
            let mut protocols = self.protocols.write();
            let protocol = protocols
                .get_mut(id)
                .ok_or_else(|| ProtocolError::NotFound(id.to_string()))?;

            let mut changed = false;
            if let Some(version) = update.version.as_deref().and_then(non_empty) {
                if protocol.version != version {
                    protocol.version = version.to_string();
                    changed = true;
                }
            }
            for (k, v) in update.metadata {
                if protocol.metadata.get(&k) != Some(&v) {
                    protocol.metadata.insert(k, v);
                    changed = true;
                }
            }

            if !changed {
                debug!(%id, "protocol update changed nothing");
                return Ok(protocol.clone());
            }

            protocol.update_count += 1;
            protocol.updated_at = now;
            protocol.clone()
        };

        info!(%id, version = %snapshot.version, "protocol updated");
        self.emit(ProtocolEventKind::Updated, snapshot.clone(), now);
        Ok(snapshot)
    }

    /// Reactivates a protocol. Activating an active protocol is a no-op.
    pub fn activate_protocol(&self, id: &str) -> ProtocolResult<Protocol> {
        self.set_active(id, true)
    }

    /// Deactivates a protocol. Deactivating an inactive protocol is a no-op.
    pub fn deactivate_protocol(&self, id: &str) -> ProtocolResult<Protocol> {
        self.set_active(id, false)
    }

    fn set_active(&self, id: &str, active: bool) -> ProtocolResult<Protocol> {
        let now = self.clock.now();
        let snapshot = {
            let mut protocols = self.protocols.write();
            let protocol = protocols
                .get_mut(id)
                .ok_or_else(|| ProtocolError::NotFound(id.to_string()))?;
            if protocol.active == active {
                return Ok(protocol.clone());
            }
            protocol.active = active;
            protocol.updated_at = now;
            protocol.clone()
        };

        let kind = if active {
            ProtocolEventKind::Activated
        } else {
            ProtocolEventKind::Deactivated
        };
        info!(%id, %kind, "protocol status changed");
        self.emit(kind, snapshot.clone(), now);
        Ok(snapshot)
    }

    /// Returns a copy of a protocol.
    pub fn get_protocol(&self, id: &str) -> Option<Protocol> {
        self.protocols.read().get(id).cloned()
    }

    /// Returns copies of every protocol sorted by creation time, then id.
    pub fn list_protocols(&self) -> Vec<Protocol> {
        let mut out: Vec<Protocol> = self.protocols.read().values().cloned().collect();
        out.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        out
    }

    /// Computes the aggregate counters from current state.
    pub fn metrics(&self) -> ProtocolMetrics {
        let protocols = self.protocols.read();
        ProtocolMetrics {
            total: protocols.len(),
            active: protocols.values().filter(|p| p.active).count(),
            updates: protocols.values().map(|p| p.update_count).sum(),
        }
    }

    /// Registers a callback invoked for every event.
    pub fn register_listener<F>(&self, listener: F) -> CancelHandle
    where
        F: Fn(&ProtocolEvent) + Send + Sync + 'static,
    {
        self.events.register_listener(listener)
    }

    /// Subscribes to protocol events with a queue of `buffer` entries.
    pub fn subscribe(&self, buffer: usize) -> (Subscription<ProtocolEvent>, CancelHandle) {
        self.events.subscribe(buffer)
    }

    fn emit(&self, kind: ProtocolEventKind, protocol: Protocol, at: DateTime<Utc>) {
        self.events.publish(ProtocolEvent { kind, protocol, at });
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::testing::fixtures::step_clock;

    fn registry() -> ProtocolRegistry {
        ProtocolRegistry::new(ProtocolRegistryConfig::default())
            .expect("default config is valid")
            .with_clock(step_clock())
    }

    #[test]
    fn register_defaults() {
        let reg = registry();
        let id = reg
            .register_protocol("IBC-like", ProtocolOptions::default())
            .unwrap();

        let p = reg.get_protocol(&id).unwrap();
        assert_eq!(p.name, "IBC-like");
        assert_eq!(p.version, "v1");
        assert!(p.active);
        assert_eq!(p.update_count, 0);
    }

    #[test]
    fn register_with_options() {
        let reg = registry();
        let id = reg
            .register_protocol(
                "xcmp",
                ProtocolOptions::default()
                    .with_version("v3")
                    .with_metadata("owner", "ops")
                    .inactive(),
            )
            .unwrap();

        let p = reg.get_protocol(&id).unwrap();
        assert_eq!(p.version, "v3");
        assert_eq!(p.metadata.get("owner").map(String::as_str), Some("ops"));
        assert!(!p.active);
    }

    #[test]
    fn empty_name_is_rejected() {
        let reg = registry();
        let err = reg
            .register_protocol("   ", ProtocolOptions::default())
            .unwrap_err();
        assert_eq!(err, ProtocolError::EmptyName);
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(reg.metrics().total, 0);
    }

    #[test]
    fn same_name_twice_gets_two_ids() {
        let reg = registry();
        let a = reg
            .register_protocol("ibc", ProtocolOptions::default())
            .unwrap();
        let b = reg
            .register_protocol("ibc", ProtocolOptions::default())
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(reg.list_protocols().len(), 2);
    }

    #[test]
    fn update_merges_and_counts() {
        let reg = registry();
        let id = reg
            .register_protocol("ibc", ProtocolOptions::default().with_metadata("a", "1"))
            .unwrap();

        let p = reg
            .update_protocol(
                &id,
                ProtocolUpdate::default()
                    .with_version("v2")
                    .with_metadata("b", "2"),
            )
            .unwrap();
        assert_eq!(p.version, "v2");
        assert_eq!(p.metadata.len(), 2);
        assert_eq!(p.update_count, 1);

        // no change, no count
        let p = reg
            .update_protocol(&id, ProtocolUpdate::default().with_metadata("a", "1"))
            .unwrap();
        assert_eq!(p.update_count, 1);

        assert_eq!(reg.metrics().updates, 1);
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let reg = registry();
        assert_eq!(
            reg.update_protocol("nope", ProtocolUpdate::default())
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
        assert!(reg.activate_protocol("nope").is_err());
        assert!(reg.deactivate_protocol("nope").is_err());
        assert!(reg.get_protocol("nope").is_none());
    }

    #[test]
    fn lifecycle_events_and_metrics() {
        let reg = registry();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _listener = reg.register_listener(move |ev| sink.lock().push(ev.kind));

        let id = reg
            .register_protocol("ibc", ProtocolOptions::default())
            .unwrap();
        reg.deactivate_protocol(&id).unwrap();
        reg.deactivate_protocol(&id).unwrap();
        assert_eq!(reg.metrics().active, 0);
        reg.activate_protocol(&id).unwrap();
        reg.update_protocol(&id, ProtocolUpdate::default().with_version("v9"))
            .unwrap();

        assert_eq!(
            *seen.lock(),
            vec![
                ProtocolEventKind::Registered,
                ProtocolEventKind::Deactivated,
                ProtocolEventKind::Activated,
                ProtocolEventKind::Updated,
            ]
        );
        assert_eq!(
            reg.metrics(),
            ProtocolMetrics {
                total: 1,
                active: 1,
                updates: 1
            }
        );
    }

    #[test]
    fn snapshots_are_isolated() {
        let reg = registry();
        let id = reg
            .register_protocol("ibc", ProtocolOptions::default())
            .unwrap();

        let mut p = reg.get_protocol(&id).unwrap();
        p.metadata.insert("x".into(), "y".into());
        p.active = false;

        let again = reg.get_protocol(&id).unwrap();
        assert!(again.metadata.is_empty());
        assert!(again.active);
    }

    #[test]
    fn list_is_sorted_by_creation() {
        let reg = registry();
        let a = reg.register_protocol("a", ProtocolOptions::default()).unwrap();
        let b = reg.register_protocol("b", ProtocolOptions::default()).unwrap();
        let c = reg.register_protocol("c", ProtocolOptions::default()).unwrap();

        let ids: Vec<_> = reg.list_protocols().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![a, b, c]);
    }
}
