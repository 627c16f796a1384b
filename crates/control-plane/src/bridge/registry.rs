//! The in-memory bridge registry.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info, trace};
use xchain_primitives::{
    clock::{Clock, SystemClock},
    event_bus::{CancelHandle, EventBus},
    ids::{IdHasher, NonceSource},
    subscription::Subscription,
};

use super::{
    Bridge, BridgeError, BridgeEvent, BridgeEventKind, BridgeMetrics, BridgeOptions,
    BridgeResult, RelayerAction, RelayerAuditEntry,
};
use crate::types::non_empty;

#[derive(Debug, Default)]
struct RegistryState {
    bridges: HashMap<String, Bridge>,
    /// Globally authorized relayers.
    relayers: BTreeSet<String>,
    audit: Vec<RelayerAuditEntry>,
}

impl RegistryState {
    fn bridge_mut(&mut self, id: &str) -> BridgeResult<&mut Bridge> {
        self.bridges
            .get_mut(id)
            .ok_or_else(|| BridgeError::NotFound(id.to_string()))
    }

    fn record(
        &mut self,
        relayer: &str,
        bridge_id: Option<&str>,
        action: RelayerAction,
        at: DateTime<Utc>,
    ) {
        self.audit.push(RelayerAuditEntry {
            relayer: relayer.to_string(),
            bridge_id: bridge_id.map(str::to_string),
            action,
            at,
        });
    }
}

/// Registers bridges and tracks which relayers may operate them.
#[derive(Debug)]
pub struct BridgeRegistry {
    clock: Arc<dyn Clock>,
    nonces: NonceSource,
    state: RwLock<RegistryState>,
    events: EventBus<BridgeEvent>,
}

impl Default for BridgeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeRegistry {
    /// Creates an empty registry reading time from the system clock.
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            nonces: NonceSource::new(),
            state: RwLock::new(RegistryState::default()),
            events: EventBus::new("bridges"),
        }
    }

    /// Replaces the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Registers a bridge between `source` and `target` and returns its id.
    ///
    /// If `relayer` is given it is authorized on the new bridge (not globally).
    pub fn register_bridge(
        &self,
        source: &str,
        target: &str,
        relayer: Option<&str>,
        opts: BridgeOptions,
    ) -> BridgeResult<String> {
        let source = non_empty(source).ok_or(BridgeError::MissingField("source chain"))?;
        let target = non_empty(target).ok_or(BridgeError::MissingField("target chain"))?;
        let relayer = relayer.and_then(non_empty);
        let now = self.clock.now();

        let id = IdHasher::new("bridge")
            .field(source)
            .field(target)
            .nonce(self.nonces.next(now))
            .finish();

        let bridge = Bridge {
            id: id.clone(),
            source_chain: source.to_string(),
            target_chain: target.to_string(),
            relayers: relayer.map(str::to_string).into_iter().collect(),
            active: !opts.inactive,
            metadata: opts.metadata,
            created_at: now,
            updated_at: now,
        };

        {
            trace!(%id, "acquiring bridge registry write lock");
            let mut state = self.state.write();
            if let Some(relayer) = relayer {
                state.record(relayer, Some(&id), RelayerAction::Assigned, now);
            }
            state.bridges.insert(id.clone(), bridge.clone());
        }

        info!(%id, %source, %target, active = bridge.active, "bridge registered");
        self.events.publish(BridgeEvent {
            kind: BridgeEventKind::Registered,
            bridge: Some(bridge),
            relayer: relayer.map(str::to_string),
            at: now,
        });

        Ok(id)
    }

    /// Returns a copy of a bridge.
    pub fn get_bridge(&self, id: &str) -> Option<Bridge> {
        self.state.read().bridges.get(id).cloned()
    }

    /// Returns copies of every bridge sorted by creation time, then id.
    pub fn list_bridges(&self) -> Vec<Bridge> {
        let mut out: Vec<Bridge> = self.state.read().bridges.values().cloned().collect();
        out.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        out
    }

    /// Marks a bridge active. A no-op if it already is.
    pub fn activate_bridge(&self, id: &str) -> BridgeResult<()> {
        self.set_active(id, true)
    }

    /// Marks a bridge inactive. A no-op if it already is.
    pub fn deactivate_bridge(&self, id: &str) -> BridgeResult<()> {
        self.set_active(id, false)
    }

    fn set_active(&self, id: &str, active: bool) -> BridgeResult<()> {
        let now = self.clock.now();
        let snapshot = {
            let mut state = self.state.write();
            let bridge = state.bridge_mut(id)?;
            if bridge.active == active {
                debug!(%id, %active, "bridge already in requested state");
                return Ok(());
            }
            bridge.active = active;
            bridge.updated_at = now;
            bridge.clone()
        };

        let kind = if active {
            BridgeEventKind::Activated
        } else {
            BridgeEventKind::Deactivated
        };
        info!(%id, %kind, "bridge status changed");
        self.events.publish(BridgeEvent {
            kind,
            bridge: Some(snapshot),
            relayer: None,
            at: now,
        });
        Ok(())
    }

    /// Authorizes `addr` on a single bridge.
    ///
    /// Authorizing a relayer that is already on the bridge is a no-op.
    pub fn authorize_bridge_relayer(&self, id: &str, addr: &str) -> BridgeResult<()> {
        let addr = non_empty(addr).ok_or(BridgeError::MissingField("relayer address"))?;
        let now = self.clock.now();
        let snapshot = {
            let mut state = self.state.write();
            let bridge = state.bridge_mut(id)?;
            if !bridge.relayers.insert(addr.to_string()) {
                debug!(%id, relayer = %addr, "relayer already authorized on bridge");
                return Ok(());
            }
            bridge.updated_at = now;
            let snapshot = bridge.clone();
            state.record(addr, Some(id), RelayerAction::Authorized, now);
            snapshot
        };

        info!(%id, relayer = %addr, "bridge relayer authorized");
        self.events.publish(BridgeEvent {
            kind: BridgeEventKind::RelayerAuthorized,
            bridge: Some(snapshot),
            relayer: Some(addr.to_string()),
            at: now,
        });
        Ok(())
    }

    /// Authorizes `addr` globally. Re-authorizing is a no-op.
    pub fn authorize_relayer(&self, addr: &str) -> BridgeResult<()> {
        let addr = non_empty(addr).ok_or(BridgeError::MissingField("relayer address"))?;
        let now = self.clock.now();
        {
            let mut state = self.state.write();
            if !state.relayers.insert(addr.to_string()) {
                debug!(relayer = %addr, "relayer already globally authorized");
                return Ok(());
            }
            state.record(addr, None, RelayerAction::Authorized, now);
        }

        info!(relayer = %addr, "relayer authorized");
        self.events.publish(BridgeEvent {
            kind: BridgeEventKind::RelayerAuthorized,
            bridge: None,
            relayer: Some(addr.to_string()),
            at: now,
        });
        Ok(())
    }

    /// Revokes `addr` globally and from every bridge.
    ///
    /// Returns whether the relayer was authorized anywhere. Revoking an unknown relayer emits
    /// nothing.
    pub fn revoke_relayer(&self, addr: &str) -> BridgeResult<bool> {
        let addr = non_empty(addr).ok_or(BridgeError::MissingField("relayer address"))?;
        let now = self.clock.now();
        {
            let mut state = self.state.write();
            let mut removed = state.relayers.remove(addr);
            for bridge in state.bridges.values_mut() {
                if bridge.relayers.remove(addr) {
                    bridge.updated_at = now;
                    removed = true;
                }
            }
            if !removed {
                debug!(relayer = %addr, "relayer not authorized anywhere");
                return Ok(false);
            }
            state.record(addr, None, RelayerAction::Revoked, now);
        }

        info!(relayer = %addr, "relayer revoked");
        self.events.publish(BridgeEvent {
            kind: BridgeEventKind::RelayerRevoked,
            bridge: None,
            relayer: Some(addr.to_string()),
            at: now,
        });
        Ok(true)
    }

    /// Whether `addr` is in the global relayer set.
    pub fn is_relayer_authorized(&self, addr: &str) -> bool {
        self.state.read().relayers.contains(addr)
    }

    /// Sets a metadata entry on a bridge.
    pub fn update_bridge_metadata(&self, id: &str, key: &str, value: &str) -> BridgeResult<()> {
        let key = non_empty(key).ok_or(BridgeError::MissingField("metadata key"))?;
        let now = self.clock.now();
        let snapshot = {
            let mut state = self.state.write();
            let bridge = state.bridge_mut(id)?;
            bridge.metadata.insert(key.to_string(), value.to_string());
            bridge.updated_at = now;
            bridge.clone()
        };

        info!(%id, %key, "bridge metadata updated");
        self.events.publish(BridgeEvent {
            kind: BridgeEventKind::MetadataUpdated,
            bridge: Some(snapshot),
            relayer: None,
            at: now,
        });
        Ok(())
    }

    /// Returns a copy of the relayer audit ledger, oldest first.
    pub fn relayer_audit(&self) -> Vec<RelayerAuditEntry> {
        self.state.read().audit.clone()
    }

    /// Computes the aggregate counters from current state.
    pub fn metrics(&self) -> BridgeMetrics {
        let state = self.state.read();
        let count = |action| state.audit.iter().filter(|e| e.action == action).count();
        BridgeMetrics {
            total: state.bridges.len(),
            active: state.bridges.values().filter(|b| b.active).count(),
            authorized_relay: count(RelayerAction::Authorized),
            revoked_relay: count(RelayerAction::Revoked),
        }
    }

    /// Subscribes to registry events with a queue of `buffer` entries.
    pub fn subscribe(&self, buffer: usize) -> (Subscription<BridgeEvent>, CancelHandle) {
        self.events.subscribe(buffer)
    }

    /// Registers a callback invoked for every event.
    pub fn register_listener<F>(&self, listener: F) -> CancelHandle
    where
        F: Fn(&BridgeEvent) + Send + Sync + 'static,
    {
        self.events.register_listener(listener)
    }
}
