//! The contract link manager.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};
use xchain_primitives::{
    clock::{Clock, SystemClock},
    event_bus::{CancelHandle, EventBus},
    subscription::Subscription,
};

use super::{
    ConnectionSnapshotSource, ContractLink, ContractLinkError, ContractLinkEvent,
    ContractLinkFilter, ContractLinkResult, ContractLinkSM, ContractLinkSpec, ContractLinkStatus,
    ContractLinkUpdate, LinkCommand,
};
use crate::{
    config::ContractLinkManagerConfig, connection::ConnectionStatus, errors::ConfigError,
    state_machine::StateMachine,
};

#[derive(Debug, Default)]
struct LinkStore {
    links: HashMap<String, ContractLinkSM>,
    /// `(local chain, local address)` of every non-retired link to its id.
    by_local: HashMap<(String, String), String>,
}

/// Registers contract links and drives them through approval and their lifecycle.
#[derive(Debug)]
pub struct ContractLinkManager {
    connections: Option<Arc<dyn ConnectionSnapshotSource>>,
    clock: Arc<dyn Clock>,
    store: RwLock<LinkStore>,
    events: EventBus<ContractLinkEvent>,
}

impl ContractLinkManager {
    /// Creates a manager.
    ///
    /// With a connection source every registration must reference an active connection. Fails
    /// if the config requires a source and none is given.
    pub fn new(
        config: ContractLinkManagerConfig,
        connections: Option<Arc<dyn ConnectionSnapshotSource>>,
    ) -> Result<Self, ConfigError> {
        if config.require_connection_source && connections.is_none() {
            return Err(ConfigError::MissingCollaborator("connection snapshot source"));
        }
        Ok(Self {
            connections,
            clock: Arc::new(SystemClock),
            store: RwLock::new(LinkStore::default()),
            events: EventBus::new("contract-links"),
        })
    }

    /// Replaces the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Registers a link.
    ///
    /// The spec is normalized before validation, so two specs that only differ in case or
    /// surrounding whitespace resolve to the same link.
    pub fn register(&self, spec: ContractLinkSpec) -> ContractLinkResult<ContractLink> {
        let spec = spec.normalized();
        spec.validate()?;
        self.check_connection(&spec.connection_id)?;

        let id = spec.derive_id();
        let key = spec.local_key();
        let now = self.clock.now();

        let (snapshot, registered) = {
            trace!(%id, "acquiring contract link write lock");
            let mut store = self.store.write();
            if store.links.contains_key(&id) {
                return Err(ContractLinkError::Exists(id));
            }
            if let Some(existing) = store.by_local.get(&key) {
                return Err(ContractLinkError::Exists(existing.clone()));
            }
            let (sm, registered) = ContractLinkSM::register(id.clone(), spec, now);
            let snapshot = sm.link().clone();
            store.by_local.insert(key, id.clone());
            store.links.insert(id.clone(), sm);
            (snapshot, registered)
        };

        info!(
            %id,
            local_chain = %snapshot.spec.local_chain,
            local_address = %snapshot.spec.local_address,
            remote_chain = %snapshot.spec.remote_chain,
            status = %snapshot.status,
            "contract link registered"
        );
        self.events.publish(registered);
        Ok(snapshot)
    }

    /// Records an approval on a pending link, activating it once the quorum is reached.
    ///
    /// The activating call publishes `ApprovalRecorded` and then `Activated`.
    pub fn record_approval(&self, id: &str, approver: &str) -> ContractLinkResult<ContractLink> {
        let at = self.clock.now();
        let link = self.apply(
            id,
            LinkCommand::Approve {
                approver: approver.to_string(),
                at,
            },
        )?;
        info!(
            %id,
            %approver,
            approvals = link.approvals.len(),
            threshold = link.approval_threshold,
            status = %link.status,
            "contract link approval recorded"
        );
        Ok(link)
    }

    /// Applies `update`. Returns the link unchanged, without an event or a version bump, if
    /// nothing differs.
    pub fn update(
        &self,
        id: &str,
        update: ContractLinkUpdate,
    ) -> ContractLinkResult<ContractLink> {
        let at = self.clock.now();
        let link = self.apply(id, LinkCommand::Update { update, at })?;
        debug!(%id, version = link.version, "contract link update processed");
        Ok(link)
    }

    /// Suspends an active link.
    pub fn suspend(&self, id: &str, reason: &str) -> ContractLinkResult<ContractLink> {
        let at = self.clock.now();
        let link = self.apply(
            id,
            LinkCommand::Suspend {
                reason: reason.to_string(),
                at,
            },
        )?;
        info!(%id, %reason, "contract link suspended");
        Ok(link)
    }

    /// Resumes a suspended or failed link. Resuming from `Failed` resolves the most recent
    /// unresolved failure.
    pub fn resume(&self, id: &str) -> ContractLinkResult<ContractLink> {
        let at = self.clock.now();
        let link = self.apply(id, LinkCommand::Resume { at })?;
        info!(%id, "contract link resumed");
        Ok(link)
    }

    /// Retires a link and frees its local contract for a new mapping.
    pub fn retire(&self, id: &str, reason: &str) -> ContractLinkResult<ContractLink> {
        let at = self.clock.now();
        let link = self.apply(
            id,
            LinkCommand::Retire {
                reason: reason.to_string(),
                at,
            },
        )?;
        info!(%id, %reason, "contract link retired");
        Ok(link)
    }

    /// Records a failure on an active link and marks it `Failed`.
    pub fn report_failure(
        &self,
        id: &str,
        code: &str,
        detail: &str,
    ) -> ContractLinkResult<ContractLink> {
        let at = self.clock.now();
        let link = self.apply(
            id,
            LinkCommand::ReportFailure {
                code: code.to_string(),
                detail: detail.to_string(),
                at,
            },
        )?;
        warn!(%id, %code, %detail, "contract link failure reported");
        Ok(link)
    }

    /// Returns a copy of a link.
    pub fn get(&self, id: &str) -> Option<ContractLink> {
        self.store.read().links.get(id).map(|sm| sm.link().clone())
    }

    /// Returns copies of the links matching `filter`, sorted by creation time, then id.
    pub fn list(&self, filter: &ContractLinkFilter) -> Vec<ContractLink> {
        let mut out: Vec<ContractLink> = self
            .store
            .read()
            .links
            .values()
            .map(ContractLinkSM::link)
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        out
    }

    /// Subscribes to link events with a queue of `buffer` entries.
    ///
    /// Events that do not fit are dropped for this subscriber; the producer never blocks.
    pub fn subscribe(&self, buffer: usize) -> (Subscription<ContractLinkEvent>, CancelHandle) {
        self.events.subscribe(buffer)
    }

    /// Registers a callback invoked for every event.
    pub fn register_listener<F>(&self, listener: F) -> CancelHandle
    where
        F: Fn(&ContractLinkEvent) + Send + Sync + 'static,
    {
        self.events.register_listener(listener)
    }

    fn check_connection(&self, connection_id: &str) -> ContractLinkResult<()> {
        let Some(source) = &self.connections else {
            return Ok(());
        };
        // The source takes and releases its own lock before we take ours.
        let conn = source
            .get_connection(connection_id)
            .ok_or_else(|| ContractLinkError::ConnectionUnknown(connection_id.to_string()))?;
        if conn.status != ConnectionStatus::Active {
            warn!(%connection_id, status = %conn.status, "refusing link over inactive connection");
            return Err(ContractLinkError::ConnectionInactive {
                id: connection_id.to_string(),
                status: conn.status,
            });
        }
        Ok(())
    }

    /// Runs `command` through the link's state machine under the write lock and publishes the
    /// resulting notifications after releasing it.
    fn apply(&self, id: &str, command: LinkCommand) -> ContractLinkResult<ContractLink> {
        let (snapshot, output) = {
            let mut store = self.store.write();
            let sm = store
                .links
                .get_mut(id)
                .ok_or_else(|| ContractLinkError::NotFound(id.to_string()))?;
            debug!(%id, state = %sm.state(), %command, "processing contract link command");
            let output = sm.process_event(command)?;
            let snapshot = sm.link().clone();

            if snapshot.status == ContractLinkStatus::Retired {
                let key = snapshot.spec.local_key();
                if store.by_local.get(&key).is_some_and(|owner| owner == id) {
                    store.by_local.remove(&key);
                }
            }
            (snapshot, output)
        };

        self.events.publish_all(output.notifications);
        Ok(snapshot)
    }
}
