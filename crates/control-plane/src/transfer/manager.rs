//! The bridge transfer manager.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use tracing::{debug, info, warn};
use xchain_primitives::{
    clock::{Clock, SystemClock},
    event_bus::{CancelHandle, EventBus},
    ids::{IdHasher, NonceSource},
    subscription::Subscription,
};

use super::{
    BridgeTransfer, TransferCommand, TransferError, TransferEvent, TransferEventKind,
    TransferFilter, TransferMetrics, TransferOptions, TransferResult, TransferSM, TransferStatus,
};
use crate::{
    config::TransferManagerConfig, errors::ConfigError, state_machine::StateMachine,
    types::non_empty,
};

/// Records deposits into bridges and their later claims.
#[derive(Debug)]
pub struct BridgeTransferManager {
    config: TransferManagerConfig,
    clock: Arc<dyn Clock>,
    nonces: NonceSource,
    transfers: RwLock<HashMap<String, TransferSM>>,
    events: EventBus<TransferEvent>,
}

impl BridgeTransferManager {
    /// Creates an empty manager.
    pub fn new(config: TransferManagerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            clock: Arc::new(SystemClock),
            nonces: NonceSource::new(),
            transfers: RwLock::new(HashMap::new()),
            events: EventBus::new("transfers"),
        })
    }

    /// Replaces the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Records a deposit and returns the new transfer's id.
    ///
    /// Without an explicit expiry the configured default expiry applies, measured from now.
    pub fn deposit(
        &self,
        bridge_id: &str,
        from: &str,
        to: &str,
        amount: u64,
        token_id: &str,
        opts: TransferOptions,
    ) -> TransferResult<String> {
        let field = |value: &str, name: &'static str| {
            non_empty(value)
                .map(str::to_string)
                .ok_or(TransferError::InvalidDeposit(name))
        };
        let bridge_id = field(bridge_id, "bridge id is required")?;
        let from = field(from, "sender is required")?;
        let to = field(to, "recipient is required")?;
        let token_id = field(token_id, "token id is required")?;
        if amount == 0 {
            return Err(TransferError::InvalidDeposit("amount must be positive"));
        }

        let now = self.clock.now();
        let expires_at = opts.expires_at.or_else(|| {
            self.config
                .default_expiry()
                .and_then(|d| TimeDelta::from_std(d).ok())
                .and_then(|d| now.checked_add_signed(d))
        });

        let id = IdHasher::new("transfer")
            .field(&bridge_id)
            .field(&from)
            .field(&to)
            .field(amount.to_be_bytes())
            .field(&token_id)
            .nonce(self.nonces.next(now))
            .finish();

        let transfer = BridgeTransfer {
            id: id.clone(),
            bridge_id,
            from,
            to,
            amount,
            token_id,
            proof: Vec::new(),
            status: TransferStatus::Pending,
            failure_reason: None,
            created_at: now,
            updated_at: now,
            claimed_at: None,
            expires_at,
            metadata: opts.metadata,
        };
        let deposited = TransferEvent {
            kind: TransferEventKind::Deposited,
            transfer: transfer.clone(),
            reason: None,
            at: now,
        };

        self.transfers
            .write()
            .insert(id.clone(), TransferSM::new(transfer));

        info!(
            %id,
            bridge_id = %deposited.transfer.bridge_id,
            amount,
            token_id = %deposited.transfer.token_id,
            "transfer deposited"
        );
        self.events.publish(deposited);
        Ok(id)
    }

    /// Claims a pending transfer with `proof`.
    ///
    /// A transfer past its deadline is refused with [`TransferError::Expired`] and left for the
    /// sweep.
    pub fn claim(&self, id: &str, proof: &[u8]) -> TransferResult<BridgeTransfer> {
        let at = self.clock.now();
        let transfer = self.apply(
            id,
            TransferCommand::Claim {
                proof: proof.to_vec(),
                at,
            },
        )?;
        info!(%id, "transfer claimed");
        Ok(transfer)
    }

    /// Marks a pending transfer as failed, recording `reason`.
    pub fn fail(&self, id: &str, reason: &str) -> TransferResult<BridgeTransfer> {
        let at = self.clock.now();
        let transfer = self.apply(
            id,
            TransferCommand::Fail {
                reason: reason.to_string(),
                at,
            },
        )?;
        warn!(%id, %reason, "transfer failed");
        Ok(transfer)
    }

    /// Expires every pending transfer whose deadline is at or before `now` and returns exactly
    /// those, sorted by creation time, then id.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<BridgeTransfer> {
        let mut expired = Vec::new();
        let mut notifications = Vec::new();

        {
            let mut transfers = self.transfers.write();
            for (id, sm) in transfers.iter_mut().filter(|(_, sm)| sm.is_due(now)) {
                match sm.process_event(TransferCommand::Expire { at: now }) {
                    Ok(output) => {
                        notifications.extend(output.notifications);
                        expired.push(sm.transfer().clone());
                    }
                    Err(e) => debug!(%id, %e, "due transfer could not be expired"),
                }
            }
        }

        if !expired.is_empty() {
            info!(count = expired.len(), %now, "expired unclaimed transfers");
        }
        expired.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        notifications.sort_by(|a, b| {
            (a.transfer.created_at, &a.transfer.id).cmp(&(b.transfer.created_at, &b.transfer.id))
        });
        self.events.publish_all(notifications);
        expired
    }

    /// Returns a copy of a transfer.
    pub fn get_transfer(&self, id: &str) -> Option<BridgeTransfer> {
        self.transfers
            .read()
            .get(id)
            .map(|sm| sm.transfer().clone())
    }

    /// Returns copies of the transfers matching `filter`, sorted by creation time, then id.
    pub fn list_transfers(&self, filter: &TransferFilter) -> Vec<BridgeTransfer> {
        let mut out: Vec<BridgeTransfer> = self
            .transfers
            .read()
            .values()
            .map(TransferSM::transfer)
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        out
    }

    /// Counts transfers by outcome.
    pub fn metrics(&self) -> TransferMetrics {
        self.transfers
            .read()
            .values()
            .fold(TransferMetrics::default(), |mut m, sm| {
                m.total += 1;
                match sm.state() {
                    TransferStatus::Pending => {}
                    TransferStatus::Claimed => m.claimed += 1,
                    TransferStatus::Failed => m.failed += 1,
                    TransferStatus::Expired => m.expired += 1,
                }
                m
            })
    }

    /// Subscribes to transfer events with a queue of `buffer` entries.
    ///
    /// Events that do not fit are dropped for this subscriber; the producer never blocks.
    pub fn subscribe(&self, buffer: usize) -> (Subscription<TransferEvent>, CancelHandle) {
        self.events.subscribe(buffer)
    }

    /// Registers a callback invoked for every event.
    pub fn register_listener<F>(&self, listener: F) -> CancelHandle
    where
        F: Fn(&TransferEvent) + Send + Sync + 'static,
    {
        self.events.register_listener(listener)
    }

    fn apply(&self, id: &str, command: TransferCommand) -> TransferResult<BridgeTransfer> {
        let (snapshot, output) = {
            let mut transfers = self.transfers.write();
            let sm = transfers
                .get_mut(id)
                .ok_or_else(|| TransferError::NotFound(id.to_string()))?;
            debug!(%id, state = %sm.state(), %command, "processing transfer command");
            let output = sm.process_event(command)?;
            (sm.transfer().clone(), output)
        };

        self.events.publish_all(output.notifications);
        Ok(snapshot)
    }
}
