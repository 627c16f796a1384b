//! The Transfer State Machine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BridgeTransfer, TransferError, TransferEvent, TransferEventKind, TransferStatus};
use crate::{
    state_machine::{SMOutput, StateMachine},
    types::non_empty,
};

/// Inputs accepted by [`TransferSM`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferCommand {
    /// Release the assets on presentation of a proof.
    Claim {
        /// The claim proof. Must not be empty.
        proof: Vec<u8>,
        /// Time of the claim.
        at: DateTime<Utc>,
    },
    /// Abandon the transfer.
    Fail {
        /// Why; may be empty.
        reason: String,
        /// Time of the failure.
        at: DateTime<Utc>,
    },
    /// Expire a transfer whose deadline has passed.
    Expire {
        /// Time of the sweep.
        at: DateTime<Utc>,
    },
}

impl fmt::Display for TransferCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferCommand::Claim { proof, .. } => {
                write!(f, "Claim with a {} byte proof", proof.len())
            }
            TransferCommand::Fail { reason, .. } => write!(f, "Fail ({reason})"),
            TransferCommand::Expire { at } => write!(f, "Expire at {at}"),
        }
    }
}

/// The state machine tracking one transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSM {
    transfer: BridgeTransfer,
}

impl TransferSM {
    /// Wraps a freshly deposited or existing transfer.
    pub const fn new(transfer: BridgeTransfer) -> Self {
        Self { transfer }
    }

    /// The current status.
    pub const fn state(&self) -> TransferStatus {
        self.transfer.status
    }

    /// The transfer record.
    pub const fn transfer(&self) -> &BridgeTransfer {
        &self.transfer
    }

    /// Whether the transfer is pending and its deadline is at or before `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.transfer.status == TransferStatus::Pending
            && self.transfer.expires_at.is_some_and(|deadline| deadline <= now)
    }

    fn notify(
        &self,
        kind: TransferEventKind,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> SMOutput<TransferEvent> {
        SMOutput::with_notifications(vec![TransferEvent {
            kind,
            transfer: self.transfer.clone(),
            reason,
            at,
        }])
    }

    fn process_claim(
        &mut self,
        proof: Vec<u8>,
        at: DateTime<Utc>,
    ) -> Result<SMOutput<TransferEvent>, TransferError> {
        if proof.is_empty() {
            return Err(TransferError::MissingProof(self.transfer.id.clone()));
        }
        if let Some(expires_at) = self.transfer.expires_at.filter(|deadline| *deadline <= at) {
            return Err(TransferError::Expired {
                id: self.transfer.id.clone(),
                expires_at,
            });
        }

        self.transfer.proof = proof;
        self.transfer.status = TransferStatus::Claimed;
        self.transfer.claimed_at = Some(at);
        self.transfer.updated_at = at;

        Ok(self.notify(TransferEventKind::Claimed, None, at))
    }

    fn process_fail(
        &mut self,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<SMOutput<TransferEvent>, TransferError> {
        let reason = non_empty(reason).map(str::to_string);

        self.transfer.status = TransferStatus::Failed;
        self.transfer.failure_reason = reason.clone();
        self.transfer.updated_at = at;

        Ok(self.notify(TransferEventKind::Failed, reason, at))
    }

    fn process_expire(
        &mut self,
        at: DateTime<Utc>,
    ) -> Result<SMOutput<TransferEvent>, TransferError> {
        if !self.is_due(at) {
            return Err(TransferError::NotDue(self.transfer.id.clone()));
        }

        self.transfer.status = TransferStatus::Expired;
        self.transfer.updated_at = at;

        Ok(self.notify(TransferEventKind::Expired, None, at))
    }
}

impl StateMachine for TransferSM {
    type Event = TransferCommand;
    type Notification = TransferEvent;
    type Error = TransferError;

    fn process_event(
        &mut self,
        event: Self::Event,
    ) -> Result<SMOutput<Self::Notification>, Self::Error> {
        if self.transfer.status.is_terminal() {
            return Err(TransferError::Finalized {
                id: self.transfer.id.clone(),
                status: self.transfer.status,
            });
        }

        match event {
            TransferCommand::Claim { proof, at } => self.process_claim(proof, at),
            TransferCommand::Fail { reason, at } => self.process_fail(&reason, at),
            TransferCommand::Expire { at } => self.process_expire(at),
        }
    }
}
