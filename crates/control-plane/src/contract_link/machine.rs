//! The Contract Link State Machine.
//!
//! Owns one [`ContractLink`] and enforces its approval gate and transition table. Inputs are
//! expected to be normalized by the caller; timestamps are part of the input so processing is
//! deterministic.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    normalize_approver, ContractLink, ContractLinkError, ContractLinkEvent,
    ContractLinkEventKind, ContractLinkSpec, ContractLinkStatus, ContractLinkUpdate, LinkFailure,
};
use crate::{
    state_machine::{SMOutput, StateMachine},
    types::non_empty,
};

/// Inputs accepted by [`ContractLinkSM`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCommand {
    /// Record an approval.
    Approve {
        /// Who approves. Compared case-insensitively.
        approver: String,
        /// Time of the approval.
        at: DateTime<Utc>,
    },
    /// Change capabilities, gas profile or metadata.
    Update {
        /// The requested changes.
        update: ContractLinkUpdate,
        /// Time of the request.
        at: DateTime<Utc>,
    },
    /// Pause an active link.
    Suspend {
        /// Why. Must not be blank.
        reason: String,
        /// Time of the request.
        at: DateTime<Utc>,
    },
    /// Reactivate a suspended or failed link.
    Resume {
        /// Time of the request.
        at: DateTime<Utc>,
    },
    /// Withdraw the link for good.
    Retire {
        /// Why. Must not be blank.
        reason: String,
        /// Time of the request.
        at: DateTime<Utc>,
    },
    /// Record a failure on an active link.
    ReportFailure {
        /// Machine readable code. Must not be blank.
        code: String,
        /// Human readable detail.
        detail: String,
        /// Time of the report.
        at: DateTime<Utc>,
    },
}

impl LinkCommand {
    const fn action(&self) -> &'static str {
        match self {
            LinkCommand::Approve { .. } => "approve",
            LinkCommand::Update { .. } => "update",
            LinkCommand::Suspend { .. } => "suspend",
            LinkCommand::Resume { .. } => "resume",
            LinkCommand::Retire { .. } => "retire",
            LinkCommand::ReportFailure { .. } => "report a failure on",
        }
    }
}

impl fmt::Display for LinkCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkCommand::Approve { approver, .. } => write!(f, "Approve by {approver}"),
            LinkCommand::Update { .. } => write!(f, "Update"),
            LinkCommand::Suspend { reason, .. } => write!(f, "Suspend ({reason})"),
            LinkCommand::Resume { .. } => write!(f, "Resume"),
            LinkCommand::Retire { reason, .. } => write!(f, "Retire ({reason})"),
            LinkCommand::ReportFailure { code, .. } => write!(f, "ReportFailure {code}"),
        }
    }
}

/// The state machine tracking one contract link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractLinkSM {
    link: ContractLink,
}

impl ContractLinkSM {
    /// Creates a link from a normalized, validated spec along with its `Registered`
    /// notification.
    ///
    /// A link whose policy needs no approvals starts `Active`, otherwise `Pending`.
    pub fn register(
        id: String,
        spec: ContractLinkSpec,
        at: DateTime<Utc>,
    ) -> (Self, ContractLinkEvent) {
        let threshold = spec.access_policy.required_approvals;
        let (status, activated_at) = if threshold == 0 {
            (ContractLinkStatus::Active, Some(at))
        } else {
            (ContractLinkStatus::Pending, None)
        };

        let link = ContractLink {
            id,
            spec,
            status,
            status_reason: None,
            version: 1,
            approvals: Default::default(),
            approval_threshold: threshold,
            failures: Vec::new(),
            created_at: at,
            updated_at: at,
            activated_at,
            suspended_at: None,
            retired_at: None,
        };
        let registered =
            ContractLinkEvent::snapshot(ContractLinkEventKind::Registered, &link, at);
        (Self { link }, registered)
    }

    /// Wraps an existing record.
    pub const fn from_link(link: ContractLink) -> Self {
        Self { link }
    }

    /// The current status.
    pub const fn state(&self) -> ContractLinkStatus {
        self.link.status
    }

    /// The link record.
    pub const fn link(&self) -> &ContractLink {
        &self.link
    }

    fn invalid_state(&self, action: &'static str) -> ContractLinkError {
        ContractLinkError::InvalidState {
            id: self.link.id.clone(),
            status: self.link.status,
            action,
        }
    }

    fn bump(&mut self, at: DateTime<Utc>) {
        self.link.version += 1;
        self.link.updated_at = at;
    }

    fn emit(&self, kind: ContractLinkEventKind, at: DateTime<Utc>) -> ContractLinkEvent {
        ContractLinkEvent::snapshot(kind, &self.link, at)
    }

    fn process_approve(
        &mut self,
        approver: &str,
        at: DateTime<Utc>,
    ) -> Result<SMOutput<ContractLinkEvent>, ContractLinkError> {
        let approver = normalize_approver(approver);
        if approver.is_empty() {
            return Err(ContractLinkError::InvalidInput("approver is required"));
        }
        if self.link.status != ContractLinkStatus::Pending {
            return Err(self.invalid_state("approve"));
        }

        let allowed = &self.link.spec.access_policy.allowed_approvers;
        if !allowed.is_empty() && !allowed.contains(&approver) {
            return Err(ContractLinkError::ApproverNotAllowed {
                id: self.link.id.clone(),
                approver,
            });
        }
        if self.link.approvals.contains_key(&approver) {
            return Err(ContractLinkError::ApprovalDuplicate {
                id: self.link.id.clone(),
                approver,
            });
        }

        self.link.approvals.insert(approver, at);
        self.bump(at);

        let mut output = SMOutput::new();
        output.push(self.emit(ContractLinkEventKind::ApprovalRecorded, at));

        if self.link.approvals.len() >= self.link.approval_threshold as usize {
            self.link.status = ContractLinkStatus::Active;
            self.link.activated_at = Some(at);
            output.push(self.emit(ContractLinkEventKind::Activated, at));
        }

        Ok(output)
    }

    fn process_update(
        &mut self,
        update: ContractLinkUpdate,
        at: DateTime<Utc>,
    ) -> Result<SMOutput<ContractLinkEvent>, ContractLinkError> {
        let update = update.normalized();
        let spec = &mut self.link.spec;
        let mut changed = false;

        if let Some(capabilities) = update.capabilities {
            if capabilities != spec.capabilities {
                spec.capabilities = capabilities;
                changed = true;
            }
        }
        if let Some(gas_profile) = update.gas_profile {
            if gas_profile != spec.gas_profile {
                spec.gas_profile = gas_profile;
                changed = true;
            }
        }
        for (key, value) in update.metadata {
            if spec.metadata.get(&key) != Some(&value) {
                spec.metadata.insert(key, value);
                changed = true;
            }
        }

        if !changed {
            return Ok(SMOutput::new());
        }

        self.bump(at);
        Ok(SMOutput::with_notifications(vec![
            self.emit(ContractLinkEventKind::Updated, at),
        ]))
    }

    fn process_suspend(
        &mut self,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<SMOutput<ContractLinkEvent>, ContractLinkError> {
        let reason = non_empty(reason).ok_or(ContractLinkError::ReasonRequired("suspend"))?;
        if self.link.status != ContractLinkStatus::Active {
            return Err(self.invalid_state("suspend"));
        }

        self.link.status = ContractLinkStatus::Suspended;
        self.link.status_reason = Some(reason.to_string());
        self.link.suspended_at = Some(at);
        self.bump(at);

        Ok(SMOutput::with_notifications(vec![
            self.emit(ContractLinkEventKind::Suspended, at),
        ]))
    }

    fn process_resume(
        &mut self,
        at: DateTime<Utc>,
    ) -> Result<SMOutput<ContractLinkEvent>, ContractLinkError> {
        match self.link.status {
            ContractLinkStatus::Suspended => {}
            ContractLinkStatus::Failed => {
                if let Some(failure) = self.link.failures.iter_mut().rev().find(|f| !f.resolved) {
                    failure.resolved = true;
                    failure.resolved_at = Some(at);
                }
            }
            _ => return Err(self.invalid_state("resume")),
        }

        self.link.status = ContractLinkStatus::Active;
        self.link.status_reason = None;
        self.bump(at);

        Ok(SMOutput::with_notifications(vec![
            self.emit(ContractLinkEventKind::Resumed, at),
        ]))
    }

    fn process_retire(
        &mut self,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<SMOutput<ContractLinkEvent>, ContractLinkError> {
        let reason = non_empty(reason).ok_or(ContractLinkError::ReasonRequired("retire"))?;

        self.link.status = ContractLinkStatus::Retired;
        self.link.status_reason = Some(reason.to_string());
        self.link.retired_at = Some(at);
        self.bump(at);

        Ok(SMOutput::with_notifications(vec![
            self.emit(ContractLinkEventKind::Retired, at),
        ]))
    }

    fn process_report_failure(
        &mut self,
        code: &str,
        detail: String,
        at: DateTime<Utc>,
    ) -> Result<SMOutput<ContractLinkEvent>, ContractLinkError> {
        let code =
            non_empty(code).ok_or(ContractLinkError::InvalidInput("failure code is required"))?;
        if self.link.status != ContractLinkStatus::Active {
            return Err(self.invalid_state("report a failure on"));
        }

        self.link.failures.push(LinkFailure {
            code: code.to_string(),
            detail,
            occurred_at: at,
            resolved: false,
            resolved_at: None,
        });
        self.link.status = ContractLinkStatus::Failed;
        self.bump(at);

        Ok(SMOutput::with_notifications(vec![
            self.emit(ContractLinkEventKind::FailureReported, at),
        ]))
    }
}

impl StateMachine for ContractLinkSM {
    type Event = LinkCommand;
    type Notification = ContractLinkEvent;
    type Error = ContractLinkError;

    fn process_event(
        &mut self,
        event: Self::Event,
    ) -> Result<SMOutput<Self::Notification>, Self::Error> {
        if self.link.status.is_terminal() {
            return Err(self.invalid_state(event.action()));
        }

        match event {
            LinkCommand::Approve { approver, at } => self.process_approve(&approver, at),
            LinkCommand::Update { update, at } => self.process_update(update, at),
            LinkCommand::Suspend { reason, at } => self.process_suspend(&reason, at),
            LinkCommand::Resume { at } => self.process_resume(at),
            LinkCommand::Retire { reason, at } => self.process_retire(&reason, at),
            LinkCommand::ReportFailure { code, detail, at } => {
                self.process_report_failure(&code, detail, at)
            }
        }
    }
}
