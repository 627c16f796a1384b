//! Errors raised by the contract link manager and its state machine.

use thiserror::Error;

use super::ContractLinkStatus;
use crate::{connection::ConnectionStatus, errors::ErrorKind};

/// Errors that can occur while managing contract links.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractLinkError {
    /// The spec is incomplete or its access policy is inconsistent.
    #[error("invalid contract link spec: {0}")]
    InvalidSpec(&'static str),

    /// An argument other than the spec was blank.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// The referenced connection does not exist.
    #[error("connection {0} is unknown")]
    ConnectionUnknown(String),

    /// The referenced connection exists but is not active.
    #[error("connection {id} is {status}, not active")]
    ConnectionInactive {
        /// The connection id.
        id: String,
        /// Its current status.
        status: ConnectionStatus,
    },

    /// A link with the same id, or mapping the same local contract, already exists.
    #[error("contract link already exists: {0}")]
    Exists(String),

    /// The approver already approved this link.
    #[error("{approver} already approved contract link {id}")]
    ApprovalDuplicate {
        /// The link id.
        id: String,
        /// The normalized approver.
        approver: String,
    },

    /// The approver is not in the link's allow-list.
    #[error("{approver} may not approve contract link {id}")]
    ApproverNotAllowed {
        /// The link id.
        id: String,
        /// The normalized approver.
        approver: String,
    },

    /// A suspension or retirement was requested without a reason.
    #[error("a reason is required to {0}")]
    ReasonRequired(&'static str),

    /// The operation is not allowed in the link's current status.
    #[error("cannot {action} contract link {id} while {status}")]
    InvalidState {
        /// The link id.
        id: String,
        /// The current status.
        status: ContractLinkStatus,
        /// What was attempted.
        action: &'static str,
    },

    /// No link with this id.
    #[error("contract link {0} not found")]
    NotFound(String),
}

impl ContractLinkError {
    /// The taxonomy bucket of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            ContractLinkError::InvalidSpec(_) | ContractLinkError::InvalidInput(_) => {
                ErrorKind::Validation
            }
            ContractLinkError::ConnectionUnknown(_)
            | ContractLinkError::ConnectionInactive { .. } => ErrorKind::Dependency,
            ContractLinkError::Exists(_) | ContractLinkError::ApprovalDuplicate { .. } => {
                ErrorKind::Conflict
            }
            ContractLinkError::ApproverNotAllowed { .. }
            | ContractLinkError::ReasonRequired(_)
            | ContractLinkError::InvalidState { .. } => ErrorKind::InvalidState,
            ContractLinkError::NotFound(_) => ErrorKind::NotFound,
        }
    }
}

/// The result type for contract link operations.
pub type ContractLinkResult<T> = Result<T, ContractLinkError>;
