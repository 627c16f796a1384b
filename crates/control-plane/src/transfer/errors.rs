//! Errors raised by the transfer manager and its state machine.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::TransferStatus;
use crate::errors::ErrorKind;

/// Errors that can occur while managing transfers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// A deposit field was blank or the amount was zero.
    #[error("invalid deposit: {0}")]
    InvalidDeposit(&'static str),

    /// A claim was attempted without a proof.
    #[error("a proof is required to claim transfer {0}")]
    MissingProof(String),

    /// No transfer with this id.
    #[error("transfer {0} not found")]
    NotFound(String),

    /// The transfer already reached a terminal status.
    #[error("transfer {id} is already {status}")]
    Finalized {
        /// The transfer id.
        id: String,
        /// Its terminal status.
        status: TransferStatus,
    },

    /// The transfer passed its deadline. Only the sweep may move it on.
    #[error("transfer {id} expired at {expires_at}")]
    Expired {
        /// The transfer id.
        id: String,
        /// Its deadline.
        expires_at: DateTime<Utc>,
    },

    /// An expiry was requested for a transfer that is not yet due.
    #[error("transfer {0} is not due to expire")]
    NotDue(String),
}

impl TransferError {
    /// The taxonomy bucket of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            TransferError::InvalidDeposit(_) | TransferError::MissingProof(_) => {
                ErrorKind::Validation
            }
            TransferError::NotFound(_) => ErrorKind::NotFound,
            TransferError::Finalized { .. }
            | TransferError::Expired { .. }
            | TransferError::NotDue(_) => ErrorKind::InvalidState,
        }
    }
}

/// The result type for transfer operations.
pub type TransferResult<T> = Result<T, TransferError>;
