//! Errors raised by the connection manager and its state machine.

use thiserror::Error;
use xchain_primitives::verifier::VerifyError;

use super::{id::IdGenerationError, ConnectionStatus};
use crate::errors::ErrorKind;

/// Errors that can occur while managing connections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// A required spec field was missing or malformed.
    #[error("invalid connection spec: {0} is required")]
    InvalidSpec(&'static str),

    /// A fault report was malformed.
    #[error("invalid fault: {0}")]
    InvalidFault(&'static str),

    /// No connection with this id.
    #[error("connection {0} not found")]
    NotFound(String),

    /// A connection with the same id is already stored.
    #[error("connection {0} already exists")]
    Exists(String),

    /// The connection is `Closed` or `Failed`.
    #[error("connection already closed: {id} is {status}")]
    Closed {
        /// The connection id.
        id: String,
        /// Its terminal status.
        status: ConnectionStatus,
    },

    /// The input is not accepted in the current, non-terminal status.
    #[error("invalid transition for connection {id} in state {state}: {reason}")]
    InvalidTransition {
        /// The connection id.
        id: String,
        /// The current status.
        state: ConnectionStatus,
        /// Why the input was refused.
        reason: String,
    },

    /// The handshake proof did not verify.
    #[error("handshake rejected: {0}")]
    HandshakeRejected(#[from] VerifyError),

    /// The id generator failed.
    #[error(transparent)]
    IdGeneration(#[from] IdGenerationError),

    /// The caller cancelled the operation before it took effect.
    #[error("operation cancelled")]
    Cancelled,
}

impl ConnectionError {
    /// The taxonomy bucket of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            ConnectionError::InvalidSpec(_) | ConnectionError::InvalidFault(_) => {
                ErrorKind::Validation
            }
            ConnectionError::NotFound(_) => ErrorKind::NotFound,
            ConnectionError::Exists(_) => ErrorKind::Conflict,
            ConnectionError::Closed { .. } | ConnectionError::InvalidTransition { .. } => {
                ErrorKind::InvalidState
            }
            ConnectionError::HandshakeRejected(_) | ConnectionError::IdGeneration(_) => {
                ErrorKind::Dependency
            }
            ConnectionError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// The result type for connection operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;
