//! Errors raised by the bridge registry.

use thiserror::Error;

use crate::errors::ErrorKind;

/// Errors that can occur in the [`BridgeRegistry`](super::BridgeRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// A required field was blank.
    #[error("{0} must not be empty")]
    MissingField(&'static str),

    /// No bridge with this id.
    #[error("bridge {0} not found")]
    NotFound(String),
}

impl BridgeError {
    /// The taxonomy bucket of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::MissingField(_) => ErrorKind::Validation,
            BridgeError::NotFound(_) => ErrorKind::NotFound,
        }
    }
}

/// The result type for operations on the bridge registry.
pub type BridgeResult<T> = Result<T, BridgeError>;
