//! Error taxonomy shared by every manager.
//!
//! Each manager has its own error enum so callers can match on the exact sentinel they care
//! about, and every one of those enums maps onto an [`ErrorKind`] for coarse handling.

use std::fmt;

use thiserror::Error;

/// The kind of failure an operation ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or incomplete input. Always detected before any state is touched.
    Validation,
    /// The referenced entity does not exist.
    NotFound,
    /// An entity with the same identifier or uniqueness key already exists.
    Conflict,
    /// The operation is not permitted from the entity's current status.
    InvalidState,
    /// A collaborator (verifier, connection source, id generator) reported a problem.
    Dependency,
    /// The caller cancelled the operation before it started mutating state.
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InvalidState => "invalid-state",
            ErrorKind::Dependency => "dependency",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Errors raised while validating configuration or wiring a manager.
///
/// These only ever surface at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A numeric setting that must be positive was zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    /// A required collaborator was not supplied.
    #[error("missing required collaborator: {0}")]
    MissingCollaborator(&'static str),

    /// A string setting that must not be blank was blank.
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

impl ConfigError {
    /// Configuration problems are always caller mistakes.
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}
