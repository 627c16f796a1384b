//! Connection identifier derivation.

use std::fmt;

use thiserror::Error;
use xchain_primitives::ids::IdHasher;

use super::ConnectionSpec;

/// The id generator could not produce an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("connection id generation failed: {0}")]
pub struct IdGenerationError(pub String);

/// Derives the identifier of a connection from its spec.
pub trait ConnectionIdGenerator: Send + Sync + fmt::Debug {
    /// Returns the id for `spec`. Must be deterministic for the manager's duplicate detection to
    /// be meaningful.
    fn new_id(&self, spec: &ConnectionSpec) -> Result<String, IdGenerationError>;
}

/// Hashes every identity-bearing spec field.
///
/// Two specs that differ only in their handshake proof hash to the same id: the proof is a
/// function of the payload and signer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentAddressedIdGenerator;

impl ConnectionIdGenerator for ContentAddressedIdGenerator {
    fn new_id(&self, spec: &ConnectionSpec) -> Result<String, IdGenerationError> {
        let interval = spec
            .heartbeat_interval
            .map(|d| d.as_nanos().to_be_bytes().to_vec())
            .unwrap_or_default();

        Ok(IdHasher::new("connection")
            .field(&spec.local_chain)
            .field(&spec.remote_chain)
            .field(&spec.local_endpoint)
            .field(&spec.remote_endpoint)
            .field(&spec.governance_profile)
            .field(&spec.gas_profile)
            .map_field(&spec.metadata)
            .field(interval)
            .field(&spec.signer)
            .field(&spec.handshake_payload)
            .finish())
    }
}
