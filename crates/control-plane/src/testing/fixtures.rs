//! Test fixtures shared across the manager tests.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use parking_lot::Mutex;
use secp256k1::{rand::thread_rng, Keypair, Secp256k1};
use xchain_primitives::{
    clock::{Clock, ManualClock, StepClock},
    verifier::{schnorr_sign, schnorr_signer_id, FnVerifier, SignatureVerifier, VerifyError},
};

use crate::{
    connection::{
        ChainConnection, ConnectionIdGenerator, ConnectionSpec, ConnectionStatus,
        IdGenerationError,
    },
    contract_link::{AccessPolicy, ConnectionSnapshotSource, ContractLinkSpec},
};

/// The instant every deterministic test clock starts at.
pub(crate) fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// A clock advancing one second per read, starting at [`epoch`].
pub(crate) fn step_clock() -> Arc<dyn Clock> {
    Arc::new(StepClock::new(epoch(), TimeDelta::seconds(1)))
}

/// A clock frozen at [`epoch`] until moved.
pub(crate) fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(epoch()))
}

/// A verifier accepting every signature.
pub(crate) fn accept_all() -> Arc<dyn SignatureVerifier> {
    Arc::new(FnVerifier::new(|_: &[u8], _: &[u8], _: &str| Ok(())))
}

/// A verifier rejecting every signature.
pub(crate) fn reject_all() -> Arc<dyn SignatureVerifier> {
    Arc::new(FnVerifier::new(|_: &[u8], _: &[u8], _: &str| {
        Err(VerifyError::Mismatch)
    }))
}

/// The arguments a [`RecordingVerifier`] was called with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VerifyCall {
    pub(crate) payload: Vec<u8>,
    pub(crate) signature: Vec<u8>,
    pub(crate) signer: String,
}

/// Accepts everything and remembers each call.
#[derive(Debug, Default)]
pub(crate) struct RecordingVerifier {
    pub(crate) calls: Mutex<Vec<VerifyCall>>,
}

#[async_trait::async_trait]
impl SignatureVerifier for RecordingVerifier {
    async fn verify(
        &self,
        payload: &[u8],
        signature: &[u8],
        signer: &str,
    ) -> Result<(), VerifyError> {
        self.calls.lock().push(VerifyCall {
            payload: payload.to_vec(),
            signature: signature.to_vec(),
            signer: signer.to_string(),
        });
        Ok(())
    }
}

/// A verifier that never answers; used to exercise cancellation.
#[derive(Debug, Default)]
pub(crate) struct PendingVerifier;

#[async_trait::async_trait]
impl SignatureVerifier for PendingVerifier {
    async fn verify(&self, _: &[u8], _: &[u8], _: &str) -> Result<(), VerifyError> {
        std::future::pending().await
    }
}

/// Always returns the same id.
#[derive(Debug)]
pub(crate) struct StaticIdGenerator(pub(crate) &'static str);

impl ConnectionIdGenerator for StaticIdGenerator {
    fn new_id(&self, _: &ConnectionSpec) -> Result<String, IdGenerationError> {
        Ok(self.0.to_string())
    }
}

/// Returns `conn-1`, `conn-2`, ...
#[derive(Debug, Default)]
pub(crate) struct SequenceIdGenerator {
    next: Mutex<u64>,
}

impl ConnectionIdGenerator for SequenceIdGenerator {
    fn new_id(&self, _: &ConnectionSpec) -> Result<String, IdGenerationError> {
        let mut next = self.next.lock();
        *next += 1;
        Ok(format!("conn-{next}"))
    }
}

/// Fails every time.
#[derive(Debug)]
pub(crate) struct BrokenIdGenerator;

impl ConnectionIdGenerator for BrokenIdGenerator {
    fn new_id(&self, _: &ConnectionSpec) -> Result<String, IdGenerationError> {
        Err(IdGenerationError("entropy pool drained".to_string()))
    }
}

/// A connection spec that passes validation.
pub(crate) fn connection_spec() -> ConnectionSpec {
    ConnectionSpec {
        local_chain: "synnergy-main".to_string(),
        remote_chain: "ally-main".to_string(),
        local_endpoint: "tcp://10.0.0.1:7000".to_string(),
        remote_endpoint: "tcp://10.0.0.2:7000".to_string(),
        governance_profile: "council".to_string(),
        gas_profile: "syn-default".to_string(),
        metadata: [("region".to_string(), "eu".to_string())].into(),
        heartbeat_interval: Some(Duration::from_secs(10)),
        signer: "validator-1".to_string(),
        handshake_payload: b"hello ally".to_vec(),
        handshake_proof: b"signed hello".to_vec(),
    }
}

/// A connection spec carrying a real Schnorr handshake signature.
pub(crate) fn signed_connection_spec() -> ConnectionSpec {
    let keypair = Keypair::new(&Secp256k1::new(), &mut thread_rng());
    let payload = b"xchain handshake v1".to_vec();
    ConnectionSpec {
        signer: schnorr_signer_id(&keypair),
        handshake_proof: schnorr_sign(&keypair, &payload).to_vec(),
        handshake_payload: payload,
        ..connection_spec()
    }
}

/// A connection record in the given status, for state machine tests.
pub(crate) fn connection_in(status: ConnectionStatus) -> ChainConnection {
    ChainConnection {
        id: "conn-1".to_string(),
        spec: connection_spec(),
        status,
        created_at: epoch(),
        updated_at: epoch(),
        opened_at: epoch(),
        closed_at: status.is_terminal().then(epoch),
        closing_reason: None,
        last_heartbeat: epoch(),
        heartbeat_interval: Duration::from_secs(10),
        faults: Vec::new(),
    }
}

/// A [`ConnectionSnapshotSource`] backed by a plain map.
#[derive(Debug, Default)]
pub(crate) struct StubConnectionSource {
    connections: Mutex<HashMap<String, ChainConnection>>,
}

impl StubConnectionSource {
    pub(crate) fn with(self, id: &str, status: ConnectionStatus) -> Self {
        let mut conn = connection_in(status);
        conn.id = id.to_string();
        self.connections.lock().insert(id.to_string(), conn);
        self
    }

    pub(crate) fn set_status(&self, id: &str, status: ConnectionStatus) {
        if let Some(conn) = self.connections.lock().get_mut(id) {
            conn.status = status;
        }
    }
}

impl ConnectionSnapshotSource for StubConnectionSource {
    fn get_connection(&self, id: &str) -> Option<ChainConnection> {
        self.connections.lock().get(id).cloned()
    }
}

/// A contract link spec over `conn-1` that activates on registration.
pub(crate) fn contract_link_spec() -> ContractLinkSpec {
    ContractLinkSpec {
        local_chain: "synnergy-main".to_string(),
        local_address: "0xabc".to_string(),
        remote_chain: "ally-main".to_string(),
        remote_address: "0xdef".to_string(),
        connection_id: "conn-1".to_string(),
        capabilities: vec!["invoke".to_string(), "query".to_string()],
        gas_profile: "syn-default".to_string(),
        metadata: [("department".to_string(), "treasury".to_string())].into(),
        access_policy: AccessPolicy {
            allowed_approvers: vec!["alice".to_string(), "bob".to_string()],
            required_approvals: 0,
            privacy_level: "confidential".to_string(),
            encryption_scheme: "aes-gcm-256".to_string(),
        },
        audit_trail_hint: "ops".to_string(),
    }
}

/// [`contract_link_spec`] with a different local address and an approval quorum.
pub(crate) fn gated_link_spec(
    local_address: &str,
    required: u32,
    approvers: &[&str],
) -> ContractLinkSpec {
    let mut spec = contract_link_spec();
    spec.local_address = local_address.to_string();
    spec.access_policy.required_approvals = required;
    spec.access_policy.allowed_approvers = approvers.iter().map(|a| a.to_string()).collect();
    spec
}
