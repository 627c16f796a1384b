//! Handshake signature verification.
//!
//! The control plane never assumes a signature scheme. Callers inject a [`SignatureVerifier`];
//! a BIP-340 Schnorr implementation over secp256k1 is provided for operators that have no
//! scheme of their own.

use std::{fmt, str::FromStr};

use async_trait::async_trait;
use secp256k1::{schnorr, Keypair, Message, XOnlyPublicKey, SECP256K1};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::constants::SCHNORR_SIGNATURE_LEN;

/// Errors reported by a [`SignatureVerifier`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// The signer identifier could not be interpreted as a key.
    #[error("malformed signer {signer}: {reason}")]
    MalformedSigner {
        /// The offending signer identifier.
        signer: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The signature bytes are not a valid encoding.
    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    /// The signature is well-formed but does not match the payload and signer.
    #[error("signature does not match payload")]
    Mismatch,

    /// The verifier could not reach a decision, e.g. a remote key service is down.
    #[error("verifier unavailable: {0}")]
    Unavailable(String),
}

/// Verifies that `signature` over `payload` was produced by `signer`.
#[async_trait]
pub trait SignatureVerifier: Send + Sync + fmt::Debug {
    /// Returns `Ok(())` only if the signature is valid.
    async fn verify(&self, payload: &[u8], signature: &[u8], signer: &str)
        -> Result<(), VerifyError>;
}

/// BIP-340 Schnorr verification over secp256k1.
///
/// The signer is the hex-encoded x-only public key and the signed message is
/// `SHA-256(payload)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchnorrVerifier;

impl SchnorrVerifier {
    fn verify_sync(payload: &[u8], signature: &[u8], signer: &str) -> Result<(), VerifyError> {
        let pubkey =
            XOnlyPublicKey::from_str(signer).map_err(|e| VerifyError::MalformedSigner {
                signer: signer.to_string(),
                reason: e.to_string(),
            })?;

        if signature.len() != SCHNORR_SIGNATURE_LEN {
            return Err(VerifyError::MalformedSignature(format!(
                "expected {SCHNORR_SIGNATURE_LEN} bytes, got {}",
                signature.len()
            )));
        }
        let sig = schnorr::Signature::from_slice(signature)
            .map_err(|e| VerifyError::MalformedSignature(e.to_string()))?;

        SECP256K1
            .verify_schnorr(&sig, &handshake_message(payload), &pubkey)
            .map_err(|_| VerifyError::Mismatch)
    }
}

#[async_trait]
impl SignatureVerifier for SchnorrVerifier {
    async fn verify(
        &self,
        payload: &[u8],
        signature: &[u8],
        signer: &str,
    ) -> Result<(), VerifyError> {
        Self::verify_sync(payload, signature, signer)
    }
}

/// Produces the signature [`SchnorrVerifier`] expects for `payload`.
pub fn schnorr_sign(keypair: &Keypair, payload: &[u8]) -> [u8; SCHNORR_SIGNATURE_LEN] {
    SECP256K1
        .sign_schnorr_no_aux_rand(&handshake_message(payload), keypair)
        .serialize()
}

/// Hex encoding of the x-only public key of `keypair`, i.e. the signer identifier
/// [`SchnorrVerifier`] understands.
pub fn schnorr_signer_id(keypair: &Keypair) -> String {
    keypair.x_only_public_key().0.to_string()
}

fn handshake_message(payload: &[u8]) -> Message {
    Message::from_digest(Sha256::digest(payload).into())
}

/// Adapts a closure into a [`SignatureVerifier`].
pub struct FnVerifier<F> {
    f: F,
}

impl<F> FnVerifier<F>
where
    F: Fn(&[u8], &[u8], &str) -> Result<(), VerifyError> + Send + Sync,
{
    /// Wraps `f`.
    pub const fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> fmt::Debug for FnVerifier<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnVerifier")
    }
}

#[async_trait]
impl<F> SignatureVerifier for FnVerifier<F>
where
    F: Fn(&[u8], &[u8], &str) -> Result<(), VerifyError> + Send + Sync,
{
    async fn verify(
        &self,
        payload: &[u8],
        signature: &[u8],
        signer: &str,
    ) -> Result<(), VerifyError> {
        (self.f)(payload, signature, signer)
    }
}
