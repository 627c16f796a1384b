//! Content-addressed identifier derivation.
//!
//! Identifiers are lower-case hex SHA-256 digests over length-prefixed fields, so two specs that
//! are equal after normalization always hash to the same identifier and no two distinct field
//! sequences can collide by shifting bytes between adjacent fields.

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicU64, Ordering},
};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Incremental builder for a content-addressed identifier.
///
/// Every builder starts with a domain tag so that, for example, a bridge and a transfer built from
/// the same strings can never share an identifier.
#[derive(Debug, Clone)]
pub struct IdHasher {
    hasher: Sha256,
}

impl IdHasher {
    /// Starts a new identifier in the given domain.
    pub fn new(domain: &str) -> Self {
        let mut this = Self {
            hasher: Sha256::new(),
        };
        this.push(domain.as_bytes());
        this
    }

    /// Appends a field.
    pub fn field(mut self, value: impl AsRef<[u8]>) -> Self {
        self.push(value.as_ref());
        self
    }

    /// Appends a string map in key order.
    pub fn map_field(mut self, map: &BTreeMap<String, String>) -> Self {
        self.push(&(map.len() as u64).to_be_bytes());
        for (k, v) in map {
            self.push(k.as_bytes());
            self.push(v.as_bytes());
        }
        self
    }

    /// Appends a list of strings, preserving order.
    pub fn list_field<S: AsRef<str>>(mut self, items: &[S]) -> Self {
        self.push(&(items.len() as u64).to_be_bytes());
        for item in items {
            self.push(item.as_ref().as_bytes());
        }
        self
    }

    /// Appends a nonce.
    pub fn nonce(mut self, nonce: Nonce) -> Self {
        self.push(&nonce.to_bytes());
        self
    }

    /// Finishes the digest and returns it hex-encoded.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }

    fn push(&mut self, bytes: &[u8]) {
        self.hasher.update((bytes.len() as u64).to_be_bytes());
        self.hasher.update(bytes);
    }
}

/// A one-shot helper over [`IdHasher`] for a flat list of fields.
pub fn content_hash<I, P>(domain: &str, parts: I) -> String
where
    I: IntoIterator<Item = P>,
    P: AsRef<[u8]>,
{
    parts
        .into_iter()
        .fold(IdHasher::new(domain), |hasher, part| hasher.field(part))
        .finish()
}

/// A creation nonce: the wall-clock timestamp plus a process-local sequence number.
///
/// Mixing a nonce into an identifier makes identical logical operations submitted within the same
/// clock tick still resolve to distinct identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce {
    /// Nanoseconds since the unix epoch.
    pub timestamp_nanos: i64,
    /// Monotone sequence number drawn from a [`NonceSource`].
    pub sequence: u64,
}

impl Nonce {
    /// Serializes the nonce for hashing.
    pub fn to_bytes(self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&self.timestamp_nanos.to_be_bytes());
        out[8..].copy_from_slice(&self.sequence.to_be_bytes());
        out
    }
}

/// Hands out [`Nonce`]s with a strictly increasing sequence number.
#[derive(Debug, Default)]
pub struct NonceSource {
    sequence: AtomicU64,
}

impl NonceSource {
    /// Creates a new source starting at zero.
    pub const fn new() -> Self {
        Self {
            sequence: AtomicU64::new(0),
        }
    }

    /// Draws the next nonce for an operation happening at `at`.
    pub fn next(&self, at: DateTime<Utc>) -> Nonce {
        Nonce {
            // out of range only past the year 2262
            timestamp_nanos: at.timestamp_nanos_opt().unwrap_or(i64::MAX),
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
        }
    }
}
