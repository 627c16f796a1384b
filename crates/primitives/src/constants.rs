//! This module provides the constant values used throughout the crate.

/// Length in bytes of a BIP-340 Schnorr signature.
pub const SCHNORR_SIGNATURE_LEN: usize = 64;
