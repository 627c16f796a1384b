//! Shared building blocks for the cross-chain control plane.
//!
//! Nothing in here knows about bridges, connections or transfers. This crate provides the
//! injectable collaborators (clocks, signature verifiers), the content-addressed hashing used to
//! derive identifiers and the bounded, drop-on-full event fabric that every manager publishes
//! its lifecycle events through.

pub mod clock;
pub mod constants;
pub mod event_bus;
pub mod ids;
pub mod subscription;
pub mod verifier;
