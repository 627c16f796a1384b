//! Reusable utilities for the services built on top of the cross-chain control plane.
//! Such as initializing the tracing framework and whatever else.

pub mod logging;

// Re-export tracing crate for convenience.
pub use tracing;
