//! The cross-chain interoperability control plane.
//!
//! The control plane lets a node register bridges to other ledgers, open authenticated logical
//! connections to remote chains, map local contracts to remote counterparts under multi-party
//! approval, and track the asset movements that cross those bridges.
//!
//! Every manager in this crate owns exactly one lock over its own entities and never reaches
//! into another manager's state. Cross-manager lookups go through narrow read-only interfaces
//! such as [`contract_link::ConnectionSnapshotSource`]. Values handed to and returned from a
//! manager are always owned copies. Lifecycle events are published after the manager's lock has
//! been released, in the order in which they were produced.
//!
//! Nothing in here spawns tasks or timers. Heartbeat evaluation and expiry sweeps are driven by
//! an external caller through [`ControlPlane::run_maintenance`].

pub mod bridge;
pub mod config;
pub mod connection;
pub mod constants;
pub mod contract_link;
pub mod control_plane;
pub mod errors;
pub mod protocol;
pub mod state_machine;
pub mod transaction;
pub mod transfer;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use control_plane::{ControlPlane, MaintenanceReport};
pub use errors::ErrorKind;
