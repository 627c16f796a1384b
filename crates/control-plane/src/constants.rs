//! This module provides the constant values used throughout the crate.

use std::time::Duration;

/// Heartbeat interval assigned to connections whose spec does not carry one.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// How many heartbeat intervals may be missed before a connection is failed.
pub const DEFAULT_MISSED_HEARTBEAT_TOLERANCE: u32 = 3;

/// Version assigned to protocols registered without an explicit version.
pub const DEFAULT_PROTOCOL_VERSION: &str = "v1";

/// Fault code recorded when a connection misses too many heartbeats.
pub const HEARTBEAT_TIMEOUT_FAULT_CODE: &str = "HEARTBEAT_TIMEOUT";
