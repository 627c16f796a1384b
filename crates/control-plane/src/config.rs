//! Configuration for the control plane managers.
//!
//! Every setting has a documented default. Construct a config with [`Default::default`] and
//! override what you need with the `with_*` methods, or deserialize [`ControlPlaneConfig`] from a
//! TOML file where every missing key falls back to its default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    constants::{
        DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_MISSED_HEARTBEAT_TOLERANCE, DEFAULT_PROTOCOL_VERSION,
    },
    errors::ConfigError,
};

/// Configuration for the [`ProtocolRegistry`](crate::protocol::ProtocolRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolRegistryConfig {
    /// Version assigned when a protocol is registered without one, defaults to
    /// [`DEFAULT_PROTOCOL_VERSION`].
    pub(crate) default_version: String,
}

impl ProtocolRegistryConfig {
    /// Updates the default protocol version and returns the updated config.
    ///
    /// Useful for a builder pattern with dotchaining.
    pub fn with_default_version(mut self, version: &str) -> Self {
        self.default_version = version.to_string();
        self
    }

    /// Checks the config for values the registry cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_version.trim().is_empty() {
            return Err(ConfigError::Empty("protocols.default_version"));
        }
        Ok(())
    }
}

impl Default for ProtocolRegistryConfig {
    fn default() -> Self {
        Self {
            default_version: DEFAULT_PROTOCOL_VERSION.to_string(),
        }
    }
}

/// Configuration for the [`ConnectionManager`](crate::connection::ConnectionManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionManagerConfig {
    /// Heartbeat interval for connections whose spec leaves it unset, defaults to
    /// [`DEFAULT_HEARTBEAT_INTERVAL`].
    pub(crate) default_heartbeat_interval: Duration,

    /// Number of consecutive heartbeat intervals a connection may miss before the health check
    /// fails it, defaults to [`DEFAULT_MISSED_HEARTBEAT_TOLERANCE`].
    pub(crate) missed_heartbeat_tolerance: u32,
}

impl ConnectionManagerConfig {
    /// Updates the default heartbeat interval and returns the updated config.
    ///
    /// Useful for a builder pattern with dotchaining.
    pub fn with_default_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.default_heartbeat_interval = interval;
        self
    }

    /// Updates the missed heartbeat tolerance and returns the updated config.
    ///
    /// Useful for a builder pattern with dotchaining.
    pub fn with_missed_heartbeat_tolerance(mut self, n: u32) -> Self {
        self.missed_heartbeat_tolerance = n;
        self
    }

    /// Heartbeat interval applied when a spec does not set one.
    pub const fn default_heartbeat_interval(&self) -> Duration {
        self.default_heartbeat_interval
    }

    /// Number of intervals a connection may miss.
    pub const fn missed_heartbeat_tolerance(&self) -> u32 {
        self.missed_heartbeat_tolerance
    }

    /// Checks the config for values the manager cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_heartbeat_interval.is_zero() {
            return Err(ConfigError::Zero("connections.default_heartbeat_interval"));
        }
        if self.missed_heartbeat_tolerance == 0 {
            return Err(ConfigError::Zero("connections.missed_heartbeat_tolerance"));
        }
        Ok(())
    }
}

impl Default for ConnectionManagerConfig {
    fn default() -> Self {
        Self {
            default_heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            missed_heartbeat_tolerance: DEFAULT_MISSED_HEARTBEAT_TOLERANCE,
        }
    }
}

/// Configuration for the [`ContractLinkManager`](crate::contract_link::ContractLinkManager).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractLinkManagerConfig {
    /// Refuse to build a manager that has no connection source to validate links against.
    /// Defaults to `false`.
    pub(crate) require_connection_source: bool,
}

impl ContractLinkManagerConfig {
    /// Requires (or not) a connection source at construction and returns the updated config.
    ///
    /// Useful for a builder pattern with dotchaining.
    pub fn with_require_connection_source(mut self, required: bool) -> Self {
        self.require_connection_source = required;
        self
    }
}

/// Configuration for the [`BridgeTransferManager`](crate::transfer::BridgeTransferManager).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferManagerConfig {
    /// Expiry applied to deposits that do not carry one, measured from the deposit time.
    /// Defaults to `None`, meaning such deposits never expire.
    pub(crate) default_expiry: Option<Duration>,
}

impl TransferManagerConfig {
    /// Updates the default deposit expiry and returns the updated config.
    ///
    /// Useful for a builder pattern with dotchaining.
    pub fn with_default_expiry(mut self, expiry: Duration) -> Self {
        self.default_expiry = Some(expiry);
        self
    }

    /// The expiry applied to deposits without an explicit one.
    pub const fn default_expiry(&self) -> Option<Duration> {
        self.default_expiry
    }

    /// Checks the config for values the manager cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_expiry.is_some_and(|d| d.is_zero()) {
            return Err(ConfigError::Zero("transfers.default_expiry"));
        }
        Ok(())
    }
}

/// Configuration for every manager of a [`ControlPlane`](crate::ControlPlane).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPlaneConfig {
    /// Protocol registry settings.
    pub protocols: ProtocolRegistryConfig,

    /// Connection manager settings.
    pub connections: ConnectionManagerConfig,

    /// Contract link manager settings.
    pub contract_links: ContractLinkManagerConfig,

    /// Transfer manager settings.
    pub transfers: TransferManagerConfig,
}

impl ControlPlaneConfig {
    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.protocols.validate()?;
        self.connections.validate()?;
        self.transfers.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ControlPlaneConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.connections.default_heartbeat_interval(),
            Duration::from_secs(30)
        );
        assert_eq!(config.connections.missed_heartbeat_tolerance(), 3);
        assert_eq!(config.protocols.default_version, "v1");
        assert_eq!(config.transfers.default_expiry(), None);
    }

    #[test]
    fn zero_values_are_rejected() {
        let config = ConnectionManagerConfig::default().with_missed_heartbeat_tolerance(0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero("connections.missed_heartbeat_tolerance"))
        );

        let config =
            ConnectionManagerConfig::default().with_default_heartbeat_interval(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = TransferManagerConfig::default().with_default_expiry(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = ProtocolRegistryConfig::default().with_default_version("  ");
        assert_eq!(
            config.validate(),
            Err(ConfigError::Empty("protocols.default_version"))
        );
    }

    #[test]
    fn toml_roundtrip() {
        let config = ControlPlaneConfig {
            connections: ConnectionManagerConfig::default()
                .with_default_heartbeat_interval(Duration::from_secs(10))
                .with_missed_heartbeat_tolerance(5),
            transfers: TransferManagerConfig::default()
                .with_default_expiry(Duration::from_secs(3600)),
            contract_links: ContractLinkManagerConfig::default()
                .with_require_connection_source(true),
            ..Default::default()
        };

        let serialized = toml::to_string(&config).expect("must serialize");
        let deserialized: ControlPlaneConfig =
            toml::from_str(&serialized).expect("must deserialize");

        assert_eq!(config, deserialized);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let raw = r#"
            [connections]
            missed_heartbeat_tolerance = 7
        "#;

        let config: ControlPlaneConfig = toml::from_str(raw).expect("must deserialize");
        assert_eq!(config.connections.missed_heartbeat_tolerance(), 7);
        assert_eq!(
            config.connections.default_heartbeat_interval(),
            Duration::from_secs(30)
        );
        assert_eq!(config.protocols, ProtocolRegistryConfig::default());
    }
}
