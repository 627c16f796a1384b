//! Provides utilities to initialize logging.
use std::env;

use tracing::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Environment variable name for the service label, which is appended to the
/// whoami string.
pub const SVC_LABEL_ENVVAR: &str = "XCHAIN_SVC_LABEL";

/// Environment variable that enables the source file in every log line when set to `1`.
pub const LOG_FILE_ENVVAR: &str = "LOG_FILE";

/// Environment variable that enables the line number in every log line when set to `1`.
pub const LOG_LINE_NUM_ENVVAR: &str = "LOG_LINE_NUM";

/// Configuration for the logger.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// The whoami string, which is used to identify the service in logs.
    whoami: String,

    /// Whether to print the source file of each event.
    with_file: bool,

    /// Whether to print the line number of each event.
    with_line_number: bool,
}

impl LoggerConfig {
    /// Creates a new instance with whoami set and the file/line toggles read from the
    /// environment.
    pub fn new(whoami: String) -> Self {
        Self {
            whoami,
            with_file: env_flag(LOG_FILE_ENVVAR),
            with_line_number: env_flag(LOG_LINE_NUM_ENVVAR),
        }
    }

    /// Creates a new instance with the whoami string set to the provided
    /// string.
    pub fn with_base_name(s: &str) -> Self {
        Self::new(get_whoami_string(s))
    }

    /// Forces the source file to be printed (or not) regardless of the environment.
    ///
    /// Useful for a builder pattern with dotchaining.
    pub fn with_file(mut self, enabled: bool) -> Self {
        self.with_file = enabled;
        self
    }

    /// Forces the line number to be printed (or not) regardless of the environment.
    ///
    /// Useful for a builder pattern with dotchaining.
    pub fn with_line_number(mut self, enabled: bool) -> Self {
        self.with_line_number = enabled;
        self
    }

    /// The whoami string this logger identifies itself with.
    pub fn whoami(&self) -> &str {
        &self.whoami
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::with_base_name("(xchain)")
    }
}

/// Initializes the logging subsystem with the provided config.
///
/// Filtering is controlled through `RUST_LOG`.
///
/// # Panics
///
/// If a global subscriber has already been installed.
pub fn init(config: LoggerConfig) {
    let filt = tracing_subscriber::EnvFilter::from_default_env();

    // Stdout logging.
    let stdout_sub = tracing_subscriber::fmt::layer()
        .compact()
        .event_format(
            tracing_subscriber::fmt::format()
                .with_file(config.with_file)
                .with_line_number(config.with_line_number),
        )
        .with_filter(filt);

    tracing_subscriber::registry().with(stdout_sub).init();

    info!(whoami = %config.whoami, "logging started");
}

/// Gets the service label from the standard envvar, which should be included
/// in the whoami string.
pub fn get_service_label_from_env() -> Option<String> {
    env::var(SVC_LABEL_ENVVAR).ok()
}

/// Computes a standard whoami string.
pub fn get_whoami_string(base: &str) -> String {
    match get_service_label_from_env() {
        Some(label) => format!("{base}%{label}"),
        None => base.to_owned(),
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name).is_ok_and(|v| v == "1")
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn whoami_without_label_is_base() {
        env::remove_var(SVC_LABEL_ENVVAR);
        assert_eq!(get_whoami_string("operator"), "operator");
    }

    #[test]
    #[serial]
    fn whoami_appends_label() {
        env::set_var(SVC_LABEL_ENVVAR, "eu-1");
        let whoami = get_whoami_string("operator");
        env::remove_var(SVC_LABEL_ENVVAR);

        assert_eq!(whoami, "operator%eu-1");
    }

    #[test]
    #[serial]
    fn toggles_follow_env_and_overrides() {
        env::set_var(LOG_FILE_ENVVAR, "1");
        env::remove_var(LOG_LINE_NUM_ENVVAR);

        let config = LoggerConfig::new("svc".to_string());
        assert!(config.with_file);
        assert!(!config.with_line_number);

        let config = config.with_file(false).with_line_number(true);
        assert!(!config.with_file);
        assert!(config.with_line_number);
        assert_eq!(config.whoami(), "svc");

        env::remove_var(LOG_FILE_ENVVAR);
    }
}
