//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to log lines
    pub service_name: String,

    /// `EnvFilter` directive, e.g. `info` or `lc_02_event_correlator=debug`
    pub log_level: String,

    /// Emit JSON lines instead of the human-readable format
    pub json_logs: bool,

    /// Write to stderr so stdout stays clean for script output
    pub stderr: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "ledger-confirm".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            stderr: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LC_SERVICE_NAME`: Service name (default: ledger-confirm)
    /// - `LC_LOG_LEVEL` or `RUST_LOG`: Filter directive (default: info)
    /// - `LC_JSON_LOGS`: `true`/`1` for JSON output (default: false)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            service_name: lookup("LC_SERVICE_NAME").unwrap_or(defaults.service_name),
            log_level: lookup("LC_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.log_level),
            json_logs: lookup("LC_JSON_LOGS")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(defaults.json_logs),
            stderr: defaults.stderr,
        }
    }

    /// Override the filter, e.g. from a `--log-level` flag.
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = TelemetryConfig::from_lookup(lookup(&[]));
        assert_eq!(config, TelemetryConfig::default());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_lc_log_level_wins_over_rust_log() {
        let config = TelemetryConfig::from_lookup(lookup(&[
            ("RUST_LOG", "warn"),
            ("LC_LOG_LEVEL", "debug"),
            ("LC_JSON_LOGS", "1"),
        ]));
        assert_eq!(config.log_level, "debug");
        assert!(config.json_logs);

        let config = TelemetryConfig::from_lookup(lookup(&[("RUST_LOG", "warn")]));
        assert_eq!(config.log_level, "warn");
    }
}
