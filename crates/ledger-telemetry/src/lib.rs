//! # Ledger Telemetry
//!
//! Logging and metrics for ledger-confirm binaries and scripts.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ledger_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_telemetry(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LC_LOG_LEVEL` / `RUST_LOG` | `info` | `EnvFilter` directive |
//! | `LC_JSON_LOGS` | `false` | JSON log lines |
//! | `LC_SERVICE_NAME` | `ledger-confirm` | Service name in logs |

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, record_confirm_stats, record_correlator_stats, register_metrics,
    HistogramTimer, CONFIRM_DURATION, LEDGER_HEAD,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Register metrics, then install the log subscriber.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    register_metrics()?;
    init_logging(config)
}
