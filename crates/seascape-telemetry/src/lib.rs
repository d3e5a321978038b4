//! # Seascape Telemetry
//!
//! Logging and metrics for services on the Seascape bus.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use seascape_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::for_service("categorizer"))?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SEASCAPE_SERVICE_NAME` | `seascape` | Service name on log lines |
//! | `SEASCAPE_LOG_LEVEL` | `info` | `EnvFilter` directives (falls back to `RUST_LOG`) |
//! | `SEASCAPE_JSON_LOGS` | `false` | JSON log lines |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{build_filter, init_logging};
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, MetricsHandle, APPLICATION_FAILURES,
    BROADCASTS_PUBLISHED, BROADCASTS_RECEIVED, HEARTBEATS_SENT, RECONNECTS, REQUESTS_SENT,
    REQUEST_DURATION, REQUEST_TIMEOUTS, SUBSCRIPTION_FAILURES,
    topic_scope,
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

/// Initialize logging and register metrics.
///
/// Returns a guard that must be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics_handle = register_metrics()?;
    init_logging(&config)?;

    Ok(TelemetryGuard {
        _metrics: metrics_handle,
        service_name: config.service_name,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _metrics: MetricsHandle,
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}
