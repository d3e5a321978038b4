//! Telemetry configuration from environment variables.

use std::env;

/// Logging and metrics settings for one service process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name stamped on every log line
    pub service_name: String,

    /// Log level filter, in `EnvFilter` syntax (e.g. `info,seascape_bus=debug`)
    pub log_level: String,

    /// Emit JSON lines instead of human-readable text
    pub json_logs: bool,

    /// Include span/target metadata in text output
    pub with_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "seascape".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            with_target: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SEASCAPE_SERVICE_NAME` or `OTEL_SERVICE_NAME`: Service name (default: seascape)
    /// - `SEASCAPE_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `SEASCAPE_JSON_LOGS`: JSON output (default: false outside containers)
    /// - `SEASCAPE_LOG_TARGET`: Print log targets (default: true)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("SEASCAPE_SERVICE_NAME")
                .or_else(|_| env::var("OTEL_SERVICE_NAME"))
                .unwrap_or_else(|_| "seascape".to_string()),

            log_level: env::var("SEASCAPE_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("SEASCAPE_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            with_target: env::var("SEASCAPE_LOG_TARGET")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),
        }
    }

    /// Environment config with the service name fixed by the caller.
    pub fn for_service(service_name: &str) -> Self {
        let mut config = Self::from_env();
        config.service_name = service_name.to_string();
        config
    }

    #[must_use]
    pub fn with_log_level(mut self, log_level: impl Into<String>) -> Self {
        self.log_level = log_level.into();
        self
    }
}
