//! Bus configuration with validation.
//!
//! Loaded from TOML. Every section has defaults, so an empty file is a
//! valid configuration with no endpoints.

use crate::error::ConfigError;
use crate::registry::{Endpoint, EndpointRegistry};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub transport: TransportConfig,
    pub subscriber: SubscriberConfig,
    pub endpoints: Vec<Endpoint>,
}

impl BusConfig {
    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse and validate TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.transport.validate()?;
        self.subscriber.validate()?;

        let mut seen = HashSet::new();
        for endpoint in &self.endpoints {
            if !seen.insert(endpoint.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate endpoint name '{}'",
                    endpoint.name
                )));
            }
        }
        Ok(())
    }

    /// Build the endpoint registry from `[[endpoints]]`.
    pub fn registry(&self) -> Result<EndpointRegistry, ConfigError> {
        EndpointRegistry::new(self.endpoints.iter().cloned())
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

/// Request-reply retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// How long to wait for a reply before reconnecting (default: 60s)
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Pause after a failed dial (default: 1s)
    #[serde(with = "humantime_serde")]
    pub reconnect_delay: Duration,
    /// Send/wait cycles before giving up. `None` retries forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            reconnect_delay: Duration::from_secs(1),
            max_attempts: None,
        }
    }
}

impl TransportConfig {
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "transport.request_timeout cannot be 0".into(),
            ));
        }
        if self.reconnect_delay.is_zero() {
            return Err(ConfigError::Invalid(
                "transport.reconnect_delay cannot be 0".into(),
            ));
        }
        if self.max_attempts == Some(0) {
            return Err(ConfigError::Invalid(
                "transport.max_attempts cannot be 0".into(),
            ));
        }
        Ok(())
    }
}

/// Subscriber session timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriberConfig {
    /// Period between heartbeats (default: 2s)
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,
    /// Settle time after the SUB connect (default: 100ms)
    #[serde(with = "humantime_serde")]
    pub connect_delay: Duration,
    /// Buffered broadcasts per subscription
    pub channel_capacity: usize,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(2),
            connect_delay: Duration::from_millis(100),
            channel_capacity: crate::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl SubscriberConfig {
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    #[must_use]
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "subscriber.heartbeat_interval cannot be 0".into(),
            ));
        }
        if self.connect_delay.is_zero() {
            return Err(ConfigError::Invalid(
                "subscriber.connect_delay cannot be 0".into(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "subscriber.channel_capacity cannot be 0".into(),
            ));
        }
        Ok(())
    }
}
