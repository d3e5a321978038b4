//! # Bus Errors
//!
//! One error enum per concern. Timeouts never appear here: the transport
//! absorbs them and retries.

use seascape_types::EnvelopeError;
use thiserror::Error;

/// Frame-level socket failures reported by adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SocketError {
    #[error("failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("failed to bind {endpoint}: {reason}")]
    Bind { endpoint: String, reason: String },

    #[error("socket I/O error: {0}")]
    Io(String),

    #[error("socket closed")]
    Closed,
}

/// Endpoint lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("unknown service '{0}'")]
    UnknownService(String),

    #[error("no service registered with public key '{0}'")]
    UnknownPublicKey(String),

    #[error("duplicate endpoint name '{0}'")]
    Duplicate(String),

    #[error("service '{0}' has no broadcast port")]
    NoBroadcastPort(String),
}

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {error}")]
    Io { path: String, error: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors surfaced by [`ReliableClient`](crate::ReliableClient) calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The target could not be resolved. Never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// A request could not be encoded or its reply was not a valid
    /// envelope. Never retried.
    #[error("invalid envelope exchanged with {service}: {source}")]
    Decode {
        service: String,
        #[source]
        source: EnvelopeError,
    },

    /// The remote service answered with status `fail`.
    #[error("{service} rejected '{command}': {message}")]
    Application {
        service: String,
        command: String,
        message: String,
    },

    /// A bounded retry policy ran out of attempts.
    #[error("{service} did not answer '{command}' after {attempts} attempt(s)")]
    RetriesExhausted {
        service: String,
        command: String,
        attempts: u32,
    },

    /// An explicit connect failed.
    #[error("socket error on {service}: {source}")]
    Socket {
        service: String,
        #[source]
        source: SocketError,
    },

    /// The call was abandoned because its cancellation token fired.
    #[error("request '{command}' to {service} cancelled")]
    Cancelled { service: String, command: String },
}

impl TransportError {
    /// True for `status: fail` replies, which carry an application message.
    #[must_use]
    pub fn is_application(&self) -> bool {
        matches!(self, Self::Application { .. })
    }
}

impl From<RegistryError> for TransportError {
    fn from(e: RegistryError) -> Self {
        Self::Config(e.to_string())
    }
}

/// Publisher failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublisherError {
    /// The publish socket rejected a frame. Fatal to the publisher loop.
    #[error("failed to send broadcast on '{topic}': {source}")]
    Send {
        topic: String,
        #[source]
        source: SocketError,
    },

    /// The publisher loop has stopped.
    #[error("publisher closed")]
    Closed,

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}
