//! # Reliable Request-Reply Transport
//!
//! Bounded-wait retry over a request socket:
//!
//! ```text
//! SEND ──▶ WAIT(request_timeout) ──┬─▶ reply ok    ──▶ return params
//!  ▲                               ├─▶ reply fail  ──▶ Application error
//!  │                               └─▶ timeout / I/O error
//!  └──────── RECONNECT ◀───────────────┘
//! ```
//!
//! A timed-out REQ socket cannot be reused, so every retry discards the
//! socket and dials a fresh one to the same endpoint. With the default
//! configuration the loop never gives up; set
//! [`TransportConfig::max_attempts`] to bound it.

use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::ports::{Dialer, RequestSocket};
use crate::registry::{Endpoint, EndpointResolver};
use seascape_telemetry::{
    HistogramTimer, APPLICATION_FAILURES, RECONNECTS, REQUESTS_SENT, REQUEST_DURATION,
    REQUEST_TIMEOUTS,
};
use seascape_types::{EnvelopeError, Params, Reply, Request};
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Counters for one client's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Request frames written, one per SEND
    pub sends: u64,
    /// Sockets replaced after a timeout or I/O error
    pub reconnects: u64,
    /// Sockets successfully opened
    pub dials: u64,
}

// ============================================================================
// ReliableClient
// ============================================================================

/// Request-reply client bound to one endpoint.
///
/// Holds at most one socket. `&mut self` on every call means a client
/// serves one request at a time; share it behind a `tokio::sync::Mutex` or
/// create one client per task.
pub struct ReliableClient {
    endpoint: Endpoint,
    dialer: Arc<dyn Dialer>,
    config: TransportConfig,
    socket: Option<Box<dyn RequestSocket>>,
    /// Set when a socket was discarded, so the next dial counts as a reconnect
    discarded: bool,
    stats: SessionStats,
}

enum Attempt {
    Reply(Vec<u8>),
    Retry,
}

impl ReliableClient {
    /// Create a client. The socket is dialed on first use.
    #[must_use]
    pub fn new(endpoint: Endpoint, dialer: Arc<dyn Dialer>, config: TransportConfig) -> Self {
        Self {
            endpoint,
            dialer,
            config,
            socket: None,
            discarded: false,
            stats: SessionStats::default(),
        }
    }

    /// Create a client for a named service.
    ///
    /// Fails with [`TransportError::Config`] when the name is unknown.
    pub fn for_service(
        resolver: &dyn EndpointResolver,
        service: &str,
        dialer: Arc<dyn Dialer>,
        config: TransportConfig,
    ) -> Result<Self, TransportError> {
        let endpoint = resolver.resolve(service)?;
        Ok(Self::new(endpoint, dialer, config))
    }

    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    #[must_use]
    pub fn service(&self) -> &str {
        &self.endpoint.name
    }

    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Dial eagerly instead of on the first request.
    pub async fn connect(&mut self) -> Result<(), TransportError> {
        if self.socket.is_some() {
            return Ok(());
        }
        let socket = self
            .dialer
            .dial(&self.endpoint)
            .await
            .map_err(|source| TransportError::Socket {
                service: self.endpoint.name.clone(),
                source,
            })?;
        self.install(socket);
        Ok(())
    }

    /// Send a request and return the reply parameters.
    pub async fn request(&mut self, request: &Request) -> Result<Params, TransportError> {
        self.exchange(request, None).await.map(|reply| reply.params)
    }

    /// Send a request and return the whole ok reply, message included.
    pub async fn request_reply(&mut self, request: &Request) -> Result<Reply, TransportError> {
        self.exchange(request, None).await
    }

    /// Like [`request`](Self::request), abandoned when `cancel` fires.
    pub async fn request_until(
        &mut self,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<Params, TransportError> {
        self.exchange(request, Some(cancel))
            .await
            .map(|reply| reply.params)
    }

    async fn exchange(
        &mut self,
        request: &Request,
        cancel: Option<&CancellationToken>,
    ) -> Result<Reply, TransportError> {
        let service = self.endpoint.name.clone();
        let command = request.command.clone();
        let frame = request
            .encode()
            .map_err(|source| self.envelope_error(source))?;

        let timer = HistogramTimer::new(&REQUEST_DURATION);
        let mut attempt: u32 = 0;

        loop {
            if let Some(max) = self.config.max_attempts {
                if attempt >= max {
                    timer.discard();
                    warn!(
                        service = %service,
                        command = %command,
                        attempts = attempt,
                        "Giving up on request"
                    );
                    return Err(TransportError::RetriesExhausted {
                        service,
                        command,
                        attempts: attempt,
                    });
                }
            }
            attempt += 1;

            let outcome = match cancel {
                Some(token) if token.is_cancelled() => None,
                Some(token) => tokio::select! {
                    _ = token.cancelled() => None,
                    outcome = self.attempt(&frame, &command, attempt) => Some(outcome),
                },
                None => Some(self.attempt(&frame, &command, attempt).await),
            };

            let bytes = match outcome {
                Some(Attempt::Reply(bytes)) => bytes,
                Some(Attempt::Retry) => continue,
                None => {
                    // An interrupted REQ socket is mid-exchange and unusable
                    self.discard();
                    timer.discard();
                    debug!(service = %service, command = %command, "Request cancelled");
                    return Err(TransportError::Cancelled { service, command });
                }
            };

            let reply = match Reply::decode(&bytes) {
                Ok(reply) => reply,
                Err(source) => {
                    timer.discard();
                    warn!(service = %service, command = %command, error = %source, "Malformed reply");
                    return Err(TransportError::Decode { service, source });
                }
            };

            if !reply.is_ok() {
                timer.discard();
                APPLICATION_FAILURES
                    .with_label_values(&[service.as_str(), command.as_str()])
                    .inc();
                debug!(
                    service = %service,
                    command = %command,
                    message = %reply.message,
                    "Request rejected"
                );
                return Err(TransportError::Application {
                    service,
                    command,
                    message: reply.message,
                });
            }

            debug!(service = %service, command = %command, attempt, "Reply received");
            return Ok(reply);
        }
    }

    /// One SEND/WAIT cycle.
    async fn attempt(&mut self, frame: &[u8], command: &str, attempt: u32) -> Attempt {
        if self.socket.is_none() {
            let dialed = timeout(self.config.request_timeout, self.dialer.dial(&self.endpoint)).await;
            match dialed {
                Ok(Ok(socket)) => self.install(socket),
                Ok(Err(e)) => {
                    warn!(service = %self.endpoint.name, attempt, error = %e, "Dial failed");
                    sleep(self.config.reconnect_delay).await;
                    return Attempt::Retry;
                }
                Err(_) => {
                    warn!(service = %self.endpoint.name, attempt, "Dial timed out");
                    sleep(self.config.reconnect_delay).await;
                    return Attempt::Retry;
                }
            }
        }
        let Some(socket) = self.socket.as_mut() else {
            return Attempt::Retry;
        };

        self.stats.sends += 1;
        REQUESTS_SENT
            .with_label_values(&[self.endpoint.name.as_str(), command])
            .inc();

        // A stale peer can leave the send parked on its queue
        let sent = timeout(self.config.request_timeout, socket.send(frame.to_vec())).await;
        let failure = match sent {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some("send timed out".to_string()),
        };
        if let Some(error) = failure {
            warn!(
                service = %self.endpoint.name,
                command = %command,
                attempt,
                error = %error,
                "Send failed; reconnecting"
            );
            self.discard();
            return Attempt::Retry;
        }

        let received = timeout(self.config.request_timeout, socket.recv()).await;
        match received {
            Ok(Ok(bytes)) => Attempt::Reply(bytes),
            Ok(Err(e)) => {
                warn!(
                    service = %self.endpoint.name,
                    command = %command,
                    attempt,
                    error = %e,
                    "Receive failed; reconnecting"
                );
                self.discard();
                Attempt::Retry
            }
            Err(_) => {
                warn!(
                    service = %self.endpoint.name,
                    command = %command,
                    attempt,
                    timeout_ms = self.config.request_timeout.as_millis() as u64,
                    "No reply within timeout; reconnecting"
                );
                REQUEST_TIMEOUTS
                    .with_label_values(&[self.endpoint.name.as_str(), command])
                    .inc();
                self.discard();
                Attempt::Retry
            }
        }
    }

    fn install(&mut self, socket: Box<dyn RequestSocket>) {
        if self.discarded {
            self.stats.reconnects += 1;
            RECONNECTS
                .with_label_values(&[self.endpoint.name.as_str()])
                .inc();
            self.discarded = false;
        }
        self.stats.dials += 1;
        self.socket = Some(socket);
    }

    fn discard(&mut self) {
        if self.socket.take().is_some() {
            self.discarded = true;
        }
    }

    fn envelope_error(&self, source: EnvelopeError) -> TransportError {
        TransportError::Decode {
            service: self.endpoint.name.clone(),
            source,
        }
    }
}
