//! # Subscriber Session
//!
//! A subscription is a request-reply handshake followed by two loops that
//! share one cancellation token:
//!
//! ```text
//!  connect SUB ─▶ settle ─▶ subscribe ──ok──▶ ┌─ heartbeat loop ──fail──┐
//!                               │             │                         ▼
//!                              fail           └─ receive loop ◀── control channel
//!                               ▼                    │
//!                        one fail Broadcast      Broadcasts ─▶ Subscription
//! ```
//!
//! Every failure reaches the consumer as exactly one Broadcast whose reply
//! has status `fail`, after which the stream ends. Cancelling the
//! [`Subscription`] (or dropping it) ends the session with no failure.

use crate::config::{SubscriberConfig, TransportConfig};
use crate::error::TransportError;
use crate::ports::{BroadcastConnector, BroadcastSource, Dialer};
use crate::registry::{Endpoint, EndpointResolver};
use crate::transport::ReliableClient;
use seascape_telemetry::{BROADCASTS_RECEIVED, HEARTBEATS_SENT, SUBSCRIPTION_FAILURES};
use seascape_types::{Broadcast, Reply, Request, TopicFilter};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep, timeout, Instant, MissedTickBehavior};
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Handshake command.
pub const SUBSCRIBE_COMMAND: &str = "subscribe";

/// Liveness command.
pub const HEARTBEAT_COMMAND: &str = "heartbeat";

/// Opens subscriptions against one publishing service.
#[derive(Clone)]
pub struct Subscriber {
    endpoint: Endpoint,
    dialer: Arc<dyn Dialer>,
    connector: Arc<dyn BroadcastConnector>,
    transport: TransportConfig,
    config: SubscriberConfig,
    address: String,
}

impl Subscriber {
    /// Create a subscriber with default timing and a random address.
    #[must_use]
    pub fn new(
        endpoint: Endpoint,
        dialer: Arc<dyn Dialer>,
        connector: Arc<dyn BroadcastConnector>,
    ) -> Self {
        Self {
            endpoint,
            dialer,
            connector,
            transport: TransportConfig::default(),
            config: SubscriberConfig::default(),
            address: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Create a subscriber for a named service.
    pub fn for_service(
        resolver: &dyn EndpointResolver,
        service: &str,
        dialer: Arc<dyn Dialer>,
        connector: Arc<dyn BroadcastConnector>,
    ) -> Result<Self, TransportError> {
        Ok(Self::new(resolver.resolve(service)?, dialer, connector))
    }

    #[must_use]
    pub fn with_transport_config(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: SubscriberConfig) -> Self {
        self.config = config;
        self
    }

    /// Address reported to the publisher in `subscribe` and `heartbeat`.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Start a session. Must be called within a Tokio runtime.
    #[must_use]
    pub fn subscribe(&self, filter: TopicFilter) -> Subscription {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let cancel = CancellationToken::new();
        let session = Session {
            endpoint: self.endpoint.clone(),
            dialer: Arc::clone(&self.dialer),
            connector: Arc::clone(&self.connector),
            transport: self.transport,
            config: self.config,
            address: self.address.clone(),
            failure_topic: failure_topic(&filter),
            filter: filter.clone(),
            cancel: cancel.clone(),
        };
        tokio::spawn(session.run(tx));
        Subscription { rx, cancel, filter }
    }
}

// ============================================================================
// Subscription handle
// ============================================================================

/// Consumer end of a session.
///
/// Yields Broadcasts until the session ends. Dropping it cancels the session.
pub struct Subscription {
    rx: mpsc::Receiver<Broadcast>,
    cancel: CancellationToken,
    filter: TopicFilter,
}

impl Subscription {
    /// Next broadcast, or `None` once the session has ended.
    pub async fn recv(&mut self) -> Option<Broadcast> {
        self.rx.recv().await
    }

    /// Stop the session without a failure message.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True once the session has stopped, by cancellation or failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    #[must_use]
    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
        debug!(filter = %self.filter, "Subscription dropped");
    }
}

impl Stream for Subscription {
    type Item = Broadcast;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// ============================================================================
// Session driver
// ============================================================================

struct Session {
    endpoint: Endpoint,
    dialer: Arc<dyn Dialer>,
    connector: Arc<dyn BroadcastConnector>,
    transport: TransportConfig,
    config: SubscriberConfig,
    address: String,
    filter: TopicFilter,
    failure_topic: String,
    cancel: CancellationToken,
}

/// Failure broadcasts are tagged with the filter key. `{` would break the
/// topic/payload boundary, so it is dropped.
fn failure_topic(filter: &TopicFilter) -> String {
    filter.key().replace('{', "")
}

fn failure(topic: &str, message: impl Into<String>) -> Option<Broadcast> {
    Broadcast::new(topic, Reply::fail(message)).ok()
}

/// Hand a broadcast to the consumer. False when the consumer is gone.
async fn forward(tx: &mpsc::Sender<Broadcast>, broadcast: Broadcast, cancel: &CancellationToken) -> bool {
    let status = if broadcast.is_ok() { "ok" } else { "fail" };
    BROADCASTS_RECEIVED.with_label_values(&[status]).inc();
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = tx.send(broadcast) => sent.is_ok(),
    }
}

impl Session {
    async fn run(self, tx: mpsc::Sender<Broadcast>) {
        let service = self.endpoint.name.clone();
        info!(service = %service, filter = %self.filter, subscriber = %self.address, "Starting subscription");

        let source = match self.connect().await {
            Ok(Some(source)) => source,
            Ok(None) => return,
            Err(message) => {
                self.fail(&tx, "connect", message).await;
                return;
            }
        };

        let mut client = ReliableClient::new(
            self.endpoint.clone(),
            Arc::clone(&self.dialer),
            self.transport,
        );
        let handshake = Request::new(SUBSCRIBE_COMMAND)
            .with_param("topic_filter", self.filter.to_json())
            .with_param("subscriber", self.address.clone());
        match client.request_until(&handshake, &self.cancel).await {
            Ok(_) => debug!(service = %service, subscriber = %self.address, "Subscribed"),
            Err(TransportError::Cancelled { .. }) => return,
            Err(e) => {
                self.fail(&tx, "handshake", format!("subscribe failed: {e}"))
                    .await;
                return;
            }
        }

        let (control_tx, control_rx) = mpsc::channel(1);
        let heartbeat = tokio::spawn(heartbeat_loop(
            client,
            self.address.clone(),
            self.config.heartbeat_interval,
            control_tx,
            self.cancel.clone(),
        ));
        let receiver = tokio::spawn(receive_loop(
            source,
            control_rx,
            tx,
            self.failure_topic.clone(),
            self.cancel.clone(),
        ));

        let _ = receiver.await;
        // Whichever loop ended first takes the other down
        self.cancel.cancel();
        let _ = heartbeat.await;
        info!(service = %service, subscriber = %self.address, "Subscription ended");
    }

    /// Connect the SUB side and let it settle. `Ok(None)` means cancelled.
    ///
    /// The connect is bounded by `request_timeout`, since a connector may keep
    /// retrying a closed port internally.
    async fn connect(&self) -> Result<Option<Box<dyn BroadcastSource>>, String> {
        let endpoint = self.endpoint.broadcast().map_err(|e| e.to_string())?;
        let limit = self.transport.request_timeout;
        let source = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(None),
            source = timeout(limit, self.connector.connect(&endpoint)) => match source {
                Ok(source) => source.map_err(|e| e.to_string())?,
                Err(_) => {
                    return Err(format!(
                        "broadcast connect to {} timed out after {limit:?}",
                        endpoint.url()
                    ))
                }
            },
        };
        tokio::select! {
            _ = self.cancel.cancelled() => return Ok(None),
            _ = sleep(self.config.connect_delay) => {}
        }
        Ok(Some(source))
    }

    async fn fail(&self, tx: &mpsc::Sender<Broadcast>, reason: &str, message: String) {
        warn!(
            service = %self.endpoint.name,
            subscriber = %self.address,
            reason,
            message = %message,
            "Subscription failed"
        );
        SUBSCRIPTION_FAILURES.with_label_values(&[reason]).inc();
        if let Some(broadcast) = failure(&self.failure_topic, message) {
            forward(tx, broadcast, &self.cancel).await;
        }
        self.cancel.cancel();
    }
}

// ============================================================================
// Session loops
// ============================================================================

async fn heartbeat_loop(
    mut client: ReliableClient,
    address: String,
    period: Duration,
    control: mpsc::Sender<String>,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let beat = Request::new(HEARTBEAT_COMMAND).with_param("subscriber", address.clone());

    loop {
        tokio::select! {
            // No beat may start once the session is stopping
            biased;
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        HEARTBEATS_SENT
            .with_label_values(&[client.service()])
            .inc();
        match client.request_until(&beat, &cancel).await {
            Ok(_) => debug!(service = %client.service(), subscriber = %address, "Heartbeat acknowledged"),
            Err(TransportError::Cancelled { .. }) => return,
            Err(e) => {
                warn!(service = %client.service(), subscriber = %address, error = %e, "Heartbeat failed");
                let _ = control.send(format!("heartbeat failed: {e}")).await;
                return;
            }
        }
    }
}

async fn receive_loop(
    mut source: Box<dyn BroadcastSource>,
    mut control: mpsc::Receiver<String>,
    tx: mpsc::Sender<Broadcast>,
    failure_topic: String,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            message = control.recv() => {
                // A closed channel means the heartbeat loop was cancelled
                let Some(message) = message else { return };
                SUBSCRIPTION_FAILURES.with_label_values(&["heartbeat"]).inc();
                if let Some(broadcast) = failure(&failure_topic, message) {
                    forward(&tx, broadcast, &cancel).await;
                }
                return;
            }
            frame = source.recv() => {
                let broadcast = match frame {
                    Ok(bytes) => match Broadcast::decode(&bytes) {
                        Ok(broadcast) => broadcast,
                        Err(e) => {
                            warn!(error = %e, "Malformed broadcast");
                            SUBSCRIPTION_FAILURES.with_label_values(&["malformed"]).inc();
                            if let Some(broadcast) = failure(&failure_topic, format!("malformed broadcast: {e}")) {
                                forward(&tx, broadcast, &cancel).await;
                            }
                            return;
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, "Broadcast socket failed");
                        SUBSCRIPTION_FAILURES.with_label_values(&["socket"]).inc();
                        if let Some(broadcast) = failure(&failure_topic, format!("broadcast socket failed: {e}")) {
                            forward(&tx, broadcast, &cancel).await;
                        }
                        return;
                    }
                };

                let ok = broadcast.is_ok();
                if !forward(&tx, broadcast, &cancel).await || !ok {
                    if !ok {
                        SUBSCRIPTION_FAILURES.with_label_values(&["remote"]).inc();
                    }
                    return;
                }
            }
        }
    }
}
