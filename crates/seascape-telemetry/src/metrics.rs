//! Prometheus metrics for the Seascape bus.
//!
//! All metrics follow the naming convention: `seascape_<component>_<metric>_<unit>`
//!
//! Request-reply counters are labelled by `service` and `command`. Published
//! broadcasts are labelled by topic scope, the `organization.project` prefix
//! (see [`topic_scope`]), so the label set stays bounded.

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Metrics registry for this crate.
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // REQUEST-REPLY TRANSPORT
    // =========================================================================

    /// Request frames written to a socket (one per send attempt)
    pub static ref REQUESTS_SENT: CounterVec = CounterVec::new(
        Opts::new("seascape_transport_requests_sent_total", "Request frames sent, including resends"),
        &["service", "command"]
    ).expect("metric creation failed");

    /// Wait windows that elapsed without a reply
    pub static ref REQUEST_TIMEOUTS: CounterVec = CounterVec::new(
        Opts::new("seascape_transport_timeouts_total", "Requests that hit the wait window"),
        &["service", "command"]
    ).expect("metric creation failed");

    /// Sockets discarded and re-dialed
    pub static ref RECONNECTS: CounterVec = CounterVec::new(
        Opts::new("seascape_transport_reconnects_total", "Request sockets replaced after a timeout or I/O error"),
        &["service"]
    ).expect("metric creation failed");

    /// Replies with status "fail"
    pub static ref APPLICATION_FAILURES: CounterVec = CounterVec::new(
        Opts::new("seascape_transport_application_failures_total", "Replies that carried status fail"),
        &["service", "command"]
    ).expect("metric creation failed");

    /// Round-trip time of successful calls, retries included
    pub static ref REQUEST_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "seascape_transport_request_duration_seconds",
            "Time from first send to accepted reply"
        ).buckets(exponential_buckets(0.0005, 2.0, 16).unwrap_or_default())
    ).expect("metric creation failed");

    // =========================================================================
    // PUBLISH / SUBSCRIBE
    // =========================================================================

    pub static ref BROADCASTS_PUBLISHED: CounterVec = CounterVec::new(
        Opts::new("seascape_pubsub_broadcasts_published_total", "Broadcasts written to the publish socket"),
        &["scope"]
    ).expect("metric creation failed");

    pub static ref BROADCASTS_RECEIVED: CounterVec = CounterVec::new(
        Opts::new("seascape_pubsub_broadcasts_received_total", "Broadcasts forwarded to subscribers"),
        &["status"]
    ).expect("metric creation failed");

    pub static ref HEARTBEATS_SENT: CounterVec = CounterVec::new(
        Opts::new("seascape_pubsub_heartbeats_sent_total", "Heartbeats sent by subscriber sessions"),
        &["service"]
    ).expect("metric creation failed");

    /// Subscriber sessions that ended with a failure
    pub static ref SUBSCRIPTION_FAILURES: CounterVec = CounterVec::new(
        Opts::new("seascape_pubsub_subscription_failures_total", "Subscriber sessions terminated by a failure"),
        &["reason"]
    ).expect("metric creation failed");
}

/// Handle for registered metrics
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all bus metrics with [`REGISTRY`].
///
/// Fails if called twice, since collectors can only be registered once.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(REQUESTS_SENT.clone()),
        Box::new(REQUEST_TIMEOUTS.clone()),
        Box::new(RECONNECTS.clone()),
        Box::new(APPLICATION_FAILURES.clone()),
        Box::new(REQUEST_DURATION.clone()),
        Box::new(BROADCASTS_PUBLISHED.clone()),
        Box::new(BROADCASTS_RECEIVED.clone()),
        Box::new(HEARTBEATS_SENT.clone()),
        Box::new(SUBSCRIPTION_FAILURES.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Label value for a broadcast topic: its first two levels.
#[must_use]
pub fn topic_scope(topic: &str) -> &str {
    match topic.match_indices('.').nth(1) {
        Some((end, _)) => &topic[..end],
        None => topic,
    }
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Option<Histogram>,
    start: std::time::Instant,
}

impl HistogramTimer {
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: Some(histogram.clone()),
            start: std::time::Instant::now(),
        }
    }

    /// Drop the timer without recording.
    pub fn discard(mut self) {
        self.histogram = None;
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        if let Some(histogram) = self.histogram.take() {
            histogram.observe(self.start.elapsed().as_secs_f64());
        }
    }
}
