//! # Broadcast Publisher
//!
//! A service queues [`Broadcast`]s on a [`BroadcastQueue`] and a single
//! [`Publisher`] task writes them to the publish socket in queue order.
//!
//! A PUB socket fans every frame out to all connected subscribers, so
//! per-subscriber filters are applied before queueing:
//! [`BroadcastQueue::publish_matching`] skips topics that no filter in the
//! [`SubscriptionBook`] matches.

use crate::book::SubscriptionBook;
use crate::error::PublisherError;
use crate::ports::BroadcastSink;
use seascape_telemetry::{topic_scope, BROADCASTS_PUBLISHED};
use seascape_types::{Broadcast, Reply, Topic};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Producer handle for a running [`Publisher`].
#[derive(Clone)]
pub struct BroadcastQueue {
    tx: mpsc::Sender<Broadcast>,
}

impl BroadcastQueue {
    /// Queue a broadcast. Waits while the queue is full.
    pub async fn publish(&self, broadcast: Broadcast) -> Result<(), PublisherError> {
        self.tx
            .send(broadcast)
            .await
            .map_err(|_| PublisherError::Closed)
    }

    /// Queue `reply` on `topic` if at least one subscriber in `book` wants it.
    ///
    /// Returns the number of interested subscribers; zero means nothing was
    /// queued.
    pub async fn publish_matching(
        &self,
        book: &SubscriptionBook,
        topic: &Topic,
        reply: Reply,
    ) -> Result<usize, PublisherError> {
        let interested = book.interested(topic).len();
        if interested == 0 {
            debug!(topic = %topic, "No subscriber wants topic; skipped");
            return Ok(0);
        }
        self.publish(Broadcast::new(topic.to_string(), reply)?).await?;
        Ok(interested)
    }

    /// True once the publisher loop has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Publisher loop over one broadcast sink.
pub struct Publisher {
    sink: Box<dyn BroadcastSink>,
    rx: mpsc::Receiver<Broadcast>,
    published: u64,
}

impl Publisher {
    /// Create a publisher and its queue. `capacity` bounds queued broadcasts.
    pub fn new(sink: Box<dyn BroadcastSink>, capacity: usize) -> (Self, BroadcastQueue) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                sink,
                rx,
                published: 0,
            },
            BroadcastQueue { tx },
        )
    }

    /// Drain the queue until every handle is dropped or `cancel` fires.
    ///
    /// A sink failure stops the loop and is returned.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<u64, PublisherError> {
        info!("Publisher started");
        loop {
            let broadcast = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Publisher cancelled");
                    break;
                }
                next = self.rx.recv() => match next {
                    Some(broadcast) => broadcast,
                    None => {
                        debug!("All broadcast queues dropped");
                        break;
                    }
                },
            };

            let frame = broadcast.encode()?;
            if let Err(source) = self.sink.send(frame).await {
                error!(topic = %broadcast.topic(), error = %source, "Broadcast send failed; stopping publisher");
                return Err(PublisherError::Send {
                    topic: broadcast.topic().to_string(),
                    source,
                });
            }

            self.published += 1;
            BROADCASTS_PUBLISHED
                .with_label_values(&[topic_scope(broadcast.topic())])
                .inc();
            debug!(topic = %broadcast.topic(), ok = broadcast.is_ok(), "Broadcast published");
        }
        info!(published = self.published, "Publisher stopped");
        Ok(self.published)
    }
}
