//! # Subscription Book
//!
//! Publisher-side record of who is subscribed to what. Answers the
//! `subscribe` and `heartbeat` commands sent by [`Subscriber`](crate::Subscriber)
//! sessions and forgets subscribers whose heartbeats stop.

use crate::router::{CommandHandler, CommandRouter};
use crate::subscriber::{HEARTBEAT_COMMAND, SUBSCRIBE_COMMAND};
use async_trait::async_trait;
use parking_lot::RwLock;
use seascape_types::{Params, Reply, Request, Topic, TopicFilter};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct Entry {
    filter: TopicFilter,
    last_seen: Instant,
}

/// Subscriber address to filter table, shared between handler and owner.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionBook {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl SubscriptionBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register this book for `subscribe` and `heartbeat` on `router`.
    pub fn register(&self, router: &mut CommandRouter) {
        let handler: Arc<dyn CommandHandler> = Arc::new(self.clone());
        router.register(SUBSCRIBE_COMMAND, Arc::clone(&handler));
        router.register(HEARTBEAT_COMMAND, handler);
    }

    /// Record or replace a subscription.
    pub fn subscribe(&self, address: impl Into<String>, filter: TopicFilter) {
        let address = address.into();
        info!(subscriber = %address, filter = %filter, "Subscriber registered");
        self.entries.write().insert(
            address,
            Entry {
                filter,
                last_seen: Instant::now(),
            },
        );
    }

    /// Refresh a subscriber. False if it is unknown.
    pub fn heartbeat(&self, address: &str) -> bool {
        match self.entries.write().get_mut(address) {
            Some(entry) => {
                entry.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, address: &str) -> bool {
        self.entries.write().remove(address).is_some()
    }

    /// Drop subscribers silent for longer than `ttl`. Returns their addresses.
    pub fn expire(&self, ttl: Duration) -> Vec<String> {
        let now = Instant::now();
        let mut expired = Vec::new();
        self.entries.write().retain(|address, entry| {
            let alive = now.duration_since(entry.last_seen) <= ttl;
            if !alive {
                expired.push(address.clone());
            }
            alive
        });
        if !expired.is_empty() {
            info!(count = expired.len(), "Expired silent subscribers");
        }
        expired.sort_unstable();
        expired
    }

    /// Subscribers whose filter matches `topic`, sorted.
    #[must_use]
    pub fn interested(&self, topic: &Topic) -> Vec<String> {
        let mut addresses: Vec<String> = self
            .entries
            .read()
            .iter()
            .filter(|(_, entry)| entry.filter.matches(topic))
            .map(|(address, _)| address.clone())
            .collect();
        addresses.sort_unstable();
        addresses
    }

    #[must_use]
    pub fn filter_of(&self, address: &str) -> Option<TopicFilter> {
        self.entries.read().get(address).map(|e| e.filter.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn handle_subscribe(&self, params: &Params) -> Reply {
        let address = match params.get_string("subscriber") {
            Ok(address) => address,
            Err(e) => return Reply::fail(e.to_string()),
        };
        let filter = match params.get("topic_filter").map(TopicFilter::from_json) {
            Some(Ok(filter)) => filter,
            Some(Err(e)) => return Reply::fail(format!("invalid topic_filter: {e}")),
            None => return Reply::fail("missing parameter 'topic_filter'"),
        };
        self.subscribe(address, filter);
        Reply::ok(Params::new())
    }

    fn handle_heartbeat(&self, params: &Params) -> Reply {
        let address = match params.get_string("subscriber") {
            Ok(address) => address,
            Err(e) => return Reply::fail(e.to_string()),
        };
        if self.heartbeat(&address) {
            debug!(subscriber = %address, "Heartbeat");
            Reply::ok(Params::new())
        } else {
            Reply::fail("unknown subscriber")
        }
    }
}

#[async_trait]
impl CommandHandler for SubscriptionBook {
    async fn handle(&self, request: Request) -> Reply {
        match request.command.as_str() {
            SUBSCRIBE_COMMAND => self.handle_subscribe(&request.params),
            HEARTBEAT_COMMAND => self.handle_heartbeat(&request.params),
            other => Reply::fail(format!("unknown command '{other}'")),
        }
    }
}
