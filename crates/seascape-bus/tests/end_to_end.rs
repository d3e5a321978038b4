//! A publishing service and its subscribers wired over `MemoryNetwork`.

use async_trait::async_trait;
use seascape_bus::adapters::MemoryNetwork;
use seascape_bus::{
    BroadcastQueue, CommandHandler, CommandRouter, Endpoint, EndpointRegistry, Publisher,
    ReliableClient, ReplyServer, Subscriber, SubscriberConfig, SubscriptionBook, TransportConfig,
    TransportError,
};
use seascape_types::{Broadcast, Params, Reply, Request, Topic, TopicFilter};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

struct Height;

#[async_trait]
impl CommandHandler for Height {
    async fn handle(&self, request: Request) -> Reply {
        match request.params.get_string("network_id") {
            Ok(network) if network == "1" => Reply::ok(Params::new().with("height", 19_000_000u64)),
            Ok(network) => Reply::fail(format!("network {network} not indexed")),
            Err(e) => Reply::fail(e.to_string()),
        }
    }
}

/// A running indexer: reply server with a subscription book plus a publisher.
struct Indexer {
    endpoint: Endpoint,
    book: SubscriptionBook,
    queue: BroadcastQueue,
    cancel: CancellationToken,
}

impl Indexer {
    fn start(network: &MemoryNetwork) -> Self {
        let endpoint = Endpoint::new("indexer", "memory", 4000).with_broadcast_port(4001);
        let cancel = CancellationToken::new();

        let book = SubscriptionBook::new();
        let mut router = CommandRouter::new().with("height", Arc::new(Height));
        book.register(&mut router);
        let socket = network.bind_reply(&endpoint).unwrap();
        tokio::spawn(ReplyServer::new(router).serve(Box::new(socket), cancel.clone()));

        let sink = network.bind_publisher(&endpoint.broadcast().unwrap());
        let (publisher, queue) = Publisher::new(Box::new(sink), 16);
        tokio::spawn(publisher.run(cancel.clone()));

        Self {
            endpoint,
            book,
            queue,
            cancel,
        }
    }

    /// Publish an event to everyone, as the indexer does after a new block.
    async fn emit(&self, topic: &Topic, reply: Reply) {
        let broadcast = Broadcast::new(topic.to_string(), reply).unwrap();
        self.queue.publish(broadcast).await.unwrap();
    }

    async fn wait_for_subscribers(&self, count: usize) {
        timeout(Duration::from_secs(2), async {
            while self.book.len() < count {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscribers never registered");
    }
}

impl Drop for Indexer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn transfer_topic() -> Topic {
    Topic::new("seascape", "core")
        .with_network_id("1")
        .with_group("erc20")
        .with_name("token")
        .with_method("Transfer")
}

fn subscriber(network: &MemoryNetwork, endpoint: &Endpoint, address: &str) -> Subscriber {
    Subscriber::new(
        endpoint.clone(),
        Arc::new(network.clone()),
        Arc::new(network.clone()),
    )
    .with_transport_config(TransportConfig::default().with_request_timeout(Duration::from_secs(1)))
    .with_config(
        SubscriberConfig::default()
            .with_heartbeat_interval(Duration::from_millis(20))
            .with_connect_delay(Duration::from_millis(5)),
    )
    .with_address(address)
}

#[tokio::test]
async fn test_request_reply_through_registry() {
    let network = MemoryNetwork::new();
    let indexer = Indexer::start(&network);
    let registry = EndpointRegistry::new([indexer.endpoint.clone()]).unwrap();

    let mut client = ReliableClient::for_service(
        &registry,
        "indexer",
        Arc::new(network.clone()),
        TransportConfig::default().with_request_timeout(Duration::from_secs(1)),
    )
    .unwrap();

    let params = client
        .request(&Request::new("height").with_param("network_id", "1"))
        .await
        .unwrap();
    assert_eq!(params.get_u64("height").unwrap(), 19_000_000);

    let err = client
        .request(&Request::new("height").with_param("network_id", "56"))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "indexer rejected 'height': network 56 not indexed"
    );
    assert_eq!(client.stats().reconnects, 0);
}

#[tokio::test]
async fn test_subscriber_receives_broadcasts_until_fail() {
    let network = MemoryNetwork::new();
    let indexer = Indexer::start(&network);

    let filter = TopicFilter::new()
        .with_organizations(["seascape"])
        .with_events(["Transfer"]);
    let mut subscription = subscriber(&network, &indexer.endpoint, "reader-1").subscribe(filter.clone());
    indexer.wait_for_subscribers(1).await;

    assert_eq!(indexer.book.filter_of("reader-1"), Some(filter));
    assert_eq!(indexer.book.interested(&transfer_topic()), vec!["reader-1"]);

    let event = Params::new()
        .with("block_number", 19_000_001u64)
        .with("amount", "340282366920938463463374607431768211455");
    indexer.emit(&transfer_topic(), Reply::ok(event.clone())).await;

    let received = timeout(Duration::from_secs(2), subscription.next())
        .await
        .unwrap()
        .unwrap();
    assert!(received.is_ok());
    assert_eq!(received.topic(), "seascape.core.1.erc20.token.Transfer");
    assert_eq!(received.reply().params, event);

    indexer
        .emit(&transfer_topic(), Reply::fail("indexer shutting down"))
        .await;
    let last = timeout(Duration::from_secs(2), subscription.next())
        .await
        .unwrap()
        .unwrap();
    assert!(!last.is_ok());
    assert_eq!(last.reply().message, "indexer shutting down");
    assert!(timeout(Duration::from_secs(2), subscription.next())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_heartbeats_keep_subscriber_alive() {
    let network = MemoryNetwork::new();
    let indexer = Indexer::start(&network);

    let _subscription =
        subscriber(&network, &indexer.endpoint, "reader-2").subscribe(TopicFilter::new());
    indexer.wait_for_subscribers(1).await;

    // Well past several heartbeat periods, the entry is still fresh
    sleep(Duration::from_millis(120)).await;
    assert!(indexer.book.expire(Duration::from_millis(80)).is_empty());
    assert_eq!(indexer.book.len(), 1);
}

#[tokio::test]
async fn test_expired_subscriber_is_told_on_next_heartbeat() {
    let network = MemoryNetwork::new();
    let indexer = Indexer::start(&network);

    let mut subscription =
        subscriber(&network, &indexer.endpoint, "reader-3").subscribe(TopicFilter::new());
    indexer.wait_for_subscribers(1).await;

    // Forget the subscriber; its next heartbeat is rejected
    assert!(indexer.book.remove("reader-3"));

    let failure = timeout(Duration::from_secs(2), subscription.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(!failure.is_ok());
    assert!(failure.reply().message.contains("unknown subscriber"));
    assert!(subscription.recv().await.is_none());
}

#[tokio::test]
async fn test_two_subscribers_both_receive() {
    let network = MemoryNetwork::new();
    let indexer = Indexer::start(&network);

    let mut a = subscriber(&network, &indexer.endpoint, "a").subscribe(TopicFilter::new());
    let mut b = subscriber(&network, &indexer.endpoint, "b").subscribe(TopicFilter::new());
    indexer.wait_for_subscribers(2).await;

    indexer
        .emit(&transfer_topic(), Reply::ok(Params::new().with("n", 1)))
        .await;

    for subscription in [&mut a, &mut b] {
        let broadcast = timeout(Duration::from_secs(2), subscription.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(broadcast.reply().params.get_u64("n").unwrap(), 1);
    }
}

#[tokio::test]
async fn test_unknown_service_is_config_error() {
    let registry = EndpointRegistry::default();
    let result = ReliableClient::for_service(
        &registry,
        "ghost",
        Arc::new(MemoryNetwork::new()),
        TransportConfig::default(),
    );
    assert!(matches!(result, Err(TransportError::Config(_))));
}
