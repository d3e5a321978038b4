//! # In-Memory Network
//!
//! Same-process implementation of every socket port, keyed by endpoint URL.
//!
//! - Request-reply: each request carries a `oneshot` for its reply over an
//!   `mpsc` queue owned by the bound [`MemoryReplySocket`].
//! - Publish-subscribe: one `tokio::sync::broadcast` channel per URL. Frames
//!   published with no connected source are dropped, as with a PUB socket.

use crate::error::SocketError;
use crate::ports::{
    BroadcastConnector, BroadcastSink, BroadcastSource, Dialer, ReplySocket, RequestSocket,
};
use crate::registry::Endpoint;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::debug;

type Exchange = (Vec<u8>, oneshot::Sender<Vec<u8>>);

/// Requests queued per bound reply socket.
const REQUEST_QUEUE_DEPTH: usize = 64;

#[derive(Default)]
struct Routes {
    reply: HashMap<String, mpsc::Sender<Exchange>>,
    broadcast: HashMap<String, broadcast::Sender<Vec<u8>>>,
}

/// Shared in-process network. Cloning yields a handle to the same network.
#[derive(Clone)]
pub struct MemoryNetwork {
    routes: Arc<Mutex<Routes>>,
    broadcast_capacity: usize,
}

impl MemoryNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::with_broadcast_capacity(crate::DEFAULT_CHANNEL_CAPACITY)
    }

    #[must_use]
    pub fn with_broadcast_capacity(capacity: usize) -> Self {
        Self {
            routes: Arc::new(Mutex::new(Routes::default())),
            broadcast_capacity: capacity,
        }
    }

    /// Bind a reply socket. Fails while another live socket holds the URL.
    pub fn bind_reply(&self, endpoint: &Endpoint) -> Result<MemoryReplySocket, SocketError> {
        let url = endpoint.url();
        let mut routes = self.routes.lock();
        if routes.reply.get(&url).is_some_and(|tx| !tx.is_closed()) {
            return Err(SocketError::Bind {
                endpoint: url,
                reason: "address in use".into(),
            });
        }
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        routes.reply.insert(url.clone(), tx);
        debug!(endpoint = %url, "Memory reply socket bound");
        Ok(MemoryReplySocket { rx, pending: None })
    }

    /// Bind a publish socket on the endpoint's URL.
    #[must_use]
    pub fn bind_publisher(&self, endpoint: &Endpoint) -> MemoryBroadcastSink {
        MemoryBroadcastSink {
            tx: self.broadcast_channel(&endpoint.url()),
        }
    }

    /// Connected broadcast sources on a URL.
    #[must_use]
    pub fn subscriber_count(&self, endpoint: &Endpoint) -> usize {
        self.routes
            .lock()
            .broadcast
            .get(&endpoint.url())
            .map_or(0, broadcast::Sender::receiver_count)
    }

    fn broadcast_channel(&self, url: &str) -> broadcast::Sender<Vec<u8>> {
        let mut routes = self.routes.lock();
        routes
            .broadcast
            .entry(url.to_string())
            .or_insert_with(|| broadcast::channel(self.broadcast_capacity).0)
            .clone()
    }
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dialer for MemoryNetwork {
    async fn dial(&self, endpoint: &Endpoint) -> Result<Box<dyn RequestSocket>, SocketError> {
        let url = endpoint.url();
        let tx = self
            .routes
            .lock()
            .reply
            .get(&url)
            .filter(|tx| !tx.is_closed())
            .cloned()
            .ok_or_else(|| SocketError::Connect {
                endpoint: url,
                reason: "no reply socket bound".into(),
            })?;
        Ok(Box::new(MemoryRequestSocket { tx, pending: None }))
    }
}

#[async_trait]
impl BroadcastConnector for MemoryNetwork {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn BroadcastSource>, SocketError> {
        let rx = self.broadcast_channel(&endpoint.url()).subscribe();
        Ok(Box::new(MemoryBroadcastSource { rx }))
    }
}

/// Client end of an in-memory request-reply pair.
pub struct MemoryRequestSocket {
    tx: mpsc::Sender<Exchange>,
    pending: Option<oneshot::Receiver<Vec<u8>>>,
}

#[async_trait]
impl RequestSocket for MemoryRequestSocket {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), SocketError> {
        if self.pending.is_some() {
            return Err(SocketError::Io("send while awaiting a reply".into()));
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send((frame, reply_tx))
            .await
            .map_err(|_| SocketError::Closed)?;
        self.pending = Some(reply_rx);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Vec<u8>, SocketError> {
        let pending = self
            .pending
            .as_mut()
            .ok_or_else(|| SocketError::Io("recv without a pending request".into()))?;
        let result = pending.await.map_err(|_| SocketError::Closed);
        self.pending = None;
        result
    }
}

/// Server end of an in-memory request-reply pair.
pub struct MemoryReplySocket {
    rx: mpsc::Receiver<Exchange>,
    pending: Option<oneshot::Sender<Vec<u8>>>,
}

#[async_trait]
impl ReplySocket for MemoryReplySocket {
    async fn recv(&mut self) -> Result<Vec<u8>, SocketError> {
        let (frame, reply_tx) = self.rx.recv().await.ok_or(SocketError::Closed)?;
        self.pending = Some(reply_tx);
        Ok(frame)
    }

    async fn send(&mut self, frame: Vec<u8>) -> Result<(), SocketError> {
        let reply_tx = self
            .pending
            .take()
            .ok_or_else(|| SocketError::Io("send without a pending request".into()))?;
        if reply_tx.send(frame).is_err() {
            debug!("Requester went away before the reply was sent");
        }
        Ok(())
    }
}

/// Publish end of an in-memory broadcast channel.
pub struct MemoryBroadcastSink {
    tx: broadcast::Sender<Vec<u8>>,
}

#[async_trait]
impl BroadcastSink for MemoryBroadcastSink {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), SocketError> {
        // Err only means no source is connected
        let _ = self.tx.send(frame);
        Ok(())
    }
}

/// Subscribe end of an in-memory broadcast channel.
pub struct MemoryBroadcastSource {
    rx: broadcast::Receiver<Vec<u8>>,
}

#[async_trait]
impl BroadcastSource for MemoryBroadcastSource {
    async fn recv(&mut self) -> Result<Vec<u8>, SocketError> {
        loop {
            match self.rx.recv().await {
                Ok(frame) => return Ok(frame),
                Err(broadcast::error::RecvError::Closed) => return Err(SocketError::Closed),
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Broadcast source lagged, some frames dropped");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint::new("svc", "memory", 1)
    }

    #[tokio::test]
    async fn test_request_reply_roundtrip() {
        let network = MemoryNetwork::new();
        let mut server = network.bind_reply(&endpoint()).unwrap();
        let mut client = network.dial(&endpoint()).await.unwrap();

        client.send(b"ping".to_vec()).await.unwrap();
        assert_eq!(server.recv().await.unwrap(), b"ping");
        server.send(b"pong".to_vec()).await.unwrap();
        assert_eq!(client.recv().await.unwrap(), b"pong");
    }

    #[tokio::test]
    async fn test_dial_unbound_fails() {
        let network = MemoryNetwork::new();
        let result = network.dial(&endpoint()).await;
        assert!(matches!(result, Err(SocketError::Connect { .. })));
    }

    #[tokio::test]
    async fn test_bind_twice_fails_until_dropped() {
        let network = MemoryNetwork::new();
        let first = network.bind_reply(&endpoint()).unwrap();
        assert!(matches!(
            network.bind_reply(&endpoint()),
            Err(SocketError::Bind { .. })
        ));
        drop(first);
        assert!(network.bind_reply(&endpoint()).is_ok());
    }

    #[tokio::test]
    async fn test_request_socket_enforces_alternation() {
        let network = MemoryNetwork::new();
        let _server = network.bind_reply(&endpoint()).unwrap();
        let mut client = network.dial(&endpoint()).await.unwrap();

        assert!(client.recv().await.is_err());
        client.send(b"a".to_vec()).await.unwrap();
        assert!(client.send(b"b".to_vec()).await.is_err());
    }

    #[tokio::test]
    async fn test_reply_to_dropped_server_is_closed() {
        let network = MemoryNetwork::new();
        let mut server = network.bind_reply(&endpoint()).unwrap();
        let mut client = network.dial(&endpoint()).await.unwrap();

        client.send(b"ping".to_vec()).await.unwrap();
        let _ = server.recv().await.unwrap();
        drop(server);
        assert_eq!(client.recv().await, Err(SocketError::Closed));
    }

    #[tokio::test]
    async fn test_broadcast_fan_out() {
        let network = MemoryNetwork::new();
        let mut a = network.connect(&endpoint()).await.unwrap();
        let mut b = network.connect(&endpoint()).await.unwrap();
        let mut sink = network.bind_publisher(&endpoint());
        assert_eq!(network.subscriber_count(&endpoint()), 2);

        sink.send(b"frame".to_vec()).await.unwrap();
        assert_eq!(a.recv().await.unwrap(), b"frame");
        assert_eq!(b.recv().await.unwrap(), b"frame");
    }

    #[tokio::test]
    async fn test_publish_without_sources_is_dropped() {
        let network = MemoryNetwork::new();
        let mut sink = network.bind_publisher(&endpoint());
        assert!(sink.send(b"lost".to_vec()).await.is_ok());
    }
}
