//! # Socket Ports
//!
//! Frame-level seams between the bus protocols and a concrete transport.
//! A frame is one complete encoded envelope.
//!
//! ## Adapters
//!
//! - [`ZmqTransport`](crate::adapters::ZmqTransport): ZeroMQ REQ/REP and PUB/SUB
//! - [`MemoryNetwork`](crate::adapters::MemoryNetwork): same-process channels

use crate::error::SocketError;
use crate::registry::Endpoint;
use async_trait::async_trait;

/// Client half of a request-reply pair. Strictly alternates send and recv.
#[async_trait]
pub trait RequestSocket: Send {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), SocketError>;

    async fn recv(&mut self) -> Result<Vec<u8>, SocketError>;
}

/// Opens fresh request sockets. Each reconnect dials again.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, endpoint: &Endpoint) -> Result<Box<dyn RequestSocket>, SocketError>;
}

/// Server half of a request-reply pair. Strictly alternates recv and send.
#[async_trait]
pub trait ReplySocket: Send {
    async fn recv(&mut self) -> Result<Vec<u8>, SocketError>;

    async fn send(&mut self, frame: Vec<u8>) -> Result<(), SocketError>;
}

/// Publishing side of a broadcast channel.
#[async_trait]
pub trait BroadcastSink: Send {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), SocketError>;
}

/// Receiving side of a broadcast channel, subscribed to every topic.
#[async_trait]
pub trait BroadcastSource: Send {
    async fn recv(&mut self) -> Result<Vec<u8>, SocketError>;
}

/// Opens broadcast sources on a publisher endpoint.
#[async_trait]
pub trait BroadcastConnector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn BroadcastSource>, SocketError>;
}
