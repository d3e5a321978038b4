//! # ZeroMQ Transport
//!
//! Socket ports over the pure-Rust `zeromq` crate:
//!
//! | Port | Socket |
//! |------|--------|
//! | [`Dialer`] | REQ, connected to `Endpoint::url()` |
//! | [`ReplySocket`] | REP, bound with [`ZmqTransport::bind_reply`] |
//! | [`BroadcastSink`] | PUB, bound with [`ZmqTransport::bind_publisher`] |
//! | [`BroadcastConnector`] | SUB, subscribed to the empty prefix |
//!
//! Every envelope travels as a single frame. Multipart messages received
//! from foreign peers are concatenated.

use crate::error::SocketError;
use crate::ports::{
    BroadcastConnector, BroadcastSink, BroadcastSource, Dialer, ReplySocket, RequestSocket,
};
use crate::registry::Endpoint;
use async_trait::async_trait;
use tracing::{debug, info, warn};
use zeromq::{PubSocket, RepSocket, ReqSocket, Socket, SocketRecv, SocketSend, SubSocket, ZmqMessage};

/// Factory for ZeroMQ sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZmqTransport;

impl ZmqTransport {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Bind a REP socket on the endpoint's request port.
    pub async fn bind_reply(&self, endpoint: &Endpoint) -> Result<ZmqReplySocket, SocketError> {
        let url = endpoint.url();
        let mut socket = RepSocket::new();
        socket.bind(&url).await.map_err(|e| SocketError::Bind {
            endpoint: url.clone(),
            reason: e.to_string(),
        })?;
        info!(service = %endpoint.name, endpoint = %url, "Reply socket bound");
        Ok(ZmqReplySocket(socket))
    }

    /// Bind a PUB socket on `endpoint`. Pass `Endpoint::broadcast()` to use a
    /// service's publish port.
    pub async fn bind_publisher(&self, endpoint: &Endpoint) -> Result<ZmqBroadcastSink, SocketError> {
        let url = endpoint.url();
        let mut socket = PubSocket::new();
        socket.bind(&url).await.map_err(|e| SocketError::Bind {
            endpoint: url.clone(),
            reason: e.to_string(),
        })?;
        info!(service = %endpoint.name, endpoint = %url, "Publisher bound");
        Ok(ZmqBroadcastSink(socket))
    }
}

fn io_error(e: zeromq::ZmqError) -> SocketError {
    SocketError::Io(e.to_string())
}

fn flatten(message: ZmqMessage) -> Vec<u8> {
    let mut frame = Vec::new();
    for part in message.into_vec() {
        frame.extend_from_slice(&part);
    }
    frame
}

#[async_trait]
impl Dialer for ZmqTransport {
    async fn dial(&self, endpoint: &Endpoint) -> Result<Box<dyn RequestSocket>, SocketError> {
        let url = endpoint.url();
        let mut socket = ReqSocket::new();
        socket.connect(&url).await.map_err(|e| SocketError::Connect {
            endpoint: url.clone(),
            reason: e.to_string(),
        })?;
        debug!(service = %endpoint.name, endpoint = %url, "Request socket connected");
        Ok(Box::new(ZmqRequestSocket(socket)))
    }
}

#[async_trait]
impl BroadcastConnector for ZmqTransport {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn BroadcastSource>, SocketError> {
        let url = endpoint.url();
        let mut socket = SubSocket::new();
        socket.connect(&url).await.map_err(|e| SocketError::Connect {
            endpoint: url.clone(),
            reason: e.to_string(),
        })?;
        socket.subscribe("").await.map_err(io_error)?;
        debug!(service = %endpoint.name, endpoint = %url, "Subscriber connected");
        Ok(Box::new(ZmqBroadcastSource(socket)))
    }
}

/// REQ socket.
pub struct ZmqRequestSocket(ReqSocket);

#[async_trait]
impl RequestSocket for ZmqRequestSocket {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), SocketError> {
        self.0.send(ZmqMessage::from(frame)).await.map_err(io_error)
    }

    async fn recv(&mut self) -> Result<Vec<u8>, SocketError> {
        self.0.recv().await.map(flatten).map_err(io_error)
    }
}

/// REP socket.
pub struct ZmqReplySocket(RepSocket);

impl ZmqReplySocket {
    /// Unbind and wait until the port is released.
    pub async fn close(self) {
        for e in self.0.close().await {
            warn!(error = %e, "Reply socket did not unbind cleanly");
        }
    }
}

#[async_trait]
impl ReplySocket for ZmqReplySocket {
    async fn recv(&mut self) -> Result<Vec<u8>, SocketError> {
        self.0.recv().await.map(flatten).map_err(io_error)
    }

    async fn send(&mut self, frame: Vec<u8>) -> Result<(), SocketError> {
        self.0.send(ZmqMessage::from(frame)).await.map_err(io_error)
    }
}

/// PUB socket.
pub struct ZmqBroadcastSink(PubSocket);

impl ZmqBroadcastSink {
    /// Unbind and wait until the port is released.
    pub async fn close(self) {
        for e in self.0.close().await {
            warn!(error = %e, "Publisher did not unbind cleanly");
        }
    }
}

#[async_trait]
impl BroadcastSink for ZmqBroadcastSink {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), SocketError> {
        self.0.send(ZmqMessage::from(frame)).await.map_err(io_error)
    }
}

/// SUB socket.
pub struct ZmqBroadcastSource(SubSocket);

#[async_trait]
impl BroadcastSource for ZmqBroadcastSource {
    async fn recv(&mut self) -> Result<Vec<u8>, SocketError> {
        self.0.recv().await.map(flatten).map_err(io_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_joins_parts() {
        let message = ZmqMessage::from(b"topic{\"status\":\"ok\"}".to_vec());
        assert_eq!(flatten(message), b"topic{\"status\":\"ok\"}".to_vec());
    }
}
