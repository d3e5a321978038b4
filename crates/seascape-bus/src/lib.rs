//! # Seascape Bus
//!
//! Messaging channels between Seascape services.
//!
//! ## Channels
//!
//! ```text
//! ┌──────────────┐   Request    ┌──────────────┐
//! │ ReliableClient│ ──────────▶ │ ReplyServer  │
//! │  (REQ)       │ ◀────────── │  (REP)       │
//! └──────────────┘    Reply     └──────┬───────┘
//!        ▲                             │ CommandRouter
//!        │ subscribe / heartbeat       ▼
//! ┌──────┴───────┐  Broadcast   ┌──────────────┐
//! │  Subscriber  │ ◀────────── │  Publisher   │
//! │  (SUB)       │              │  (PUB)       │
//! └──────────────┘              └──────────────┘
//! ```
//!
//! - **Request-reply:** [`ReliableClient`] waits a bounded time for each
//!   reply and reconnects on silence. By default it never gives up.
//! - **Publish/subscribe:** [`Subscriber`] sessions are opened with a
//!   handshake and kept alive by heartbeats. Any failure arrives as one
//!   failing [`Broadcast`](seascape_types::Broadcast).
//!
//! Sockets sit behind the traits in [`ports`]. [`adapters::ZmqTransport`]
//! speaks ZeroMQ; [`adapters::MemoryNetwork`] connects services in one
//! process.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod book;
pub mod config;
pub mod error;
pub mod ports;
pub mod publisher;
pub mod registry;
pub mod router;
pub mod subscriber;
pub mod transport;

// Re-export main types
pub use book::SubscriptionBook;
pub use config::{BusConfig, SubscriberConfig, TransportConfig};
pub use error::{ConfigError, PublisherError, RegistryError, SocketError, TransportError};
pub use ports::{
    BroadcastConnector, BroadcastSink, BroadcastSource, Dialer, ReplySocket, RequestSocket,
};
pub use publisher::{BroadcastQueue, Publisher};
pub use registry::{Endpoint, EndpointRegistry, EndpointResolver};
pub use router::{CommandHandler, CommandRouter, ReplyServer};
pub use subscriber::{Subscriber, Subscription, HEARTBEAT_COMMAND, SUBSCRIBE_COMMAND};
pub use transport::{ReliableClient, SessionStats};

/// Broadcasts buffered per subscription before the receive loop waits.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
