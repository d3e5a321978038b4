//! Socket adapters.

pub mod memory;
pub mod zmq;

pub use memory::{
    MemoryBroadcastSink, MemoryBroadcastSource, MemoryNetwork, MemoryReplySocket,
    MemoryRequestSocket,
};
pub use zmq::{
    ZmqBroadcastSink, ZmqBroadcastSource, ZmqReplySocket, ZmqRequestSocket, ZmqTransport,
};
