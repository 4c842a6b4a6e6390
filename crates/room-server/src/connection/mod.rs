//! Message-framed, bidirectional connections.
//!
//! The room core never touches a socket directly; it sees a
//! [`Connection`] that splits into a [`FrameSink`] (driven by the
//! outbound pump) and a [`FrameStream`] (driven by the inbound pump).
//!
//! - [`ws`]     : axum WebSocket adapter used by the server
//! - [`memory`] : in-process connection used by tests

pub mod memory;
pub mod ws;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use memory::{MemoryConnection, MemoryPeer, PeerEvent};
pub use ws::WsConnection;

/// One read from a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A data frame.
    Frame(Bytes),

    /// Ping/pong traffic: proof of life, no payload.
    Heartbeat,

    /// The peer closed the connection gracefully.
    Closed,
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection already closed")]
    Closed,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("write timed out")]
    WriteTimeout,
}

#[async_trait]
pub trait FrameSink: Send + 'static {
    async fn send(&mut self, frame: Bytes) -> Result<(), ConnectionError>;

    async fn ping(&mut self) -> Result<(), ConnectionError>;

    /// Write a close frame. The sink is unusable afterwards.
    async fn close(&mut self) -> Result<(), ConnectionError>;
}

#[async_trait]
pub trait FrameStream: Send + 'static {
    /// Wait for the next read. `Err` is a non-graceful failure.
    async fn recv(&mut self) -> Result<Incoming, ConnectionError>;
}

#[async_trait]
pub trait Connection: Send + Sized + 'static {
    type Sink: FrameSink;
    type Stream: FrameStream;

    fn split(self) -> (Self::Sink, Self::Stream);

    /// Refuse the connection, telling the peer why, and close it.
    async fn reject(self, reason: &str);
}
