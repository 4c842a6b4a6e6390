//! In-process connection pair.
//!
//! [`pair`] returns the server side ([`MemoryConnection`]) and the
//! remote side ([`MemoryPeer`]). The server→peer direction is bounded,
//! so a peer that stops reading stalls the server's outbound pump the
//! way a slow network client would.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use super::{Connection, ConnectionError, FrameSink, FrameStream, Incoming};

/// What the peer observes from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    Frame(Bytes),
    Ping,
    /// Close frame sent by `Connection::reject`.
    Rejected(String),
}

type Inbound = Result<Incoming, ConnectionError>;

pub struct MemoryConnection {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    outbound: mpsc::Sender<PeerEvent>,
}

pub struct MemoryPeer {
    tx: Option<mpsc::UnboundedSender<Inbound>>,
    rx: mpsc::Receiver<PeerEvent>,
}

/// Create a connected pair; `capacity` bounds the server→peer buffer.
pub fn pair(capacity: usize) -> (MemoryConnection, MemoryPeer) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::channel(capacity);
    (
        MemoryConnection {
            inbound: in_rx,
            outbound: out_tx,
        },
        MemoryPeer {
            tx: Some(in_tx),
            rx: out_rx,
        },
    )
}

pub struct MemorySink {
    tx: Option<mpsc::Sender<PeerEvent>>,
}

pub struct MemoryStream {
    rx: mpsc::UnboundedReceiver<Inbound>,
}

#[async_trait]
impl Connection for MemoryConnection {
    type Sink = MemorySink;
    type Stream = MemoryStream;

    fn split(self) -> (MemorySink, MemoryStream) {
        (
            MemorySink {
                tx: Some(self.outbound),
            },
            MemoryStream { rx: self.inbound },
        )
    }

    async fn reject(self, reason: &str) {
        let _ = self.outbound.send(PeerEvent::Rejected(reason.to_string())).await;
    }
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, frame: Bytes) -> Result<(), ConnectionError> {
        let tx = self.tx.as_ref().ok_or(ConnectionError::Closed)?;
        tx.send(PeerEvent::Frame(frame))
            .await
            .map_err(|_| ConnectionError::Transport("peer went away".into()))
    }

    async fn ping(&mut self) -> Result<(), ConnectionError> {
        let tx = self.tx.as_ref().ok_or(ConnectionError::Closed)?;
        match tx.try_send(PeerEvent::Ping) {
            // A stalled peer just misses the ping.
            Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(ConnectionError::Transport("peer went away".into()))
            }
        }
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        self.tx.take().map(drop).ok_or(ConnectionError::Closed)
    }
}

#[async_trait]
impl FrameStream for MemoryStream {
    async fn recv(&mut self) -> Result<Incoming, ConnectionError> {
        self.rx.recv().await.unwrap_or(Ok(Incoming::Closed))
    }
}

impl MemoryPeer {
    /// Send a text frame. Returns false once the server side is gone.
    pub fn send_text(&self, text: &str) -> bool {
        self.push(Ok(Incoming::Frame(Bytes::copy_from_slice(text.as_bytes()))))
    }

    pub fn send_heartbeat(&self) -> bool {
        self.push(Ok(Incoming::Heartbeat))
    }

    /// Simulate a transport failure (e.g. a reset connection).
    pub fn fail(&self, reason: &str) -> bool {
        self.push(Err(ConnectionError::Transport(reason.to_string())))
    }

    /// Close gracefully.
    pub fn disconnect(&mut self) {
        self.push(Ok(Incoming::Closed));
        self.tx = None;
    }

    fn push(&self, item: Inbound) -> bool {
        self.tx.as_ref().is_some_and(|tx| tx.send(item).is_ok())
    }

    /// Next event from the server; `None` once the server closed.
    pub async fn recv(&mut self) -> Option<PeerEvent> {
        self.rx.recv().await
    }

    /// Next data frame, skipping pings; `None` on close or rejection.
    pub async fn recv_frame(&mut self) -> Option<Bytes> {
        loop {
            match self.rx.recv().await? {
                PeerEvent::Frame(frame) => return Some(frame),
                PeerEvent::Ping => continue,
                PeerEvent::Rejected(_) => return None,
            }
        }
    }
}
