//! Per-client I/O pumps.
//!
//! Every registered client runs two tasks:
//! - the inbound pump reads frames, decodes them and enqueues them on
//!   the room's event queue,
//! - the outbound pump drains the client's outbound queue onto the
//!   connection and keeps it alive with pings.
//!
//! The pumps share nothing but a cancellation token. Whichever side
//! notices the connection is gone cancels it; the inbound pump then
//! tells the room to clear the slot.

use std::future::Future;
use std::time::Duration;

use room_core::Slot;
use room_protocol::decode_message;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::connection::{Connection, ConnectionError, FrameSink, FrameStream, Incoming};
use crate::types::{ClientId, OutboundRx, RoomEvent, RoomTx};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Heartbeat settings for a client's connection.
#[derive(Debug, Clone, Copy)]
pub struct Liveness {
    pub heartbeat_interval: Duration,
    pub client_timeout: Duration,
}

/// A registered client: one connection occupying one room slot.
#[derive(Debug)]
pub struct Client {
    id: ClientId,
    slot: Slot,
    room_id: String,
    cancel: CancellationToken,
    inbound: JoinHandle<()>,
    outbound: JoinHandle<()>,
}

impl Client {
    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Close the connection and leave the room.
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }

    /// Wait until both pumps have finished.
    pub async fn closed(self) {
        let _ = self.inbound.await;
        let _ = self.outbound.await;
    }
}

/// Everything a client's pumps need besides the connection.
pub(crate) struct ClientParts {
    pub id: ClientId,
    pub slot: Slot,
    pub room_id: String,
    pub room_tx: RoomTx,
    pub outbound_rx: OutboundRx,
    pub cancel: CancellationToken,
    pub liveness: Liveness,
}

pub(crate) fn spawn_pumps<C: Connection>(conn: C, parts: ClientParts) -> Client {
    let ClientParts {
        id,
        slot,
        room_id,
        room_tx,
        outbound_rx,
        cancel,
        liveness,
    } = parts;

    let (sink, stream) = conn.split();
    let span = tracing::info_span!("client", room = %room_id, client = %id, role = %slot);

    let inbound = tokio::spawn(
        run_inbound(id, slot, stream, room_tx, cancel.clone(), liveness.client_timeout)
            .instrument(span.clone()),
    );
    let outbound = tokio::spawn(
        run_outbound(sink, outbound_rx, cancel.clone(), liveness.heartbeat_interval).instrument(span),
    );

    Client {
        id,
        slot,
        room_id,
        cancel,
        inbound,
        outbound,
    }
}

/// Why an inbound pump stopped.
#[derive(Debug)]
enum Teardown {
    Closed,
    Failed(ConnectionError),
    Idle,
    Cancelled,
    RoomGone,
}

async fn run_inbound<S: FrameStream>(
    client_id: ClientId,
    slot: Slot,
    mut stream: S,
    room_tx: RoomTx,
    cancel: CancellationToken,
    client_timeout: Duration,
) {
    let reason = loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break Teardown::Cancelled,
            next = timeout(client_timeout, stream.recv()) => next,
        };

        let frame = match next {
            Err(_) => break Teardown::Idle,
            Ok(Err(e)) => break Teardown::Failed(e),
            Ok(Ok(Incoming::Closed)) => break Teardown::Closed,
            Ok(Ok(Incoming::Heartbeat)) => continue,
            Ok(Ok(Incoming::Frame(frame))) => frame,
        };

        let msg = match decode_message(&frame, slot.role()) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, len = frame.len(), "skipping malformed frame");
                continue;
            }
        };

        let sent = tokio::select! {
            _ = cancel.cancelled() => break Teardown::Cancelled,
            sent = room_tx.send(RoomEvent::Inbound(msg)) => sent,
        };
        if sent.is_err() {
            break Teardown::RoomGone;
        }
    };

    match &reason {
        Teardown::Closed => info!("connection closed by peer"),
        Teardown::Failed(e) => warn!(error = %e, "connection failed"),
        Teardown::Idle => warn!(timeout_secs = client_timeout.as_secs(), "connection idle, dropping"),
        Teardown::Cancelled => debug!("connection cancelled"),
        Teardown::RoomGone => warn!("room closed under client"),
    }

    cancel.cancel();
    let _ = room_tx.send(RoomEvent::Leave { slot, client_id }).await;
}

async fn run_outbound<K: FrameSink>(
    mut sink: K,
    mut rx: OutboundRx,
    cancel: CancellationToken,
    heartbeat_interval: Duration,
) {
    let mut ping = tokio::time::interval(heartbeat_interval);
    ping.tick().await; // consume first immediate tick

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = rx.recv() => {
                // The room closes the queue to evict; frames already queued still go out.
                let Some(frame) = frame else {
                    debug!("outbound queue closed");
                    break;
                };
                match bounded_write(&cancel, sink.send(frame)).await {
                    None => break,
                    Some(Ok(())) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "write failed");
                        break;
                    }
                }
            }
            _ = ping.tick() => match bounded_write(&cancel, sink.ping()).await {
                None => break,
                Some(Ok(())) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "ping failed");
                    break;
                }
            },
        }
    }

    match timeout(CLOSE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "close frame not sent"),
        Err(_) => debug!("close frame timed out"),
    }
    cancel.cancel();
}

/// Run one write bounded by `WRITE_TIMEOUT`; `None` if cancelled first.
async fn bounded_write<F>(cancel: &CancellationToken, write: F) -> Option<Result<(), ConnectionError>>
where
    F: Future<Output = Result<(), ConnectionError>>,
{
    tokio::select! {
        _ = cancel.cancelled() => None,
        written = timeout(WRITE_TIMEOUT, write) => {
            Some(written.unwrap_or(Err(ConnectionError::WriteTimeout)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::memory::{self, PeerEvent};
    use room_core::{Message, Role};
    use tokio::sync::mpsc;

    const WAIT: Duration = Duration::from_secs(30);

    struct Harness {
        client: Client,
        peer: memory::MemoryPeer,
        room_rx: mpsc::Receiver<RoomEvent>,
        outbound_tx: mpsc::Sender<bytes::Bytes>,
    }

    fn harness(liveness: Liveness) -> Harness {
        let (conn, peer) = memory::pair(8);
        let (room_tx, room_rx) = mpsc::channel(8);
        let (outbound_tx, outbound_rx) = mpsc::channel(8);
        let client = spawn_pumps(
            conn,
            ClientParts {
                id: ClientId::next(),
                slot: Slot::Polee,
                room_id: "r1".to_string(),
                room_tx,
                outbound_rx,
                cancel: CancellationToken::new(),
                liveness,
            },
        );
        Harness {
            client,
            peer,
            room_rx,
            outbound_tx,
        }
    }

    fn slow_heartbeat() -> Liveness {
        Liveness {
            heartbeat_interval: Duration::from_secs(60),
            client_timeout: Duration::from_secs(120),
        }
    }

    async fn next_event(rx: &mut mpsc::Receiver<RoomEvent>) -> RoomEvent {
        timeout(WAIT, rx.recv()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn inbound_overwrites_sender_and_skips_garbage() {
        let mut h = harness(slow_heartbeat());

        assert!(h.peer.send_text("{not json"));
        assert!(h.peer.send_text(r#"{"content":"hi","from":"interviewer","to":"interviewer"}"#));

        match next_event(&mut h.room_rx).await {
            RoomEvent::Inbound(msg) => {
                assert_eq!(msg, Message::new("hi", Role::Polee, Some(Role::Interviewer)))
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(!h.client.cancel.is_cancelled());
    }

    #[tokio::test]
    async fn outbound_writes_queued_frames_in_order() {
        let mut h = harness(slow_heartbeat());

        h.outbound_tx.send(bytes::Bytes::from_static(b"1")).await.unwrap();
        h.outbound_tx.send(bytes::Bytes::from_static(b"2")).await.unwrap();

        assert_eq!(h.peer.recv_frame().await.unwrap(), "1");
        assert_eq!(h.peer.recv_frame().await.unwrap(), "2");
    }

    #[tokio::test]
    async fn peer_disconnect_sends_leave_and_closes() {
        let mut h = harness(slow_heartbeat());
        let id = h.client.id();

        h.peer.disconnect();

        match next_event(&mut h.room_rx).await {
            RoomEvent::Leave { slot, client_id } => {
                assert_eq!(slot, Slot::Polee);
                assert_eq!(client_id, id);
            }
            other => panic!("unexpected event {other:?}"),
        }
        timeout(WAIT, h.client.closed()).await.unwrap();
        assert_eq!(h.peer.recv().await, None);
    }

    #[tokio::test]
    async fn transport_error_tears_down() {
        let mut h = harness(slow_heartbeat());
        h.peer.fail("reset by peer");
        assert!(matches!(next_event(&mut h.room_rx).await, RoomEvent::Leave { .. }));
        timeout(WAIT, h.client.closed()).await.unwrap();
    }

    #[tokio::test]
    async fn closing_outbound_queue_flushes_then_closes() {
        let mut h = harness(slow_heartbeat());
        h.outbound_tx.send(bytes::Bytes::from_static(b"last")).await.unwrap();
        h.outbound_tx.send(bytes::Bytes::from_static(b"words")).await.unwrap();
        drop(h.outbound_tx);

        assert_eq!(h.peer.recv_frame().await.unwrap(), "last");
        assert_eq!(h.peer.recv_frame().await.unwrap(), "words");
        assert_eq!(timeout(WAIT, h.peer.recv()).await.unwrap(), None);
        assert!(matches!(next_event(&mut h.room_rx).await, RoomEvent::Leave { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_times_out() {
        let mut h = harness(Liveness {
            heartbeat_interval: Duration::from_secs(1),
            client_timeout: Duration::from_secs(3),
        });

        // Pings keep flowing while the peer says nothing back.
        assert_eq!(h.peer.recv().await, Some(PeerEvent::Ping));

        assert!(matches!(next_event(&mut h.room_rx).await, RoomEvent::Leave { .. }));
        assert!(h.client.cancel.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeats_keep_connection_alive() {
        let mut h = harness(Liveness {
            heartbeat_interval: Duration::from_secs(1),
            client_timeout: Duration::from_secs(3),
        });

        for _ in 0..5 {
            tokio::time::sleep(Duration::from_secs(2)).await;
            assert!(h.peer.send_heartbeat());
        }
        assert!(h.room_rx.try_recv().is_err());
        assert!(!h.client.cancel.is_cancelled());
    }

    /// A connection whose writes never complete and whose reads never arrive,
    /// like a half-open socket with a full send buffer.
    struct Wedged;
    struct WedgedSink;
    struct SilentStream;

    #[async_trait::async_trait]
    impl Connection for Wedged {
        type Sink = WedgedSink;
        type Stream = SilentStream;

        fn split(self) -> (WedgedSink, SilentStream) {
            (WedgedSink, SilentStream)
        }

        async fn reject(self, _reason: &str) {}
    }

    #[async_trait::async_trait]
    impl FrameSink for WedgedSink {
        async fn send(&mut self, _frame: bytes::Bytes) -> Result<(), ConnectionError> {
            std::future::pending().await
        }

        async fn ping(&mut self) -> Result<(), ConnectionError> {
            std::future::pending().await
        }

        async fn close(&mut self) -> Result<(), ConnectionError> {
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl FrameStream for SilentStream {
        async fn recv(&mut self) -> Result<Incoming, ConnectionError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_ping_does_not_hold_up_teardown() {
        let (room_tx, mut room_rx) = mpsc::channel(8);
        let (_outbound_tx, outbound_rx) = mpsc::channel(8);
        let client = spawn_pumps(
            Wedged,
            ClientParts {
                id: ClientId::next(),
                slot: Slot::Interviewer,
                room_id: "r1".to_string(),
                room_tx,
                outbound_rx,
                cancel: CancellationToken::new(),
                liveness: Liveness {
                    heartbeat_interval: Duration::from_secs(1),
                    client_timeout: Duration::from_secs(3),
                },
            },
        );

        // The ping at 1s hangs; the idle timeout at 3s must still end both pumps.
        assert!(matches!(next_event(&mut room_rx).await, RoomEvent::Leave { .. }));
        timeout(Duration::from_secs(1), client.closed())
            .await
            .expect("outbound pump stuck in ping after cancellation");
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_write_times_out() {
        let (room_tx, mut room_rx) = mpsc::channel(8);
        let (outbound_tx, outbound_rx) = mpsc::channel(8);
        let client = spawn_pumps(
            Wedged,
            ClientParts {
                id: ClientId::next(),
                slot: Slot::Polee,
                room_id: "r1".to_string(),
                room_tx,
                outbound_rx,
                cancel: CancellationToken::new(),
                liveness: Liveness {
                    heartbeat_interval: Duration::from_secs(600),
                    client_timeout: Duration::from_secs(1200),
                },
            },
        );

        outbound_tx.send(bytes::Bytes::from_static(b"stuck")).await.unwrap();

        assert!(matches!(next_event(&mut room_rx).await, RoomEvent::Leave { .. }));
        timeout(WRITE_TIMEOUT, client.closed()).await.unwrap();
    }
}
