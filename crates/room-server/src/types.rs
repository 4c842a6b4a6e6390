//! Shared types for the room server.
//!
//! This module defines:
//! - `ClientId`: a lightweight handle for connected clients
//! - channel aliases between clients and room dispatch tasks
//! - `RoomEvent`: everything flowing into a room's dispatch task

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use room_core::{Message, RoomError, Slot};
use tokio::sync::{mpsc, oneshot};

/// Identifier for a connected client.
///
/// This is intentionally opaque; we just guarantee uniqueness
/// over the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub u64);

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

impl ClientId {
    pub fn next() -> Self {
        ClientId(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encoded frames queued for one client's outbound pump.
pub type OutboundTx = mpsc::Sender<Bytes>;
pub type OutboundRx = mpsc::Receiver<Bytes>;

/// What a room keeps in a slot.
///
/// The room holds the only `outbound` sender, so dropping the handle
/// closes the client's outbound queue. The outbound pump then flushes
/// what is queued, closes the connection and stops the inbound pump.
#[derive(Debug)]
pub struct ClientHandle {
    pub id: ClientId,
    pub slot: Slot,
    pub outbound: OutboundTx,
}

/// Event flowing into a room's dispatch task.
///
/// Slot changes travel through the same queue as chat messages, so a
/// room's dispatch task is the only place its slots are touched.
#[derive(Debug)]
pub enum RoomEvent {
    /// Claim `client.slot` for `client`.
    Join {
        client: ClientHandle,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// A decoded message; `from` is already the sender's role.
    Inbound(Message),

    /// The client's inbound pump has torn down.
    Leave { slot: Slot, client_id: ClientId },

    /// Report which slots are occupied.
    Inspect { reply: oneshot::Sender<Vec<Slot>> },
}

/// Channel from clients → room dispatch task.
pub type RoomTx = mpsc::Sender<RoomEvent>;
pub type RoomRx = mpsc::Receiver<RoomEvent>;
