//! Room handles held by the connection manager.
//!
//! A [`RoomHandle`] is the cheap, clonable front of one room: the
//! sending side of its event queue plus occupancy counters the manager
//! reads when deciding whether an empty room can be evicted.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use room_core::{RoomError, Slot};
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use crate::ai::AiResponder;
use crate::room_task::{self, RoomSettings};
use crate::types::{ClientHandle, RoomEvent, RoomTx};

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Members (joined or joining) of a room, and when it last lost one.
///
/// `reserve` is only called under the room directory lock, so a room
/// seen with zero members there cannot gain one behind the manager's back.
#[derive(Debug)]
pub struct Occupancy {
    members: AtomicUsize,
    last_vacated_ms: AtomicU64,
}

impl Occupancy {
    pub(crate) fn new() -> Self {
        Self {
            members: AtomicUsize::new(0),
            last_vacated_ms: AtomicU64::new(now_millis()),
        }
    }

    pub(crate) fn reserve(&self) {
        self.members.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn release(&self) {
        self.last_vacated_ms.store(now_millis(), Ordering::SeqCst);
        self.members.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn members(&self) -> usize {
        self.members.load(Ordering::SeqCst)
    }

    /// True if nobody is in the room and nobody left within `idle`.
    pub fn is_idle(&self, idle: Duration) -> bool {
        if self.members() > 0 {
            return false;
        }
        let vacated = self.last_vacated_ms.load(Ordering::SeqCst);
        now_millis().saturating_sub(vacated) >= idle.as_millis() as u64
    }
}

#[derive(Clone)]
pub struct RoomHandle {
    id: Arc<str>,
    tx: RoomTx,
    occupancy: Arc<Occupancy>,
}

impl RoomHandle {
    /// Create a room and start its dispatch task.
    pub fn spawn(
        id: &str,
        ai: Arc<dyn AiResponder>,
        settings: RoomSettings,
        inbound_capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(inbound_capacity);
        let occupancy = Arc::new(Occupancy::new());
        let id: Arc<str> = Arc::from(id);

        let span = tracing::info_span!("room", room = %id);
        tokio::spawn(
            room_task::run_room_loop(Arc::clone(&id), rx, ai, settings, Arc::clone(&occupancy))
                .instrument(span),
        );

        Self { id, tx, occupancy }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sender(&self) -> RoomTx {
        self.tx.clone()
    }

    pub fn occupancy(&self) -> &Occupancy {
        &self.occupancy
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Ask the room to seat `client`. The caller must have reserved a
    /// member place beforehand; it is given back on failure.
    pub async fn join(&self, client: ClientHandle) -> Result<(), RoomError> {
        let (reply, response) = oneshot::channel();
        if self.tx.send(RoomEvent::Join { client, reply }).await.is_err() {
            self.occupancy.release();
            return Err(RoomError::RoomClosed(self.id.to_string()));
        }
        match response.await {
            Ok(result) => result,
            Err(_) => {
                self.occupancy.release();
                Err(RoomError::RoomClosed(self.id.to_string()))
            }
        }
    }

    pub async fn occupied_slots(&self) -> Result<Vec<Slot>, RoomError> {
        let (reply, response) = oneshot::channel();
        let closed = || RoomError::RoomClosed(self.id.to_string());
        self.tx
            .send(RoomEvent::Inspect { reply })
            .await
            .map_err(|_| closed())?;
        response.await.map_err(|_| closed())
    }
}
