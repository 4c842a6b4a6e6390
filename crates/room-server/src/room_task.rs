//! Per-room dispatch loop.
//!
//! This task owns the room's slots and processes every `RoomEvent`
//! one at a time, which is what orders a room:
//! - messages are routed in the order they were enqueued,
//! - at most one AI round trip is outstanding,
//! - joins, leaves and routing never interleave.
//!
//! Forwarding never blocks: a client whose outbound queue is full is
//! dropped from its slot instead of stalling the room.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use room_core::{plan_route, Message, Route, RoomError, Slot, SlotPair};
use room_protocol::encode_message;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use crate::ai::AiResponder;
use crate::room::Occupancy;
use crate::types::{ClientHandle, ClientId, RoomEvent, RoomRx};

#[derive(Debug, Clone)]
pub struct RoomSettings {
    pub ai_system_prompt: String,
    pub ai_timeout: Duration,
}

/// Run a room's dispatch loop until every sender to it is gone.
pub(crate) async fn run_room_loop(
    room_id: Arc<str>,
    mut rx: RoomRx,
    ai: Arc<dyn AiResponder>,
    settings: RoomSettings,
    occupancy: Arc<Occupancy>,
) {
    let mut router = Router::new(ai, settings, occupancy);

    while let Some(event) = rx.recv().await {
        router.handle(event).await;
    }

    router.clear();
    info!(room = %room_id, "room dispatch loop shutting down");
}

pub(crate) struct Router {
    slots: SlotPair<ClientHandle>,
    ai: Arc<dyn AiResponder>,
    settings: RoomSettings,
    occupancy: Arc<Occupancy>,
}

impl Router {
    pub(crate) fn new(ai: Arc<dyn AiResponder>, settings: RoomSettings, occupancy: Arc<Occupancy>) -> Self {
        Self {
            slots: SlotPair::new(),
            ai,
            settings,
            occupancy,
        }
    }

    pub(crate) async fn handle(&mut self, event: RoomEvent) {
        match event {
            RoomEvent::Join { client, reply } => {
                let result = self.join(client);
                let _ = reply.send(result);
            }
            RoomEvent::Inbound(msg) => self.route(msg).await,
            RoomEvent::Leave { slot, client_id } => self.leave(slot, client_id),
            RoomEvent::Inspect { reply } => {
                let _ = reply.send(self.slots.occupied());
            }
        }
    }

    fn join(&mut self, client: ClientHandle) -> Result<(), RoomError> {
        let (id, slot) = (client.id, client.slot);
        match self.slots.claim(slot, client) {
            Ok(()) => {
                info!(client = %id, role = %slot, "client joined");
                Ok(())
            }
            Err(e) => {
                self.occupancy.release();
                warn!(client = %id, role = %slot, "slot already occupied");
                Err(e)
            }
        }
    }

    fn leave(&mut self, slot: Slot, client_id: ClientId) {
        match self.slots.release_if(slot, |c| c.id == client_id) {
            Some(_client) => {
                self.occupancy.release();
                info!(client = %client_id, role = %slot, "client left");
            }
            None => debug!(client = %client_id, role = %slot, "stale leave ignored"),
        }
    }

    async fn route(&mut self, msg: Message) {
        match plan_route(&msg) {
            Route::AskAi => self.ask_ai(msg).await,
            route => self.forward(route, &msg),
        }
    }

    async fn ask_ai(&mut self, msg: Message) {
        let call = self.ai.generate(&msg.content, &self.settings.ai_system_prompt);
        match timeout(self.settings.ai_timeout, call).await {
            Ok(Ok(text)) => {
                let reply = Message::ai_reply(text);
                self.forward(plan_route(&reply), &reply);
            }
            Ok(Err(e)) => {
                warn!(from = %msg.from, error = %e, "AI responder failed, dropping message");
            }
            Err(_) => {
                warn!(
                    from = %msg.from,
                    timeout_ms = self.settings.ai_timeout.as_millis() as u64,
                    "AI responder timed out, dropping message"
                );
            }
        }
    }

    fn forward(&mut self, route: Route, msg: &Message) {
        let frame = match encode_message(msg) {
            Ok(frame) => frame,
            Err(e) => {
                error!(error = %e, "failed to encode message");
                return;
            }
        };

        for slot in route.targets() {
            self.send_to_slot(*slot, frame.clone());
        }
    }

    fn send_to_slot(&mut self, slot: Slot, frame: Bytes) {
        let Some(client) = self.slots.get(slot) else {
            trace!(role = %slot, "slot empty, dropping message");
            return;
        };

        let result = client.outbound.try_send(frame);
        match result {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(client = %client.id, role = %slot, "outbound queue full, dropping client");
                self.evict(slot);
            }
            Err(TrySendError::Closed(_)) => {
                debug!(client = %client.id, role = %slot, "outbound queue closed, dropping client");
                self.evict(slot);
            }
        }
    }

    /// Remove a slot's client. Dropping its handle closes the outbound
    /// queue; the client's pumps wind down once it is flushed.
    fn evict(&mut self, slot: Slot) {
        if self.slots.take(slot).is_some() {
            self.occupancy.release();
        }
    }

    fn clear(&mut self) {
        for slot in Slot::ALL {
            self.evict(slot);
        }
    }
}
