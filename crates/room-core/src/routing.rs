//! Routing policy for a room's dispatch loop.
//!
//! | to          | route                          |
//! |-------------|--------------------------------|
//! | interviewer | deliver to the interviewer slot |
//! | polee       | deliver to the polee slot      |
//! | ai          | ask the AI responder, reply to the interviewer |
//! | unset       | broadcast to both slots        |
//!
//! Deciding *where* a message goes is kept separate from *how* it is
//! delivered, so the table above can be tested without any I/O.

use crate::message::Message;
use crate::role::{Role, Slot};

/// What the dispatch loop should do with one message.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Route {
    /// Forward to a single slot; dropped if the slot is empty.
    Deliver(Slot),

    /// Call the AI responder; its reply goes to the interviewer slot.
    AskAi,

    /// Forward independently to both slots.
    Broadcast,
}

impl Route {
    /// Slots a message on this route is forwarded to directly.
    ///
    /// Empty for [`Route::AskAi`]: the reply is routed separately.
    pub fn targets(self) -> &'static [Slot] {
        match self {
            Route::Deliver(Slot::Interviewer) => &[Slot::Interviewer],
            Route::Deliver(Slot::Polee) => &[Slot::Polee],
            Route::AskAi => &[],
            Route::Broadcast => &Slot::ALL,
        }
    }
}

pub fn plan_route(msg: &Message) -> Route {
    match msg.to {
        Some(Role::Interviewer) => Route::Deliver(Slot::Interviewer),
        Some(Role::Polee) => Route::Deliver(Slot::Polee),
        Some(Role::Ai) => Route::AskAi,
        None => Route::Broadcast,
    }
}
