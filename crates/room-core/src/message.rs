//! Message type relayed inside a room.
//!
//! This is the **transport-agnostic** logical message; JSON encoding
//! lives in the `room-protocol` crate.

use crate::role::Role;

/// A chat message between participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub content: String,

    /// Always the sender's own role; never trusted from the wire.
    pub from: Role,

    /// Destination role. `None` broadcasts to both human slots.
    pub to: Option<Role>,
}

impl Message {
    pub fn new(content: impl Into<String>, from: Role, to: Option<Role>) -> Self {
        Self {
            content: content.into(),
            from,
            to,
        }
    }

    /// Reply generated by the AI backend, always delivered to the interviewer.
    pub fn ai_reply(content: impl Into<String>) -> Self {
        Self::new(content, Role::Ai, Some(Role::Interviewer))
    }

    pub fn is_broadcast(&self) -> bool {
        self.to.is_none()
    }
}
