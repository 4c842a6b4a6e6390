//! Participant roles.
//!
//! A [`Role`] is what a message is addressed from / to. A [`Slot`] is the
//! subset of roles a human connection can occupy inside a room.

use std::fmt;

use crate::error::RoomError;

/// Who a message comes from or is addressed to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Interviewer,
    Polee,
    Ai,
}

impl Role {
    /// Wire name of the role (`"interviewer"`, `"polee"`, `"ai"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Interviewer => "interviewer",
            Role::Polee => "polee",
            Role::Ai => "ai",
        }
    }

    /// Parse a wire name (case-sensitive).
    ///
    /// `"interviewee"` is accepted as an alias for [`Role::Polee`].
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "interviewer" => Some(Role::Interviewer),
            "polee" | "interviewee" => Some(Role::Polee),
            "ai" => Some(Role::Ai),
            _ => None,
        }
    }

    /// True for the roles a connection may register as.
    pub fn is_human(self) -> bool {
        Slot::try_from(self).is_ok()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A room's reserved position for one human role.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Slot {
    Interviewer,
    Polee,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::Interviewer, Slot::Polee];

    pub fn role(self) -> Role {
        match self {
            Slot::Interviewer => Role::Interviewer,
            Slot::Polee => Role::Polee,
        }
    }
}

impl TryFrom<Role> for Slot {
    type Error = RoomError;

    fn try_from(role: Role) -> Result<Self, Self::Error> {
        match role {
            Role::Interviewer => Ok(Slot::Interviewer),
            Role::Polee => Ok(Slot::Polee),
            Role::Ai => Err(RoomError::InvalidRole(role)),
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.role().fmt(f)
    }
}
