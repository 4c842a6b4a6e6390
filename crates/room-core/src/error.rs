//! Error types for room operations.

use thiserror::Error;

use crate::role::{Role, Slot};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    /// Only human roles may register a connection.
    #[error("role `{0}` cannot occupy a room slot")]
    InvalidRole(Role),

    /// The requested slot already holds a client.
    #[error("{0} slot is already occupied")]
    SlotOccupied(Slot),

    /// The room's dispatch loop is no longer running.
    #[error("room `{0}` is closed")]
    RoomClosed(String),
}
