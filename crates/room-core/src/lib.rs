//! room-core
//!
//! Pure interview room logic:
//! - roles and the two human slots
//! - messages (transport-agnostic)
//! - routing policy for a room's dispatch loop
//! - the slot pair a room keeps its clients in

pub mod error;
pub mod message;
pub mod role;
pub mod routing;
pub mod slots;

pub use error::RoomError;
pub use message::Message;
pub use role::{Role, Slot};
pub use routing::{plan_route, Route};
pub use slots::SlotPair;
