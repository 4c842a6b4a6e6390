//! room-server
//!
//! WebSocket relay that pairs an interviewer and an interviewee in a
//! room and optionally lets an AI backend answer in place of a human.

pub mod ai;
pub mod client;
pub mod config;
pub mod connection;
pub mod logging;
pub mod manager;
pub mod room;
pub mod server;
pub mod types;

// internal, not re-exported
mod room_task;

pub use ai::{AiError, AiResponder, OllamaResponder, Scripted, ScriptedResponder};
pub use client::{Client, Liveness};
pub use config::Config;
pub use manager::{ConnectionManager, ManagerSettings};
pub use room_task::RoomSettings;
