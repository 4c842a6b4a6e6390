//! room-protocol
//!
//! Wire-level encoding/decoding for interview rooms.
//!
//! This crate turns logical `room_core::Message`s into JSON frames and
//! back, and parses the query parameters of the upgrade request.
//!
//! - [`wire_types`] : serde mirror of the JSON frame
//! - [`json_codec`] : frame <-> `Message`
//! - [`connect`]    : `?room=..&role=..` parsing

pub mod connect;
pub mod json_codec;
pub mod wire_types;

pub use connect::{parse_connect_role, ConnectParams};
pub use json_codec::{decode_message, encode_message, ProtocolError};
