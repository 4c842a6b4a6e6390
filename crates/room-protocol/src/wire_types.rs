//! Serde representation of a message frame.
//!
//! ```json
//! {"content": "hello", "from": "polee", "to": "interviewer"}
//! ```
//!
//! Fields are kept as loose strings on the way in so that an unknown
//! `to` degrades to a broadcast instead of a decode failure.

use serde::{Deserialize, Serialize};

/// Frame as received from a client.
#[derive(Debug, Deserialize)]
pub struct InboundFrame {
    /// Missing or `null` content is an empty message.
    #[serde(default)]
    pub content: Option<String>,

    /// Advisory only; replaced by the sender's role.
    #[serde(default)]
    pub from: Option<String>,

    #[serde(default)]
    pub to: Option<String>,
}

/// Frame as sent to a client.
#[derive(Debug, Serialize)]
pub struct OutboundFrame<'a> {
    pub content: &'a str,
    pub from: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<&'static str>,
}
