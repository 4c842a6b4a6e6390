//! JSON codec for room messages.

use bytes::Bytes;
use room_core::{Message, Role};
use thiserror::Error;

use crate::wire_types::{InboundFrame, OutboundFrame};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown role `{0}`")]
    UnknownRole(String),

    #[error("missing room id")]
    MissingRoom,
}

/// Decode one inbound frame sent by a client holding `sender`.
///
/// `from` on the wire is ignored. A missing or unrecognized `to`
/// yields a broadcast message.
pub fn decode_message(frame: &[u8], sender: Role) -> Result<Message, ProtocolError> {
    let wire: InboundFrame = serde_json::from_slice(frame)?;
    let to = wire.to.as_deref().and_then(Role::from_wire);
    Ok(Message::new(wire.content.unwrap_or_default(), sender, to))
}

pub fn encode_message(msg: &Message) -> Result<Bytes, ProtocolError> {
    let wire = OutboundFrame {
        content: &msg.content,
        from: msg.from.as_str(),
        to: msg.to.map(Role::as_str),
    };
    Ok(Bytes::from(serde_json::to_vec(&wire)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn as_json(bytes: &Bytes) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn from_is_overwritten_by_sender() {
        let frame = br#"{"content":"hello","from":"interviewer","to":"interviewer"}"#;
        let msg = decode_message(frame, Role::Polee).unwrap();
        assert_eq!(msg, Message::new("hello", Role::Polee, Some(Role::Interviewer)));
    }

    #[test]
    fn missing_or_unknown_to_is_broadcast() {
        let msg = decode_message(br#"{"content":"a"}"#, Role::Polee).unwrap();
        assert!(msg.is_broadcast());

        let msg = decode_message(br#"{"content":"a","to":"everyone"}"#, Role::Polee).unwrap();
        assert!(msg.is_broadcast());

        let msg = decode_message(br#"{"content":"a","to":"Interviewer"}"#, Role::Polee).unwrap();
        assert!(msg.is_broadcast());
    }

    #[test]
    fn null_or_missing_content_is_empty() {
        let msg = decode_message(br#"{"content":null,"to":"polee"}"#, Role::Interviewer).unwrap();
        assert_eq!(msg, Message::new("", Role::Interviewer, Some(Role::Polee)));

        let msg = decode_message(br#"{"to":null}"#, Role::Polee).unwrap();
        assert_eq!(msg.content, "");
        assert!(msg.is_broadcast());
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert!(matches!(
            decode_message(b"not json", Role::Polee),
            Err(ProtocolError::Json(_))
        ));
        assert!(matches!(
            decode_message(br#"{"content": 42}"#, Role::Polee),
            Err(ProtocolError::Json(_))
        ));
        assert!(decode_message(br#""just text""#, Role::Interviewer).is_err());
    }

    #[test]
    fn encodes_wire_names() {
        let msg = Message::new("hello", Role::Polee, Some(Role::Interviewer));
        let encoded = encode_message(&msg).unwrap();
        assert_eq!(
            as_json(&encoded),
            json!({"content": "hello", "from": "polee", "to": "interviewer"})
        );
    }

    #[test]
    fn broadcast_omits_to() {
        let encoded = encode_message(&Message::new("hey", Role::Interviewer, None)).unwrap();
        assert_eq!(as_json(&encoded), json!({"content": "hey", "from": "interviewer"}));
    }

    #[test]
    fn ai_reply_frame() {
        let encoded = encode_message(&Message::ai_reply("I am human")).unwrap();
        assert_eq!(
            as_json(&encoded),
            json!({"content": "I am human", "from": "ai", "to": "interviewer"})
        );
    }
}
