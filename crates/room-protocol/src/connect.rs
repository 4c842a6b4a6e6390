//! Query parameters of the upgrade request: `/ws?room=<id>&role=<role>`.

use room_core::Role;
use serde::Deserialize;

use crate::json_codec::ProtocolError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectParams {
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub role: String,
}

impl ConnectParams {
    /// Validate into `(room_id, role)`.
    pub fn validate(&self) -> Result<(&str, Role), ProtocolError> {
        if self.room.is_empty() {
            return Err(ProtocolError::MissingRoom);
        }
        let role = parse_connect_role(&self.role)?;
        Ok((self.room.as_str(), role))
    }
}

/// Parse the role a connection asks for (case-sensitive).
///
/// `"ai"` parses here; refusing it is the room manager's decision.
pub fn parse_connect_role(s: &str) -> Result<Role, ProtocolError> {
    Role::from_wire(s).ok_or_else(|| ProtocolError::UnknownRole(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(room: &str, role: &str) -> ConnectParams {
        ConnectParams {
            room: room.to_string(),
            role: role.to_string(),
        }
    }

    #[test]
    fn accepts_known_roles() {
        assert_eq!(params("r1", "interviewer").validate().unwrap(), ("r1", Role::Interviewer));
        assert_eq!(params("r1", "interviewee").validate().unwrap(), ("r1", Role::Polee));
        assert_eq!(params("r1", "polee").validate().unwrap(), ("r1", Role::Polee));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            params("r1", "Interviewer").validate(),
            Err(ProtocolError::UnknownRole(r)) if r == "Interviewer"
        ));
        assert!(matches!(params("", "polee").validate(), Err(ProtocolError::MissingRoom)));
        assert!(matches!(params("r1", "").validate(), Err(ProtocolError::UnknownRole(_))));
    }
}
