//! Message protocol definitions
//!
//! Everything the server writes to a client is a `ServerMessage`. On the wire
//! it is rendered either as the classic human-readable line or as a JSON
//! object tagged with `type`, so clients never have to guess what a line is
//! from its wording.

use serde::{Deserialize, Serialize};

use crate::error::AdmissionError;

/// Line encoding used on a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum WireFormat {
    /// Plain text lines (`Active users in room ...`, `bob joined the room.`)
    #[default]
    Text,
    /// One JSON object per line, tagged with `type`
    Json,
}

/// Server → Client message
///
/// Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Current members of the room, in join order
    Roster { room: String, users: Vec<String> },
    /// A member was admitted
    Joined { username: String },
    /// A member disconnected
    Left { username: String },
    /// Chat line relayed verbatim
    Chat { body: String },
    /// Registration refused; the connection is closed right after
    Rejected { code: ErrorCode, message: String },
}

/// Error codes for ServerMessage::Rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Private room already has 2 people
    RoomFull,
    /// Empty username line
    EmptyUsername,
    /// Empty room line
    EmptyRoomName,
    /// Username already used in the room
    UsernameTaken,
    /// Connection already registered
    AlreadyMember,
}

impl ServerMessage {
    /// Render the classic human-readable line (without terminator)
    pub fn to_text_line(&self) -> String {
        match self {
            ServerMessage::Roster { room, users } => {
                format!("Active users in room {}: {}", room, users.join(", "))
            }
            ServerMessage::Joined { username } => format!("{} joined the room.", username),
            ServerMessage::Left { username } => format!("{} left the room.", username),
            ServerMessage::Chat { body } => body.clone(),
            ServerMessage::Rejected { message, .. } => message.clone(),
        }
    }

    /// Encode as a single line (without terminator) in the given format
    pub fn encode(&self, format: WireFormat) -> Result<String, serde_json::Error> {
        match format {
            WireFormat::Text => Ok(self.to_text_line()),
            WireFormat::Json => serde_json::to_string(self),
        }
    }

    /// Decode one JSON line
    pub fn decode_json(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Whether this message describes a membership change
    pub fn is_presence(&self) -> bool {
        matches!(
            self,
            ServerMessage::Roster { .. } | ServerMessage::Joined { .. } | ServerMessage::Left { .. }
        )
    }
}

/// Convert an admission rejection to the message sent before closing
impl From<&AdmissionError> for ServerMessage {
    fn from(err: &AdmissionError) -> Self {
        let (code, message) = match err {
            AdmissionError::RoomFull(_) => (ErrorCode::RoomFull, "Room is already occupied.".to_string()),
            AdmissionError::EmptyUsername => {
                (ErrorCode::EmptyUsername, "Username must not be empty.".to_string())
            }
            AdmissionError::EmptyRoomName => {
                (ErrorCode::EmptyRoomName, "Room name must not be empty.".to_string())
            }
            AdmissionError::UsernameTaken { username, room } => (
                ErrorCode::UsernameTaken,
                format!("Username {} is already taken in room {}.", username, room),
            ),
            AdmissionError::AlreadyMember(room) => (
                ErrorCode::AlreadyMember,
                format!("Already a member of room {}.", room),
            ),
        };
        ServerMessage::Rejected { code, message }
    }
}
