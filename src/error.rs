//! Error types for the chat relay
//!
//! Defines connection-level errors, admission rejections and outbox send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Connection-level errors
///
/// Any of these ends the affected connection through its normal cleanup
/// path. None of them reach the accept loop.
#[derive(Debug, Error)]
pub enum AppError {
    /// Transport error on the socket (fatal for the connection)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel send error (fatal - the server actor is gone)
    #[error("Channel send error")]
    ChannelSend,

    /// Peer sent a line longer than the configured limit
    #[error("Line exceeds {0} bytes")]
    LineTooLong(usize),

    /// Outgoing chat body contains a line terminator
    #[error("Message must not contain line terminators")]
    EmbeddedNewline,
}

/// Reasons the Admission Controller refuses a registration
///
/// Sent back to the offending connection only, followed by a close.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// Private room already holds two members
    #[error("Room {0} is full")]
    RoomFull(String),

    /// Username line was empty
    #[error("Username must not be empty")]
    EmptyUsername,

    /// Room line was empty
    #[error("Room name must not be empty")]
    EmptyRoomName,

    /// Another member of the room uses the same name
    #[error("Username {username} is already taken in room {room}")]
    UsernameTaken { username: String, room: String },

    /// Connection is already registered in the room
    #[error("Connection is already a member of room {0}")]
    AlreadyMember(String),
}

/// Outbox send errors
///
/// Occurs when a broadcast cannot hand a message to a member's writer task.
#[derive(Debug, Error)]
pub enum SendError {
    /// The member's writer task has gone away
    #[error("Channel closed")]
    ChannelClosed,

    /// The member has too many undelivered messages and is being dropped
    #[error("Member is lagging")]
    Lagging,
}
