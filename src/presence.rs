//! Presence notifier
//!
//! Roster and join/leave announcements. The roster is always re-read from
//! the registry at announcement time.

use tracing::debug;

use crate::broadcast::{broadcast, BroadcastReport};
use crate::message::ServerMessage;
use crate::registry::RoomRegistry;
use crate::types::RoomName;

/// Membership change being announced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceEvent {
    Joined,
    Left,
}

impl PresenceEvent {
    fn message(self, username: &str) -> ServerMessage {
        let username = username.to_string();
        match self {
            PresenceEvent::Joined => ServerMessage::Joined { username },
            PresenceEvent::Left => ServerMessage::Left { username },
        }
    }
}

/// Broadcast the current roster of a room to its members
pub fn announce_roster(registry: &RoomRegistry, room: &RoomName) -> BroadcastReport {
    let Some(state) = registry.room(room) else {
        return BroadcastReport::default();
    };

    let users = registry.snapshot(room);
    debug!(room = %room, users = ?users, "announcing roster");

    broadcast(
        state,
        &ServerMessage::Roster {
            room: room.to_string(),
            users,
        },
    )
}

/// Broadcast a join or leave line to the members of a room
pub fn announce_event(
    registry: &RoomRegistry,
    room: &RoomName,
    username: &str,
    event: PresenceEvent,
) -> BroadcastReport {
    match registry.room(room) {
        Some(state) => broadcast(state, &event.message(username)),
        None => BroadcastReport::default(),
    }
}
