//! Broadcast engine
//!
//! Fan-out of one message to every member of a room, in join order. Delivery
//! never waits on a member. A closed outbox is skipped; a member too far
//! behind is refused and its handler disconnects it. Either way the member
//! stays registered until its own handler leaves.

use tracing::{debug, warn};

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::room::Room;
use crate::types::ClientId;

/// Outcome of a single broadcast
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Members the message was queued for
    pub delivered: usize,
    /// Members skipped because their connection is already gone
    pub skipped: usize,
    /// Members refused for lagging; each one is being disconnected
    pub lagging: usize,
}

/// Send a message to every member of the room
pub fn broadcast(room: &Room, msg: &ServerMessage) -> BroadcastReport {
    broadcast_except(room, msg, None)
}

/// Send a message to every member of the room except `exclude`
pub fn broadcast_except(
    room: &Room,
    msg: &ServerMessage,
    exclude: Option<ClientId>,
) -> BroadcastReport {
    let mut report = BroadcastReport::default();

    for member in room.members() {
        if Some(member.id) == exclude {
            continue;
        }
        match member.deliver(msg.clone()) {
            Ok(()) => report.delivered += 1,
            Err(SendError::ChannelClosed) => {
                debug!(room = %room.name, member = %member.username, "skipping closed connection");
                report.skipped += 1;
            }
            Err(SendError::Lagging) => {
                warn!(room = %room.name, member = %member.username, "member too far behind, disconnecting");
                report.lagging += 1;
            }
        }
    }

    report
}
