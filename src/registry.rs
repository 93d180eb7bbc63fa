//! Room registry
//!
//! The single source of truth for membership: room name -> ordered members.
//! Owned by the `ChatServer` actor, so every mutation is serialized through
//! its command loop and never spans a suspension point.

use std::collections::HashMap;

use tracing::debug;

use crate::member::Member;
use crate::room::Room;
use crate::types::{ClientId, RoomName};

/// Mapping from room name to room
///
/// Rooms are created lazily and never destroyed; an emptied room stays in
/// the map with no members.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomName, Room>,
    /// Next join order handed out by `insert`
    next_join_order: u64,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a room, creating it empty if it doesn't exist yet
    pub fn get_or_create(&mut self, name: &RoomName) -> &mut Room {
        self.rooms.entry(name.clone()).or_insert_with(|| {
            debug!(room = %name, "room created");
            Room::new(name.clone())
        })
    }

    /// Look up an existing room
    pub fn room(&self, name: &RoomName) -> Option<&Room> {
        self.rooms.get(name)
    }

    /// Insert a member, assigning its join order
    ///
    /// Returns false if the connection is already in the room.
    pub fn insert(&mut self, name: &RoomName, mut member: Member) -> bool {
        member.join_order = self.next_join_order;
        let inserted = self.get_or_create(name).insert(member);
        if inserted {
            self.next_join_order += 1;
        }
        inserted
    }

    /// Remove a connection from a room
    ///
    /// Idempotent: removing a connection that isn't present returns None.
    pub fn remove(&mut self, name: &RoomName, client_id: ClientId) -> Option<Member> {
        self.rooms.get_mut(name)?.remove(client_id)
    }

    /// Usernames of a room in join order (empty for unknown rooms)
    pub fn snapshot(&self, name: &RoomName) -> Vec<String> {
        self.rooms
            .get(name)
            .map(Room::usernames)
            .unwrap_or_default()
    }

    /// Number of rooms, including empty ones
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of members across all rooms
    pub fn member_count(&self) -> usize {
        self.rooms.values().map(Room::len).sum()
    }
}
