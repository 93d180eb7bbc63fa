//! Room struct definition
//!
//! A named group of members sharing broadcast scope. Members are kept in
//! join order and a connection can appear at most once.

use crate::member::Member;
use crate::types::{ClientId, RoomName};

/// Chat room
#[derive(Debug)]
pub struct Room {
    /// Room name as requested by the first member
    pub name: RoomName,
    /// Members in join order
    members: Vec<Member>,
}

impl Room {
    /// Create an empty room
    pub fn new(name: RoomName) -> Self {
        Self {
            name,
            members: Vec::new(),
        }
    }

    /// Members in join order
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether the room carries the private marker
    pub fn is_private(&self) -> bool {
        self.name.is_private()
    }

    /// Check if a connection is in this room
    pub fn contains(&self, client_id: ClientId) -> bool {
        self.members.iter().any(|m| m.id == client_id)
    }

    /// Check if a username is already used in this room
    pub fn has_username(&self, username: &str) -> bool {
        self.members.iter().any(|m| m.username == username)
    }

    /// Append a member
    ///
    /// Returns false (and leaves the room untouched) if the connection is
    /// already a member.
    pub fn insert(&mut self, member: Member) -> bool {
        if self.contains(member.id) {
            return false;
        }
        self.members.push(member);
        true
    }

    /// Remove a connection from the room
    ///
    /// Returns the removed member, or None if the connection wasn't in the room.
    pub fn remove(&mut self, client_id: ClientId) -> Option<Member> {
        let index = self.members.iter().position(|m| m.id == client_id)?;
        Some(self.members.remove(index))
    }

    /// Usernames in join order
    pub fn usernames(&self) -> Vec<String> {
        self.members.iter().map(|m| m.username.clone()).collect()
    }
}
