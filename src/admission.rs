//! Admission controller
//!
//! Decides whether a registering connection may enter a room and, if so,
//! inserts it. The check and the insert happen in one synchronous call on
//! the registry, so two late arrivals can never both pass the private-room
//! count check.

use tracing::debug;

use crate::error::AdmissionError;
use crate::member::Member;
use crate::registry::RoomRegistry;
use crate::types::RoomName;

/// Maximum number of members in a private room
pub const PRIVATE_ROOM_CAPACITY: usize = 2;

/// Admission rules
#[derive(Debug, Clone)]
pub struct AdmissionController {
    /// Members allowed in a room carrying the private marker
    pub private_capacity: usize,
    /// Refuse a username already present in the target room
    pub unique_usernames: bool,
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self {
            private_capacity: PRIVATE_ROOM_CAPACITY,
            unique_usernames: true,
        }
    }
}

impl AdmissionController {
    pub fn new(unique_usernames: bool) -> Self {
        Self {
            unique_usernames,
            ..Self::default()
        }
    }

    /// Validate a registration and insert the candidate on success
    ///
    /// Nothing is inserted when an error is returned. Rooms are created on
    /// first valid request, even if that request is then refused.
    pub fn admit(
        &self,
        registry: &mut RoomRegistry,
        room: &RoomName,
        candidate: Member,
    ) -> Result<(), AdmissionError> {
        if candidate.username.is_empty() {
            return Err(AdmissionError::EmptyUsername);
        }
        if room.is_empty() {
            return Err(AdmissionError::EmptyRoomName);
        }

        let existing = registry.get_or_create(room);

        if existing.contains(candidate.id) {
            return Err(AdmissionError::AlreadyMember(room.to_string()));
        }

        if existing.is_private() && existing.len() >= self.private_capacity {
            debug!(room = %room, members = existing.len(), "private room full");
            return Err(AdmissionError::RoomFull(room.to_string()));
        }

        if self.unique_usernames && existing.has_username(&candidate.username) {
            return Err(AdmissionError::UsernameTaken {
                username: candidate.username,
                room: room.to_string(),
            });
        }

        if !registry.insert(room, candidate) {
            return Err(AdmissionError::AlreadyMember(room.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClientId;
    use proptest::prelude::*;
    use crate::member::outbox;

    fn member(name: &str) -> Member {
        let (tx, _rx) = outbox(1);
        Member::new(ClientId::new(), name, tx)
    }

    #[test]
    fn test_private_room_capacity() {
        let controller = AdmissionController::default();
        let mut registry = RoomRegistry::new();
        let room = RoomName::from("private_bob");

        controller.admit(&mut registry, &room, member("bob")).unwrap();
        controller.admit(&mut registry, &room, member("alice")).unwrap();

        let third = controller.admit(&mut registry, &room, member("carol"));
        assert_eq!(third, Err(AdmissionError::RoomFull("private_bob".to_string())));

        // Existing members untouched
        assert_eq!(registry.snapshot(&room), vec!["bob", "alice"]);
    }

    #[test]
    fn test_public_room_unbounded() {
        let controller = AdmissionController::default();
        let mut registry = RoomRegistry::new();
        let room = RoomName::from("lobby");

        for i in 0..10 {
            controller
                .admit(&mut registry, &room, member(&format!("user{i}")))
                .unwrap();
        }
        assert_eq!(registry.snapshot(&room).len(), 10);
    }

    #[test]
    fn test_private_room_reopens_after_leave() {
        let controller = AdmissionController::default();
        let mut registry = RoomRegistry::new();
        let room = RoomName::from("private_bob");

        let bob = member("bob");
        let bob_id = bob.id;
        controller.admit(&mut registry, &room, bob).unwrap();
        controller.admit(&mut registry, &room, member("alice")).unwrap();
        registry.remove(&room, bob_id);

        assert!(controller.admit(&mut registry, &room, member("carol")).is_ok());
    }

    #[test]
    fn test_empty_registration() {
        let controller = AdmissionController::default();
        let mut registry = RoomRegistry::new();

        assert_eq!(
            controller.admit(&mut registry, &RoomName::from("lobby"), member("")),
            Err(AdmissionError::EmptyUsername)
        );
        assert_eq!(
            controller.admit(&mut registry, &RoomName::from(""), member("alice")),
            Err(AdmissionError::EmptyRoomName)
        );
        assert_eq!(registry.room_count(), 0);
    }

    #[test]
    fn test_duplicate_username() {
        let controller = AdmissionController::default();
        let mut registry = RoomRegistry::new();
        let lobby = RoomName::from("lobby");

        controller.admit(&mut registry, &lobby, member("alice")).unwrap();
        assert!(matches!(
            controller.admit(&mut registry, &lobby, member("alice")),
            Err(AdmissionError::UsernameTaken { .. })
        ));

        // Same name elsewhere is fine
        controller
            .admit(&mut registry, &RoomName::from("games"), member("alice"))
            .unwrap();

        // And allowed when the rule is off
        let lenient = AdmissionController::new(false);
        lenient.admit(&mut registry, &lobby, member("alice")).unwrap();
        assert_eq!(registry.snapshot(&lobby), vec!["alice", "alice"]);
    }

    #[test]
    fn test_already_member() {
        let controller = AdmissionController::default();
        let mut registry = RoomRegistry::new();
        let lobby = RoomName::from("lobby");
        let alice = member("alice");
        let again = Member::new(alice.id, "alice2", alice.sender.clone());

        controller.admit(&mut registry, &lobby, alice).unwrap();
        assert_eq!(
            controller.admit(&mut registry, &lobby, again),
            Err(AdmissionError::AlreadyMember("lobby".to_string()))
        );
    }

    proptest! {
        /// Private rooms never exceed capacity under any join/leave sequence.
        #[test]
        fn prop_private_cap_holds(ops in prop::collection::vec((any::<bool>(), 0usize..5), 0..60)) {
            let controller = AdmissionController::default();
            let mut registry = RoomRegistry::new();
            let room = RoomName::from("private_x");
            let conns: Vec<Member> = (0..5).map(|i| member(&format!("user{i}"))).collect();

            for (join, idx) in ops {
                if join {
                    let before = registry.snapshot(&room).len();
                    let result = controller.admit(&mut registry, &room, conns[idx].clone());
                    if before >= PRIVATE_ROOM_CAPACITY {
                        prop_assert!(result.is_err());
                    }
                } else {
                    registry.remove(&room, conns[idx].id);
                }
                prop_assert!(registry.snapshot(&room).len() <= PRIVATE_ROOM_CAPACITY);
            }
        }
    }
}
