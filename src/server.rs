//! ChatServer Actor implementation
//!
//! The central actor that owns the room registry. Connection handlers talk to
//! it through an mpsc channel. Commands are handled one at a time and without
//! any `.await`, so admission, registry mutation and the announcements they
//! trigger are atomic with respect to every other connection.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::admission::AdmissionController;
use crate::broadcast::broadcast_except;
use crate::error::AdmissionError;
use crate::member::{Member, Outbox};
use crate::message::ServerMessage;
use crate::presence::{announce_event, announce_roster, PresenceEvent};
use crate::registry::RoomRegistry;
use crate::types::{ClientId, RoomName};

/// Commands sent from handlers to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// Register a connection in a room
    Join {
        client_id: ClientId,
        username: String,
        room: RoomName,
        sender: Outbox,
        reply: oneshot::Sender<Result<(), AdmissionError>>,
    },
    /// Relay a chat line to the sender's room
    Chat {
        client_id: ClientId,
        room: RoomName,
        body: String,
    },
    /// Connection is gone; remove it and announce
    Leave {
        client_id: ClientId,
        room: RoomName,
    },
}

/// Behaviour switches for the actor
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Relay chat lines back to their sender
    pub echo_to_sender: bool,
    /// Admission rules
    pub admission: AdmissionController,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            echo_to_sender: true,
            admission: AdmissionController::default(),
        }
    }
}

/// The main ChatServer actor
pub struct ChatServer {
    /// Room name -> members
    registry: RoomRegistry,
    options: ServerOptions,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>, options: ServerOptions) -> Self {
        Self {
            registry: RoomRegistry::new(),
            options,
            receiver,
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("ChatServer shutting down");
    }

    /// Read-only view of the registry
    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Process a single command
    pub fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Join {
                client_id,
                username,
                room,
                sender,
                reply,
            } => self.handle_join(client_id, username, room, sender, reply),
            ServerCommand::Chat {
                client_id,
                room,
                body,
            } => self.handle_chat(client_id, &room, body),
            ServerCommand::Leave { client_id, room } => self.handle_leave(client_id, &room),
        }
    }

    /// Handle a registration request
    fn handle_join(
        &mut self,
        client_id: ClientId,
        username: String,
        room: RoomName,
        sender: Outbox,
        reply: oneshot::Sender<Result<(), AdmissionError>>,
    ) {
        let candidate = Member::new(client_id, username.clone(), sender);

        if let Err(e) = self.options.admission.admit(&mut self.registry, &room, candidate) {
            info!(client = %client_id, room = %room, "admission rejected: {}", e);
            let _ = reply.send(Err(e));
            return;
        }

        if reply.send(Ok(())).is_err() {
            // Handler vanished while waiting; undo without announcing a join
            warn!(client = %client_id, room = %room, "handler gone before admission reply");
            self.registry.remove(&room, client_id);
            return;
        }

        info!("Client {} joined room {} as '{}'", client_id, room, username);

        // Roster first, then the join line
        announce_roster(&self.registry, &room);
        announce_event(&self.registry, &room, &username, PresenceEvent::Joined);

        debug!(
            "Total rooms: {}, Total members: {}",
            self.registry.room_count(),
            self.registry.member_count()
        );
    }

    /// Handle chat message
    fn handle_chat(&mut self, client_id: ClientId, room: &RoomName, body: String) {
        let Some(state) = self.registry.room(room) else {
            return;
        };

        if !state.contains(client_id) {
            debug!(client = %client_id, room = %room, "chat from non-member ignored");
            return;
        }

        let exclude = (!self.options.echo_to_sender).then_some(client_id);
        let report = broadcast_except(state, &ServerMessage::Chat { body }, exclude);
        debug!(
            room = %room,
            delivered = report.delivered,
            skipped = report.skipped,
            lagging = report.lagging,
            "chat relayed"
        );
    }

    /// Handle a connection leaving its room
    fn handle_leave(&mut self, client_id: ClientId, room: &RoomName) {
        let Some(member) = self.registry.remove(room, client_id) else {
            debug!(client = %client_id, room = %room, "leave for unknown member ignored");
            return;
        };

        info!("Client {} ('{}') left room {}", client_id, member.username, room);

        announce_roster(&self.registry, room);
        announce_event(&self.registry, room, &member.username, PresenceEvent::Left);
    }
}
