//! Line-oriented TCP Chat Relay Library
//!
//! A small chat relay built on tokio, using the Actor pattern for state
//! management.
//!
//! # Features
//! - Two-line registration (username, then room name)
//! - Named rooms created on first use
//! - Verbatim fan-out of chat lines to every room member
//! - Live roster plus join/leave announcements
//! - Two-person `private_` rooms
//! - Plain text or tagged JSON output
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor owning the `RoomRegistry`
//! - Each connection has a `handler` task communicating with the server
//! - Each member has an outbox drained by its own writer task
//! - No locks needed - all registry access goes through message passing
//!
//! # Example
//! ```ignore
//! use chat_relay::{Relay, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let relay = Relay::bind(ServerConfig::default()).await.unwrap();
//!     relay.run().await.unwrap();
//! }
//! ```

pub mod acceptor;
pub mod admission;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod handler;
pub mod line;
pub mod member;
pub mod message;
pub mod presence;
pub mod registry;
pub mod room;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use acceptor::Relay;
pub use admission::{AdmissionController, PRIVATE_ROOM_CAPACITY};
pub use broadcast::{broadcast, BroadcastReport};
pub use config::{ClientConfig, Cli, Command, ServerConfig};
pub use error::{AdmissionError, AppError, SendError};
pub use handler::{handle_connection, SessionState};
pub use member::{outbox, Member, Outbox, OutboxReceiver, OverflowSignal};
pub use message::{ErrorCode, ServerMessage, WireFormat};
pub use presence::{announce_event, announce_roster, PresenceEvent};
pub use registry::RoomRegistry;
pub use room::Room;
pub use server::{ChatServer, ServerCommand, ServerOptions};
pub use session::{ChatSession, Incoming};
pub use types::{ClientId, RoomName};
