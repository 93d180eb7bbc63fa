//! Command line configuration
//!
//! `chat_relay serve` runs the relay, `chat_relay connect` runs a terminal
//! client against it.

use std::net::SocketAddr;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::admission::AdmissionController;
use crate::message::WireFormat;
use crate::server::ServerOptions;
use crate::types::RoomName;

/// Default relay address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8888";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the chat relay
    Serve(ServerConfig),
    /// Connect to a relay and chat from the terminal
    Connect(ClientConfig),
}

/// Relay settings
#[derive(Args, Debug, Clone)]
pub struct ServerConfig {
    /// Socket address to bind. Use port 0 for an ephemeral port.
    #[arg(long, env = "CHAT_RELAY_LISTEN", default_value = DEFAULT_ADDR)]
    pub listen: SocketAddr,

    /// Encoding of server → client lines
    #[arg(long, value_enum, default_value_t = WireFormat::Text)]
    pub format: WireFormat,

    /// Don't relay chat lines back to their sender
    #[arg(long = "no-echo", action = ArgAction::SetFalse)]
    pub echo_to_sender: bool,

    /// Let several members of one room share a username
    #[arg(long)]
    pub allow_duplicate_usernames: bool,

    /// Undelivered messages a connection may have queued before it is
    /// disconnected as too slow
    #[arg(long, default_value_t = 8192)]
    pub max_pending: usize,

    /// Longest accepted line in bytes, terminator excluded
    #[arg(long, default_value_t = 4096)]
    pub max_line_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8888)),
            format: WireFormat::Text,
            echo_to_sender: true,
            allow_duplicate_usernames: false,
            max_pending: 8192,
            max_line_length: 4096,
        }
    }
}

impl ServerConfig {
    /// Actor options derived from this configuration
    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            echo_to_sender: self.echo_to_sender,
            admission: AdmissionController::new(!self.allow_duplicate_usernames),
        }
    }
}

/// Terminal client settings
#[derive(Args, Debug, Clone)]
pub struct ClientConfig {
    /// Name shown to other members
    #[arg(long)]
    pub username: String,

    /// Room to join
    #[arg(long, required_unless_present = "private", conflicts_with = "private")]
    pub room: Option<String>,

    /// Join your own two-person room (`private_<username>`)
    #[arg(long)]
    pub private: bool,

    /// Relay address
    #[arg(long, default_value = DEFAULT_ADDR)]
    pub server: SocketAddr,

    /// Encoding the relay was started with
    #[arg(long, value_enum, default_value_t = WireFormat::Text)]
    pub format: WireFormat,
}

impl ClientConfig {
    /// Room the client registers into
    pub fn room_name(&self) -> RoomName {
        match (&self.room, self.private) {
            (Some(room), false) => RoomName::new(room.clone()),
            _ => RoomName::private_for(&self.username),
        }
    }
}
