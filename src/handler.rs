//! TCP connection handler
//!
//! Drives one connection through registration and the relay loop:
//!
//! ```text
//! New -> AwaitingUsername -> AwaitingRoom -> Admitted -> Active -> Closed
//!                                        \-> Rejected
//! ```
//!
//! Reads happen here; writes go through a per-connection writer task fed by
//! the member's outbox, so broadcasts never wait on this socket. A member
//! whose outbox overflows is disconnected through the same cleanup path as
//! one that hung up.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::line::{write_line, LineReader};
use crate::member::{outbox, OutboxReceiver};
use crate::message::{ServerMessage, WireFormat};
use crate::server::ServerCommand;
use crate::types::{ClientId, RoomName};

/// How long a closing connection may spend flushing queued messages
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Registration and relay state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    New,
    AwaitingUsername,
    AwaitingRoom,
    Admitted,
    Active,
    Rejected,
    Closed,
}

impl SessionState {
    /// Whether no further transition can happen
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Rejected | SessionState::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::New => "new",
            SessionState::AwaitingUsername => "awaiting_username",
            SessionState::AwaitingRoom => "awaiting_room",
            SessionState::Admitted => "admitted",
            SessionState::Active => "active",
            SessionState::Rejected => "rejected",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Per-connection bookkeeping for logging state transitions
struct Session {
    id: ClientId,
    peer: String,
    state: SessionState,
}

impl Session {
    fn new(peer: String) -> Self {
        Self {
            id: ClientId::new(),
            peer,
            state: SessionState::New,
        }
    }

    fn advance(&mut self, next: SessionState) {
        debug_assert!(!self.state.is_terminal(), "transition out of {}", self.state);
        debug!(client = %self.id, peer = %self.peer, "{} -> {}", self.state, next);
        self.state = next;
    }
}

/// Registered membership of a connection
///
/// Releasing sends exactly one `Leave` to the actor. If the guard is dropped
/// without an explicit release (early return, panic), the `Leave` is sent
/// from `Drop` instead.
struct Membership {
    cmd_tx: mpsc::Sender<ServerCommand>,
    client_id: ClientId,
    room: RoomName,
    released: bool,
}

impl Membership {
    fn new(cmd_tx: mpsc::Sender<ServerCommand>, client_id: ClientId, room: RoomName) -> Self {
        Self {
            cmd_tx,
            client_id,
            room,
            released: false,
        }
    }

    fn leave_command(&self) -> ServerCommand {
        ServerCommand::Leave {
            client_id: self.client_id,
            room: self.room.clone(),
        }
    }

    async fn release(mut self) {
        self.released = true;
        if self.cmd_tx.send(self.leave_command()).await.is_err() {
            debug!(client = %self.client_id, "server closed before leave");
        }
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.cmd_tx.try_send(self.leave_command()) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(cmd)) => {
                let cmd_tx = self.cmd_tx.clone();
                if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                    runtime.spawn(async move {
                        let _ = cmd_tx.send(cmd).await;
                    });
                }
            }
        }
    }
}

/// Handle a new TCP connection
///
/// Performs the two-line registration, relays chat lines until the peer goes
/// away, then leaves the room. Errors end only this connection.
pub async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<ServerCommand>,
    config: Arc<ServerConfig>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a: SocketAddr| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let mut session = Session::new(peer_addr);
    let client_id = session.id;
    debug!("New TCP connection from {} as {}", session.peer, client_id);

    let (reader, mut writer) = stream.into_split();
    let mut lines = LineReader::new(reader, config.max_line_length);

    session.advance(SessionState::AwaitingUsername);
    let Some(username) = lines.next_line().await? else {
        session.advance(SessionState::Closed);
        return Ok(());
    };
    let username = username.trim().to_string();

    session.advance(SessionState::AwaitingRoom);
    let Some(room) = lines.next_line().await? else {
        session.advance(SessionState::Closed);
        return Ok(());
    };
    let room = RoomName::new(room.trim());

    // Outbox for this connection; the actor holds the only sender
    let (msg_tx, msg_rx) = outbox(config.max_pending);
    let overflow = msg_rx.overflow_signal();
    let (reply_tx, reply_rx) = oneshot::channel();

    if cmd_tx
        .send(ServerCommand::Join {
            client_id,
            username: username.clone(),
            room: room.clone(),
            sender: msg_tx,
            reply: reply_tx,
        })
        .await
        .is_err()
    {
        error!("Failed to register client {} - server closed", client_id);
        return Err(AppError::ChannelSend);
    }

    match reply_rx.await {
        Ok(Ok(())) => {}
        Ok(Err(rejection)) => {
            session.advance(SessionState::Rejected);
            info!("Client {} rejected from room {}: {}", client_id, room, rejection);
            let line = ServerMessage::from(&rejection).encode(config.format)?;
            write_line(&mut writer, &line).await?;
            writer.shutdown().await?;
            return Ok(());
        }
        Err(_) => return Err(AppError::ChannelSend),
    }

    let membership = Membership::new(cmd_tx.clone(), client_id, room.clone());
    session.advance(SessionState::Admitted);
    info!("Client {} ('{}') admitted to room {}", client_id, username, room);

    let mut write_task = tokio::spawn(write_loop(writer, msg_rx, config.format));
    session.advance(SessionState::Active);

    let mut writer_done = false;
    tokio::select! {
        result = relay_lines(&mut lines, &cmd_tx, client_id, &room) => {
            match result {
                Ok(()) => debug!("Client {} closed its side", client_id),
                Err(e) => debug!("Read error for {}: {}", client_id, e),
            }
        }
        _ = &mut write_task => {
            writer_done = true;
            debug!("Write side for {} closed", client_id);
        }
        _ = overflow.wait() => {
            warn!(
                "Client {} has more than {} undelivered messages, disconnecting",
                client_id, config.max_pending
            );
        }
    }

    membership.release().await;
    session.advance(SessionState::Closed);

    // The actor drops the outbox sender on leave, which lets the writer
    // flush what is queued and shut the socket down.
    if !writer_done && tokio::time::timeout(CLOSE_GRACE, &mut write_task).await.is_err() {
        warn!("Writer for {} did not finish in time, aborting", client_id);
        write_task.abort();
    }

    info!("Client {} disconnected", client_id);
    Ok(())
}

/// Forward every non-empty line to the room until EOF
async fn relay_lines<R>(
    lines: &mut LineReader<R>,
    cmd_tx: &mpsc::Sender<ServerCommand>,
    client_id: ClientId,
    room: &RoomName,
) -> Result<(), AppError>
where
    R: AsyncRead + Unpin,
{
    while let Some(line) = lines.next_line().await? {
        if line.is_empty() {
            continue;
        }
        debug!(client = %client_id, room = %room, "chat line received");
        cmd_tx
            .send(ServerCommand::Chat {
                client_id,
                room: room.clone(),
                body: line,
            })
            .await
            .map_err(|_| AppError::ChannelSend)?;
    }
    Ok(())
}

/// Drain the outbox onto the socket, then close the write side
async fn write_loop<W>(mut writer: W, mut outbox: OutboxReceiver, format: WireFormat)
where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = outbox.recv().await {
        let line = match msg.encode(format) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize message: {}", e);
                continue;
            }
        };
        if let Err(e) = write_line(&mut writer, &line).await {
            debug!("Socket write failed, ending write task: {}", e);
            return;
        }
    }

    let _ = writer.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_loop_flushes_and_closes() {
        let (tx, rx) = outbox(4);
        let mut out = Vec::new();

        tx.push(ServerMessage::Joined {
            username: "alice".to_string(),
        })
        .unwrap();
        tx.push(ServerMessage::Chat {
            body: "hi".to_string(),
        })
        .unwrap();
        drop(tx);

        write_loop(&mut out, rx, WireFormat::Text).await;
        assert_eq!(String::from_utf8(out).unwrap(), "alice joined the room.\nhi\n");
    }

    #[tokio::test]
    async fn test_membership_release_sends_one_leave() {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(4);
        let membership = Membership::new(cmd_tx, ClientId::new(), RoomName::from("lobby"));

        membership.release().await;

        assert!(matches!(cmd_rx.recv().await, Some(ServerCommand::Leave { .. })));
        // Sender dropped with the guard, no second leave
        assert!(cmd_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_membership_drop_sends_leave() {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(4);
        drop(Membership::new(cmd_tx, ClientId::new(), RoomName::from("lobby")));

        assert!(matches!(cmd_rx.recv().await, Some(ServerCommand::Leave { .. })));
        assert!(cmd_rx.recv().await.is_none());
    }

    #[test]
    fn test_terminal_states() {
        assert!(SessionState::Rejected.is_terminal());
        assert!(SessionState::Closed.is_terminal());
        assert!(!SessionState::Active.is_terminal());
        assert_eq!(SessionState::AwaitingRoom.to_string(), "awaiting_room");
    }
}
