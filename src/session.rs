//! Client session
//!
//! The client's side of the wire contract: register with two lines, send
//! chat lines prefixed with `username(HH:MM): `, read what the relay sends
//! back, and close gracefully.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::{Local, NaiveTime};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::error::AppError;
use crate::line::{write_line, LineReader};
use crate::message::{ServerMessage, WireFormat};
use crate::types::RoomName;

/// How long `disconnect` waits for the relay to close its side
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Longest line the client accepts from the relay
const MAX_INCOMING_LINE: usize = 64 * 1024;

/// A line received from the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// Decoded tagged message (json relays)
    Message(ServerMessage),
    /// Raw line (text relays)
    Line(String),
}

impl Incoming {
    /// Text to show the user
    pub fn render(&self) -> String {
        match self {
            Incoming::Message(msg) => msg.to_text_line(),
            Incoming::Line(line) => line.clone(),
        }
    }

    /// Join/leave/roster notice; only known for decoded messages
    pub fn is_presence(&self) -> bool {
        matches!(self, Incoming::Message(msg) if msg.is_presence())
    }
}

/// Build the line a client sends for a chat message
pub fn chat_line(username: &str, time: NaiveTime, text: &str) -> String {
    format!("{}({}): {}", username, time.format("%H:%M"), text)
}

fn has_line_break(s: &str) -> bool {
    s.contains(|c: char| c == '\n' || c == '\r')
}

/// Connected and registered client
pub struct ChatSession {
    username: String,
    room: RoomName,
    format: WireFormat,
    reader: LineReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl ChatSession {
    /// Connect and send the registration lines
    ///
    /// The relay doesn't acknowledge registration; a rejection shows up as
    /// the first incoming line followed by end of stream.
    pub async fn register(
        addr: SocketAddr,
        username: &str,
        room: &RoomName,
        format: WireFormat,
    ) -> Result<Self, AppError> {
        if has_line_break(username) || has_line_break(room.as_str()) {
            return Err(AppError::EmbeddedNewline);
        }

        let stream = TcpStream::connect(addr).await?;
        let (reader, mut writer) = stream.into_split();

        write_line(&mut writer, username).await?;
        write_line(&mut writer, room.as_str()).await?;
        info!("Registered as '{}' in room {} at {}", username, room, addr);

        Ok(Self {
            username: username.to_string(),
            room: room.clone(),
            format,
            reader: LineReader::new(reader, MAX_INCOMING_LINE),
            writer,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn room(&self) -> &RoomName {
        &self.room
    }

    /// Send a chat message stamped with the local time
    pub async fn send_chat(&mut self, text: &str) -> Result<(), AppError> {
        self.send_chat_at(text, Local::now().time()).await
    }

    /// Send a chat message stamped with the given time
    pub async fn send_chat_at(&mut self, text: &str, time: NaiveTime) -> Result<(), AppError> {
        if has_line_break(text) {
            return Err(AppError::EmbeddedNewline);
        }
        let line = chat_line(&self.username, time, text);
        write_line(&mut self.writer, &line).await?;
        Ok(())
    }

    /// Next line from the relay, or None once the relay closed the connection
    ///
    /// Cancel safe: a partially received line is kept for the next call.
    pub async fn next_event(&mut self) -> Result<Option<Incoming>, AppError> {
        let Some(line) = self.reader.next_line().await? else {
            return Ok(None);
        };

        let incoming = match self.format {
            WireFormat::Text => Incoming::Line(line),
            WireFormat::Json => Incoming::Message(ServerMessage::decode_json(&line)?),
        };
        Ok(Some(incoming))
    }

    /// Close the write side and wait for the relay to close its side
    ///
    /// Lines still in flight are drained and discarded.
    pub async fn disconnect(mut self) -> Result<(), AppError> {
        self.writer.shutdown().await?;

        let drain = async {
            while self.reader.next_line().await?.is_some() {}
            Ok::<(), AppError>(())
        };

        match tokio::time::timeout(DISCONNECT_TIMEOUT, drain).await {
            Ok(result) => result?,
            Err(_) => debug!("Relay did not close within {:?}", DISCONNECT_TIMEOUT),
        }

        info!("Disconnected from room {}", self.room);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[test]
    fn test_chat_line_prefix() {
        let time = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        assert_eq!(chat_line("alice", time, "hi"), "alice(10:00): hi");

        let time = NaiveTime::from_hms_opt(9, 5, 59).unwrap();
        assert_eq!(chat_line("bob", time, ""), "bob(09:05): ");
    }

    #[test]
    fn test_render() {
        let msg = Incoming::Message(ServerMessage::Left {
            username: "bob".to_string(),
        });
        assert_eq!(msg.render(), "bob left the room.");
        assert_eq!(Incoming::Line("raw".to_string()).render(), "raw");
    }

    #[test]
    fn test_presence_marker() {
        let joined = Incoming::Message(ServerMessage::Joined {
            username: "bob".to_string(),
        });
        let chat = Incoming::Message(ServerMessage::Chat {
            body: "bob(10:00): hi".to_string(),
        });
        assert!(joined.is_presence());
        assert!(!chat.is_presence());
        assert!(!Incoming::Line("bob joined the room.".to_string()).is_presence());
    }

    #[tokio::test]
    async fn test_cancelled_next_event_keeps_partial_line() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (resume_tx, resume_rx) = tokio::sync::oneshot::channel::<()>();

        let relay = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            // Registration lines
            let mut registration = [0u8; "alice\nlobby\n".len()];
            stream.read_exact(&mut registration).await.unwrap();

            stream.write_all(b"hello wor").await.unwrap();
            resume_rx.await.unwrap();
            stream.write_all(b"ld\n").await.unwrap();
            stream
        });

        let lobby = RoomName::from("lobby");
        let mut session = ChatSession::register(addr, "alice", &lobby, WireFormat::Text)
            .await
            .unwrap();

        // Like a terminal loop where stdin wins the race mid-line
        tokio::select! {
            _ = session.next_event() => panic!("line is not complete yet"),
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }
        resume_tx.send(()).unwrap();

        assert_eq!(
            session.next_event().await.unwrap(),
            Some(Incoming::Line("hello world".to_string()))
        );
        drop(relay.await.unwrap());
    }
}
