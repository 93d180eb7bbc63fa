//! Member struct definition
//!
//! A registered (username, connection) pair. The connection is represented by
//! the sending half of the connection's outbox; the writer task on the other
//! end owns the socket.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::ClientId;

/// Create an outbox holding at most `max_pending` undelivered messages
///
/// Pushing never waits. A push that would go over the limit is refused and
/// raises the overflow signal, which the connection's handler treats as a
/// reason to disconnect.
pub fn outbox(max_pending: usize) -> (Outbox, OutboxReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pending = Arc::new(AtomicUsize::new(0));
    let overflow = Arc::new(Notify::new());

    let sender = Outbox {
        tx,
        pending: Arc::clone(&pending),
        overflow: Arc::clone(&overflow),
        max_pending,
    };
    let receiver = OutboxReceiver {
        rx,
        pending,
        overflow,
    };
    (sender, receiver)
}

/// Server → connection message queue (sending half)
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<ServerMessage>,
    /// Messages pushed but not yet taken by the writer
    pending: Arc<AtomicUsize>,
    overflow: Arc<Notify>,
    max_pending: usize,
}

impl Outbox {
    /// Queue a message without waiting
    pub fn push(&self, msg: ServerMessage) -> Result<(), SendError> {
        if self.pending.fetch_add(1, Ordering::AcqRel) >= self.max_pending {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            self.overflow.notify_one();
            return Err(SendError::Lagging);
        }

        self.tx.send(msg).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            SendError::ChannelClosed
        })
    }
}

/// Receiving half of an outbox, drained by the writer task
#[derive(Debug)]
pub struct OutboxReceiver {
    rx: mpsc::UnboundedReceiver<ServerMessage>,
    pending: Arc<AtomicUsize>,
    overflow: Arc<Notify>,
}

impl OutboxReceiver {
    /// Next queued message, or None once every `Outbox` is dropped
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        let msg = self.rx.recv().await?;
        self.pending.fetch_sub(1, Ordering::AcqRel);
        Some(msg)
    }

    /// Next queued message if one is ready
    pub fn try_recv(&mut self) -> Option<ServerMessage> {
        let msg = self.rx.try_recv().ok()?;
        self.pending.fetch_sub(1, Ordering::AcqRel);
        Some(msg)
    }

    /// Signal raised when a push is refused for being over the limit
    pub fn overflow_signal(&self) -> OverflowSignal {
        OverflowSignal(Arc::clone(&self.overflow))
    }
}

/// Resolves once the outbox has overflowed
#[derive(Debug)]
pub struct OverflowSignal(Arc<Notify>);

impl OverflowSignal {
    pub async fn wait(&self) {
        self.0.notified().await;
    }
}

/// Room member
#[derive(Debug, Clone)]
pub struct Member {
    /// Connection this member is bound to
    pub id: ClientId,
    /// Username as sent during registration
    pub username: String,
    /// Position in the global admission sequence, assigned by the registry
    pub join_order: u64,
    /// Server → connection outbox
    pub sender: Outbox,
}

impl Member {
    /// Create a candidate member; the join order is set on insertion
    pub fn new(id: ClientId, username: impl Into<String>, sender: Outbox) -> Self {
        Self {
            id,
            username: username.into(),
            join_order: 0,
            sender,
        }
    }

    /// Queue a message for this member without waiting
    ///
    /// Fails if the writer task has stopped or the member is too far behind.
    pub fn deliver(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender.push(msg)
    }
}
