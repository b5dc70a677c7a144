use parking_lot::RwLock;
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    events::ServerEvent,
    types::{ConnectionId, ConnectionIdentity},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("connection closed")]
    Closed,
    #[error("outbound queue full")]
    Full,
}

/// Session object for one authenticated WebSocket. Created at handshake and
/// passed to every handler; the identity never changes afterwards.
pub struct Connection {
    id: ConnectionId,
    identity: ConnectionIdentity,
    /// Channel drained by the connection's writer task
    sender: mpsc::Sender<ServerEvent>,
    /// Last ping timestamp for connection health
    last_ping: RwLock<i64>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_id", &self.identity.user_id)
            .field("role", &self.identity.role)
            .field("channel_closed", &self.sender.is_closed())
            .field("last_ping", &*self.last_ping.read())
            .finish()
    }
}

impl Connection {
    pub fn new(
        identity: ConnectionIdentity,
        sender: mpsc::Sender<ServerEvent>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            identity,
            sender,
            last_ping: RwLock::new(chrono::Utc::now().timestamp()),
        }
    }

    /// Connection plus the receiving half of its outbound queue.
    pub fn channel(
        identity: ConnectionIdentity,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(identity, tx), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn identity(&self) -> &ConnectionIdentity {
        &self.identity
    }

    /// Enqueue without waiting. A full queue drops the event: clients only
    /// care about the latest position.
    pub fn deliver(&self, event: ServerEvent) -> Result<(), DeliveryError> {
        self.sender.try_send(event).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    pub fn update_ping(&self) {
        *self.last_ping.write() = chrono::Utc::now().timestamp();
    }

    /// Pinged within the last 60 seconds.
    pub fn is_healthy(&self) -> bool {
        let last_ping = *self.last_ping.read();
        chrono::Utc::now().timestamp() - last_ping < 60
    }
}
