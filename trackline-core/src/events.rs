//! WebSocket event vocabulary.

use serde::{Deserialize, Serialize};

use crate::types::{Coordinate, LocationUpdate, PackageId};

/// Events emitted by clients. Which ones are honoured depends on the
/// connection's role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    // Courier -> Server
    ReportPosition {
        package_id: PackageId,
        position: Coordinate,
    },

    // Observer -> Server
    Subscribe { package_id: PackageId },
    Unsubscribe { package_id: PackageId },

    // Heartbeat
    Ping { timestamp: i64 },
}

/// Events delivered to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    // Server -> topic members
    PositionBroadcast {
        package_id: PackageId,
        position: Coordinate,
    },

    // Server -> originating connection
    Error { message: String },

    // Heartbeat
    Pong { timestamp: i64 },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn broadcast(update: &LocationUpdate) -> Self {
        Self::PositionBroadcast {
            package_id: update.package_id.clone(),
            position: update.position,
        }
    }

    /// Wire name of the event, matching the `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PositionBroadcast { .. } => "position_broadcast",
            Self::Error { .. } => "error",
            Self::Pong { .. } => "pong",
        }
    }
}
