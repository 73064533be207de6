mod registry;
mod room;
mod tally;
mod timer;

pub use room::{Player, Room, RoomInner};
pub use tally::{compute_outcome, TallyOutcome};

use crate::types::{RoomCode, RoomConfig};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Error taxonomy for command handling. None of these are fatal to a room or
/// the process; they are reported to the offending sender only, and the room
/// stays usable for everyone else.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Malformed or missing field in an otherwise decodable command.
    #[error("{0}")]
    Validation(String),
    /// Command is valid but disallowed in the current state or for this role.
    #[error("{0}")]
    Precondition(String),
    /// Referenced room or player does not exist.
    #[error("{0}")]
    NotFound(String),
    /// Room-create collision.
    #[error("{0}")]
    AlreadyExists(String),
}

impl RoomError {
    /// Stable machine-readable code included alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            RoomError::Validation(_) => "VALIDATION_ERROR",
            RoomError::Precondition(_) => "PRECONDITION_FAILED",
            RoomError::NotFound(_) => "NOT_FOUND",
            RoomError::AlreadyExists(_) => "ALREADY_EXISTS",
        }
    }
}

/// Shared application state: the process-wide room directory.
///
/// The directory lock is always released before any room lock is taken, so
/// no task ever holds both at once.
pub struct AppState {
    rooms: Mutex<HashMap<RoomCode, Arc<Room>>>,
    pub config: RoomConfig,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_config(RoomConfig::default())
    }

    pub fn with_config(config: RoomConfig) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            config,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
