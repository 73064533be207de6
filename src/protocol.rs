use crate::state::Player;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Commands decoded from clients. Unknown `type` tags fail deserialization
/// with an error naming the unrecognized variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    SetJudge {
        target_id: PlayerId,
    },
    SetChatEnabled {
        chat_enabled: bool,
    },
    StartRound {
        secret_word: String,
        #[serde(default)]
        duration: Option<u32>,
    },
    GuessCorrect,
    VoteInsider {
        suspect_id: PlayerId,
    },
    NextRound,
    Kick {
        target_id: PlayerId,
    },
    Chat {
        text: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Full room view. `self_id` is set only on the send-to-one path (join),
    /// so a client can tell which player it is.
    Room {
        #[serde(skip_serializing_if = "Option::is_none", default)]
        self_id: Option<PlayerId>,
        room: RoomSnapshot,
    },
    /// Chat relay, fanned out verbatim to every room member.
    Chat {
        from: ChatSender,
        text: String,
        ts: i64,
    },
    /// Reported to a single offending sender; never broadcast.
    Error { code: String, message: String },
}

/// Transport-safe view of a player: no connection handle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    pub role: Role,
}

impl From<&Player> for PlayerView {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            score: p.score,
            role: p.role,
        }
    }
}

/// Immutable copy of a room published to clients. Mutable collections are
/// deep-copied at construction time, so a later in-place room change can
/// never alter an already-published snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub code: RoomCode,
    pub state: RoomPhase,
    pub host_id: PlayerId,
    pub judge_id: PlayerId,
    pub insider_id: PlayerId,
    pub timer: u32,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub secret_word: String,
    pub round_end_by_timeout: bool,
    pub chat_enabled: bool,
    pub blocked_voters: HashSet<PlayerId>,
    pub voted: HashSet<PlayerId>,
    pub last_votes: Vec<VotePair>,
    pub players: HashMap<PlayerId, PlayerView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSender {
    pub id: PlayerId,
    pub name: String,
}
