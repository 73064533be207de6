use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type PlayerId = String;
pub type RoomCode = String;

/// Room state machine phases. `AssignRoles` is transient: it is entered and
/// left again within the same `start_round` mutation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoomPhase {
    Lobby,
    AssignRoles,
    Countdown,
    Voting,
    Scoreboard,
}

/// Per-round player role. At most one judge and at most one insider exist in
/// a room at any time, and the insider is never the judge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(rename = "")]
    Unset,
    Normal,
    Judge,
    Insider,
}

/// Historical (voter, target) pair recorded when a tally completes, kept
/// around for post-round display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VotePair {
    pub voter_id: PlayerId,
    pub target_id: PlayerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    pub round_seconds: u32,
    pub vote_seconds: u32,
    pub max_chat_chars: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            round_seconds: 300,
            vote_seconds: 90,
            max_chat_chars: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_names() {
        assert_eq!(serde_json::to_string(&Role::Unset).unwrap(), "\"\"");
        assert_eq!(serde_json::to_string(&Role::Insider).unwrap(), "\"insider\"");
        assert_eq!(serde_json::from_str::<Role>("\"\"").unwrap(), Role::Unset);
        assert_eq!(serde_json::from_str::<Role>("\"judge\"").unwrap(), Role::Judge);
    }

    #[test]
    fn test_phase_wire_names() {
        assert_eq!(
            serde_json::to_string(&RoomPhase::AssignRoles).unwrap(),
            "\"assign_roles\""
        );
        assert_eq!(
            serde_json::from_str::<RoomPhase>("\"scoreboard\"").unwrap(),
            RoomPhase::Scoreboard
        );
    }
}
