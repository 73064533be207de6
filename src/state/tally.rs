use super::room::RoomInner;
use crate::types::{PlayerId, RoomPhase, VotePair};
use std::collections::HashMap;

/// Points for each innocent player when the insider is unmasked, and for the
/// insider when an innocent player is accused instead. The asymmetry is
/// deliberate.
const UNMASK_POINTS: u32 = 1;
const ESCAPE_POINTS: u32 = 2;

/// Outcome of counting the live vote mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TallyOutcome {
    /// Nobody voted.
    NoVotes,
    /// More than one target tied for the most votes.
    Tie(Vec<PlayerId>),
    /// Exactly one target received the most votes.
    Accused(PlayerId),
}

/// Count votes per target and resolve the maximum. Pure: the timer-expiry
/// path and the all-votes-in path both go through here, so "timed out" and
/// "voted out" can never diverge.
pub fn compute_outcome(votes: &HashMap<PlayerId, PlayerId>) -> TallyOutcome {
    let mut counts: HashMap<&PlayerId, usize> = HashMap::new();
    for target in votes.values() {
        *counts.entry(target).or_insert(0) += 1;
    }
    if counts.is_empty() {
        return TallyOutcome::NoVotes;
    }

    let max = counts.values().copied().max().unwrap_or(0);
    let mut top: Vec<PlayerId> = counts
        .iter()
        .filter(|(_, c)| **c == max)
        .map(|(id, _)| (*id).clone())
        .collect();

    if top.len() > 1 {
        top.sort();
        TallyOutcome::Tie(top)
    } else {
        TallyOutcome::Accused(top.remove(0))
    }
}

/// Apply a completed tally to the room: record the vote history, award
/// points, and move to the scoreboard, or re-enter voting with the tied
/// suspects blocked. No timer is restarted on the tie path; the next tally
/// fires when every then-eligible voter has cast.
pub fn apply_tally(inner: &mut RoomInner) {
    if inner.players.is_empty() {
        return;
    }

    let mut history: Vec<VotePair> = inner
        .votes
        .iter()
        .map(|(voter, target)| VotePair {
            voter_id: voter.clone(),
            target_id: target.clone(),
        })
        .collect();
    history.sort_by(|a, b| a.voter_id.cmp(&b.voter_id));
    inner.last_votes = history;

    match compute_outcome(&inner.votes) {
        TallyOutcome::NoVotes => {
            inner.state = RoomPhase::Scoreboard;
            inner.clear_vote_state();
        }
        TallyOutcome::Tie(tied) => {
            // the tied suspects sit out the re-vote
            inner.state = RoomPhase::Voting;
            inner.votes.clear();
            inner.voted.clear();
            inner.blocked_voters = tied.into_iter().collect();
        }
        TallyOutcome::Accused(accused) => {
            if accused == inner.insider_id {
                let insider_id = inner.insider_id.clone();
                let judge_id = inner.judge_id.clone();
                for p in inner.players.values_mut() {
                    if p.id != insider_id && p.id != judge_id {
                        p.score += UNMASK_POINTS;
                    }
                }
            } else {
                // the insider survived the accusation, if still present
                let insider_id = inner.insider_id.clone();
                if let Some(insider) = inner.players.get_mut(&insider_id) {
                    insider.score += ESCAPE_POINTS;
                }
            }
            inner.state = RoomPhase::Scoreboard;
            inner.clear_vote_state();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Room;
    use crate::types::{Role, RoomConfig};
    use std::sync::Arc;

    async fn voting_room(names: &[&str]) -> (Arc<Room>, Vec<PlayerId>) {
        let room = Arc::new(Room::new("TEST".to_string(), RoomConfig::default()));
        let mut ids = Vec::new();
        for name in names {
            ids.push(room.join(name.to_string(), None).await);
        }
        room.lock().await.state = RoomPhase::Voting;
        (room, ids)
    }

    #[test]
    fn test_outcome_no_votes() {
        assert_eq!(compute_outcome(&HashMap::new()), TallyOutcome::NoVotes);
    }

    #[test]
    fn test_outcome_clear_majority() {
        let votes = HashMap::from([
            ("a".to_string(), "x".to_string()),
            ("b".to_string(), "x".to_string()),
            ("c".to_string(), "y".to_string()),
        ]);
        assert_eq!(
            compute_outcome(&votes),
            TallyOutcome::Accused("x".to_string())
        );
    }

    #[test]
    fn test_outcome_tie() {
        let votes = HashMap::from([
            ("a".to_string(), "x".to_string()),
            ("b".to_string(), "y".to_string()),
        ]);
        assert_eq!(
            compute_outcome(&votes),
            TallyOutcome::Tie(vec!["x".to_string(), "y".to_string()])
        );
    }

    #[tokio::test]
    async fn test_apply_correct_accusation_scores_the_group() {
        let (room, ids) = voting_room(&["judy", "ada", "bob", "cyn"]).await;
        let mut inner = room.lock().await;
        inner.judge_id = ids[0].clone();
        inner.insider_id = ids[3].clone();

        inner.votes.insert(ids[1].clone(), ids[3].clone());
        inner.votes.insert(ids[2].clone(), ids[3].clone());
        inner.votes.insert(ids[3].clone(), ids[1].clone());
        apply_tally(&mut inner);

        assert_eq!(inner.state, RoomPhase::Scoreboard);
        assert_eq!(inner.players[&ids[0]].score, 0); // judge
        assert_eq!(inner.players[&ids[1]].score, 1);
        assert_eq!(inner.players[&ids[2]].score, 1);
        assert_eq!(inner.players[&ids[3]].score, 0); // insider
        assert!(inner.votes.is_empty());
        assert!(inner.blocked_voters.is_empty());
        assert_eq!(inner.last_votes.len(), 3);
    }

    #[tokio::test]
    async fn test_apply_wrong_accusation_rewards_the_insider() {
        let (room, ids) = voting_room(&["judy", "ada", "bob", "cyn"]).await;
        let mut inner = room.lock().await;
        inner.judge_id = ids[0].clone();
        inner.insider_id = ids[3].clone();

        inner.votes.insert(ids[1].clone(), ids[2].clone());
        inner.votes.insert(ids[2].clone(), ids[1].clone());
        inner.votes.insert(ids[3].clone(), ids[2].clone());
        apply_tally(&mut inner);

        assert_eq!(inner.state, RoomPhase::Scoreboard);
        assert_eq!(inner.players[&ids[3]].score, 2);
        assert!(inner
            .players
            .values()
            .filter(|p| p.id != ids[3])
            .all(|p| p.score == 0));
    }

    #[tokio::test]
    async fn test_apply_tie_blocks_the_suspects() {
        let (room, ids) = voting_room(&["judy", "ada", "bob", "cyn"]).await;
        let mut inner = room.lock().await;
        inner.judge_id = ids[0].clone();
        inner.insider_id = ids[3].clone();

        inner.votes.insert(ids[1].clone(), ids[2].clone());
        inner.votes.insert(ids[2].clone(), ids[1].clone());
        apply_tally(&mut inner);

        assert_eq!(inner.state, RoomPhase::Voting);
        assert!(inner.votes.is_empty());
        assert!(inner.voted.is_empty());
        assert_eq!(inner.blocked_voters.len(), 2);
        assert!(inner.blocked_voters.contains(&ids[1]));
        assert!(inner.blocked_voters.contains(&ids[2]));
        // no points handed out on a tie
        assert!(inner.players.values().all(|p| p.score == 0));
        // history still records the tied sub-round
        assert_eq!(inner.last_votes.len(), 2);
    }

    #[tokio::test]
    async fn test_apply_no_votes_ends_round_quietly() {
        let (room, ids) = voting_room(&["judy", "ada", "bob", "cyn"]).await;
        let mut inner = room.lock().await;
        inner.judge_id = ids[0].clone();
        inner.insider_id = ids[3].clone();

        apply_tally(&mut inner);

        assert_eq!(inner.state, RoomPhase::Scoreboard);
        assert!(inner.players.values().all(|p| p.score == 0));
        assert!(inner.last_votes.is_empty());
    }

    #[tokio::test]
    async fn test_apply_without_insider_changes_no_scores() {
        // degenerate round with no insider assigned
        let (room, ids) = voting_room(&["judy", "ada", "bob"]).await;
        let mut inner = room.lock().await;
        inner.judge_id = ids[0].clone();

        inner.votes.insert(ids[1].clone(), ids[2].clone());
        apply_tally(&mut inner);

        assert_eq!(inner.state, RoomPhase::Scoreboard);
        assert!(inner.players.values().all(|p| p.score == 0));
    }

    #[tokio::test]
    async fn test_repeat_tally_without_votes_awards_nothing() {
        let (room, ids) = voting_room(&["judy", "ada", "bob", "cyn"]).await;
        let mut inner = room.lock().await;
        inner.judge_id = ids[0].clone();
        inner.insider_id = ids[3].clone();
        for p in inner.players.values_mut() {
            p.role = Role::Normal;
        }

        inner.votes.insert(ids[1].clone(), ids[3].clone());
        inner.votes.insert(ids[2].clone(), ids[3].clone());
        apply_tally(&mut inner);

        // a second tally with no votes must not award anything further
        apply_tally(&mut inner);
        assert_eq!(inner.players[&ids[1]].score, 1);
        assert_eq!(inner.players[&ids[2]].score, 1);
    }
}
