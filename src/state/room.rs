use super::tally;
use super::timer::TimerKind;
use super::RoomError;
use crate::broadcast;
use crate::types::*;
use axum::extract::ws::Message;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex, MutexGuard};

/// A connected player. The transport handle is a non-owning sender into the
/// session's outbound queue; the session task owns the socket itself and the
/// handle is never part of any snapshot.
#[derive(Debug)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    pub role: Role,
    pub tx: Option<mpsc::UnboundedSender<Message>>,
}

/// Mutable room state. Every field in here is only touched while holding the
/// room lock, and every broadcast reads it under the same lock.
#[derive(Debug)]
pub struct RoomInner {
    pub state: RoomPhase,
    pub host_id: PlayerId,
    pub judge_id: PlayerId,
    pub insider_id: PlayerId,
    pub timer: u32,
    pub secret_word: String,
    pub round_end_by_timeout: bool,
    pub chat_enabled: bool,
    pub blocked_voters: HashSet<PlayerId>,
    pub voted: HashSet<PlayerId>,
    pub last_votes: Vec<VotePair>,
    /// Live vote mapping: voter id -> target id. Cleared at the start and
    /// end of every vote phase.
    pub votes: HashMap<PlayerId, PlayerId>,
    pub players: HashMap<PlayerId, Player>,
    pub(super) timer_running: bool,
    /// Generation of the currently armed timer. A tick whose captured
    /// generation no longer matches is stale and must not mutate anything.
    pub(super) timer_generation: u64,
    pub(super) timer_cancel: Option<watch::Sender<()>>,
}

impl RoomInner {
    fn new() -> Self {
        Self {
            state: RoomPhase::Lobby,
            host_id: String::new(),
            judge_id: String::new(),
            insider_id: String::new(),
            timer: 0,
            secret_word: String::new(),
            round_end_by_timeout: false,
            chat_enabled: true,
            blocked_voters: HashSet::new(),
            voted: HashSet::new(),
            last_votes: Vec::new(),
            votes: HashMap::new(),
            players: HashMap::new(),
            timer_running: false,
            timer_generation: 0,
            timer_cancel: None,
        }
    }

    /// Players allowed to cast a vote right now: everyone but the judge and
    /// the currently blocked suspects. Recomputed fresh on every vote, since
    /// the blocked set changes across tie sub-rounds.
    pub fn eligible_voter_count(&self) -> usize {
        self.players
            .keys()
            .filter(|id| **id != self.judge_id && !self.blocked_voters.contains(*id))
            .count()
    }

    pub(super) fn clear_vote_state(&mut self) {
        self.votes.clear();
        self.voted.clear();
        self.blocked_voters.clear();
    }

    /// Mark the current timer, if any, as inert and fire its cancellation
    /// token. Cancelling when no timer is armed is a no-op.
    pub(super) fn cancel_timer(&mut self) {
        self.timer_running = false;
        if let Some(token) = self.timer_cancel.take() {
            drop(token);
        }
    }

    /// Transient `assign_roles` step: reset everyone to normal, mark the
    /// judge, then pick one non-judge player uniformly at random as insider.
    /// An empty candidate list (defensive; the start preconditions forbid it)
    /// leaves the round without an insider.
    fn assign_roles(&mut self) {
        self.state = RoomPhase::AssignRoles;
        self.insider_id.clear();
        for p in self.players.values_mut() {
            p.role = Role::Normal;
        }
        if let Some(judge) = self.players.get_mut(&self.judge_id) {
            judge.role = Role::Judge;
        }

        let candidates: Vec<PlayerId> = self
            .players
            .keys()
            .filter(|id| **id != self.judge_id)
            .cloned()
            .collect();
        if candidates.is_empty() {
            return;
        }

        let pick = candidates[rand::rng().random_range(0..candidates.len())].clone();
        if let Some(insider) = self.players.get_mut(&pick) {
            insider.role = Role::Insider;
        }
        self.insider_id = pick;
    }
}

/// One game session: the authoritative state container and the unit of
/// locking. All mutation goes through `inner`; the atomic player count is a
/// lock-free mirror maintained under the lock, read by the registry.
#[derive(Debug)]
pub struct Room {
    pub code: RoomCode,
    pub config: RoomConfig,
    pub(super) inner: Mutex<RoomInner>,
    player_count: AtomicUsize,
}

impl Room {
    pub fn new(code: RoomCode, config: RoomConfig) -> Self {
        Self {
            code,
            config,
            inner: Mutex::new(RoomInner::new()),
            player_count: AtomicUsize::new(0),
        }
    }

    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::SeqCst)
    }

    pub async fn lock(&self) -> MutexGuard<'_, RoomInner> {
        self.inner.lock().await
    }

    /// Add a player with a freshly generated id; the first joiner becomes
    /// host. The newcomer receives a snapshot tagged with their own id, then
    /// the whole room (newcomer included) gets the broadcast.
    pub async fn join(
        &self,
        name: String,
        tx: Option<mpsc::UnboundedSender<Message>>,
    ) -> PlayerId {
        let id = ulid::Ulid::new().to_string();
        let mut inner = self.lock().await;

        if inner.host_id.is_empty() {
            inner.host_id = id.clone();
        }
        inner.players.insert(
            id.clone(),
            Player {
                id: id.clone(),
                name,
                score: 0,
                role: Role::Unset,
                tx,
            },
        );
        self.player_count.store(inner.players.len(), Ordering::SeqCst);

        broadcast::send_room_to_player(&self.code, &inner, &id);
        broadcast::broadcast_room(&self.code, &inner);
        id
    }

    /// Remove a departed player and repair the host and judge seats. The
    /// departed player is also scrubbed from the live vote state so vote
    /// eligibility stays consistent.
    pub async fn leave(&self, player_id: &str) {
        let mut inner = self.lock().await;

        inner.players.remove(player_id);
        inner.votes.remove(player_id);
        inner.voted.remove(player_id);
        inner.blocked_voters.remove(player_id);

        if inner.host_id == player_id {
            inner.host_id = inner.players.keys().next().cloned().unwrap_or_default();
        }
        if inner.judge_id == player_id {
            inner.judge_id.clear();
        }
        self.player_count.store(inner.players.len(), Ordering::SeqCst);

        broadcast::broadcast_room(&self.code, &inner);
    }

    /// Seat a room member as judge for the coming round.
    pub async fn set_judge(&self, target_id: &str) -> Result<(), RoomError> {
        let mut inner = self.lock().await;
        if !inner.players.contains_key(target_id) {
            return Err(RoomError::NotFound(
                "that player is not in this room".to_string(),
            ));
        }
        inner.judge_id = target_id.to_string();
        broadcast::broadcast_room(&self.code, &inner);
        Ok(())
    }

    /// Host-only chat toggle.
    pub async fn set_chat_enabled(
        &self,
        sender_id: &str,
        enabled: bool,
    ) -> Result<(), RoomError> {
        let mut inner = self.lock().await;
        if inner.host_id != sender_id {
            return Err(RoomError::Precondition(
                "only the host can change chat settings".to_string(),
            ));
        }
        inner.chat_enabled = enabled;
        broadcast::broadcast_room(&self.code, &inner);
        Ok(())
    }

    /// Begin a round: validate the entry conditions, assign roles and kick
    /// off the countdown. Starting mid-round is allowed and restarts the
    /// round, superseding any active timer.
    pub async fn start_round(
        self: Arc<Self>,
        secret_word: String,
        duration: Option<u32>,
    ) -> Result<(), RoomError> {
        let duration = match duration {
            Some(d) if d > 0 => d,
            _ => self.config.round_seconds,
        };
        let secret_word = secret_word.trim().to_string();

        {
            let mut inner = self.lock().await;
            if secret_word.is_empty() {
                return Err(RoomError::Validation(
                    "the judge must set a secret word before starting the round".to_string(),
                ));
            }
            if inner.judge_id.is_empty() {
                return Err(RoomError::Precondition(
                    "a judge must be selected before starting the round".to_string(),
                ));
            }
            let non_judge = inner
                .players
                .keys()
                .filter(|id| **id != inner.judge_id)
                .count();
            if non_judge < 3 {
                return Err(RoomError::Precondition(
                    "at least 3 players besides the judge are required to start".to_string(),
                ));
            }

            inner.secret_word = secret_word;
            inner.assign_roles();
            tracing::info!(
                room = %self.code,
                judge = %inner.judge_id,
                duration,
                "round started"
            );
        }

        self.start_timer(TimerKind::Countdown, duration).await;
        Ok(())
    }

    /// The judge declares the word guessed: the countdown stops and the vote
    /// window opens.
    pub async fn guess_correct(self: Arc<Self>, sender_id: &str) -> Result<(), RoomError> {
        let vote_seconds = self.config.vote_seconds;
        {
            let mut inner = self.lock().await;
            if inner.judge_id != sender_id {
                return Err(RoomError::Precondition(
                    "only the judge can declare a correct guess".to_string(),
                ));
            }
            if inner.state != RoomPhase::Countdown {
                return Err(RoomError::Precondition(
                    "no round countdown is running".to_string(),
                ));
            }
            inner.cancel_timer();
            inner.round_end_by_timeout = false;
            inner.clear_vote_state();
            inner.last_votes.clear();
        }

        self.start_timer(TimerKind::Vote, vote_seconds).await;
        Ok(())
    }

    /// Record a vote against a suspect. When the last eligible voter has
    /// cast, the tally runs synchronously instead of waiting for the timer.
    pub async fn vote_insider(&self, sender_id: &str, suspect_id: &str) -> Result<(), RoomError> {
        let mut inner = self.lock().await;

        if suspect_id.is_empty() {
            return Err(RoomError::Validation("suspectId is required".to_string()));
        }
        if inner.state != RoomPhase::Voting {
            return Err(RoomError::Precondition(
                "voting is not open yet".to_string(),
            ));
        }
        if !inner.players.contains_key(sender_id) {
            return Err(RoomError::NotFound(
                "you are not in this room".to_string(),
            ));
        }
        if inner.judge_id == sender_id {
            return Err(RoomError::Precondition(
                "the judge cannot vote".to_string(),
            ));
        }
        if inner.blocked_voters.contains(sender_id) {
            return Err(RoomError::Precondition(
                "you are among the suspects and cannot vote this round".to_string(),
            ));
        }
        if suspect_id == sender_id {
            return Err(RoomError::Precondition(
                "you cannot vote for yourself".to_string(),
            ));
        }
        if !inner.players.contains_key(suspect_id) {
            return Err(RoomError::NotFound(
                "that player is not in this room".to_string(),
            ));
        }

        inner.votes.insert(sender_id.to_string(), suspect_id.to_string());
        inner.voted.insert(sender_id.to_string());

        let eligible = inner.eligible_voter_count();
        if eligible > 0 && inner.votes.len() >= eligible {
            inner.cancel_timer();
            tally::apply_tally(&mut inner);
            tracing::info!(room = %self.code, state = ?inner.state, "all eligible votes in, tally applied");
        }

        broadcast::broadcast_room(&self.code, &inner);
        Ok(())
    }

    /// Reset to the lobby for another round. Scores and the judge seat are
    /// kept; roles, insider, timer and vote state are cleared.
    pub async fn next_round(&self) {
        let mut inner = self.lock().await;

        for p in inner.players.values_mut() {
            p.role = Role::Unset;
        }
        inner.insider_id.clear();
        inner.timer = 0;
        inner.cancel_timer();
        inner.state = RoomPhase::Lobby;
        inner.round_end_by_timeout = false;
        inner.clear_vote_state();
        inner.last_votes.clear();

        broadcast::broadcast_room(&self.code, &inner);
    }

    /// Host removes a player: the target is told why, their connection is
    /// closed, and a judge seat they held is vacated.
    pub async fn kick(&self, sender_id: &str, target_id: &str) -> Result<(), RoomError> {
        let mut inner = self.lock().await;

        if inner.host_id != sender_id {
            return Err(RoomError::Precondition(
                "only the host can kick players".to_string(),
            ));
        }
        if target_id.is_empty() {
            return Err(RoomError::Validation("targetId is required".to_string()));
        }
        if target_id == inner.host_id {
            return Err(RoomError::Precondition(
                "the host cannot kick themselves".to_string(),
            ));
        }
        let Some(target) = inner.players.remove(target_id) else {
            return Err(RoomError::NotFound(
                "that player already left the room".to_string(),
            ));
        };

        if inner.judge_id == target_id {
            inner.judge_id.clear();
        }
        inner.votes.remove(target_id);
        inner.voted.remove(target_id);
        inner.blocked_voters.remove(target_id);
        self.player_count.store(inner.players.len(), Ordering::SeqCst);

        tracing::info!(room = %self.code, target = %target_id, "player kicked");
        if let Some(tx) = target.tx {
            broadcast::send_error(&tx, "KICKED", "you were removed from the room by the host");
            let _ = tx.send(Message::Close(None));
        }

        broadcast::broadcast_room(&self.code, &inner);
        Ok(())
    }

    /// Relay a chat line to every member. Stateless apart from the enabled
    /// flag; empty lines are dropped, long ones truncated.
    pub async fn chat(&self, sender_id: &str, text: &str) -> Result<(), RoomError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        let text: String = text.chars().take(self.config.max_chat_chars).collect();

        let inner = self.lock().await;
        let Some(sender) = inner.players.get(sender_id) else {
            return Ok(());
        };
        if !inner.chat_enabled {
            return Err(RoomError::Precondition(
                "chat is currently disabled by the host".to_string(),
            ));
        }
        broadcast::broadcast_chat(&inner, sender, &text);
        Ok(())
    }
}
