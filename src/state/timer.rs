use super::room::Room;
use super::tally;
use crate::broadcast;
use crate::types::RoomPhase;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant};

/// Which phase the active timer is bounding. The terminal tick differs: a
/// countdown expiry ends the round by timeout, a vote expiry runs the tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TimerKind {
    Countdown,
    Vote,
}

impl Room {
    /// Arm the room's single timer task, superseding any previous one. The
    /// old task's cancellation token fires before the new task is spawned,
    /// and the generation bump makes any still-in-flight stale tick a no-op.
    pub(super) async fn start_timer(self: Arc<Self>, kind: TimerKind, duration: u32) {
        let (generation, cancel_rx) = {
            let mut inner = self.lock().await;
            inner.cancel_timer();

            inner.timer = duration;
            inner.timer_running = true;
            inner.timer_generation += 1;
            match kind {
                TimerKind::Countdown => {
                    inner.state = RoomPhase::Countdown;
                    inner.round_end_by_timeout = false;
                    inner.clear_vote_state();
                    inner.last_votes.clear();
                }
                TimerKind::Vote => {
                    inner.state = RoomPhase::Voting;
                }
            }

            let (cancel_tx, cancel_rx) = watch::channel(());
            inner.timer_cancel = Some(cancel_tx);

            broadcast::broadcast_room(&self.code, &inner);
            (inner.timer_generation, cancel_rx)
        };

        tokio::spawn(run_timer(self, kind, generation, cancel_rx));
    }
}

/// One tick per second. Each tick re-checks the running flag and generation
/// under the room lock before touching anything, so a superseded task never
/// applies a stale decrement or transition, even with a tick already in
/// flight when it was cancelled.
async fn run_timer(
    room: Arc<Room>,
    kind: TimerKind,
    generation: u64,
    mut cancel: watch::Receiver<()>,
) {
    let period = Duration::from_secs(1);
    let mut ticker = time::interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let mut inner = room.lock().await;
                if !inner.timer_running || inner.timer_generation != generation {
                    return;
                }

                inner.timer = inner.timer.saturating_sub(1);
                if inner.timer == 0 {
                    inner.timer_running = false;
                    inner.timer_cancel = None;
                    match kind {
                        TimerKind::Countdown => {
                            // nobody guessed in time: the round just ends,
                            // nobody is penalized or rewarded
                            inner.state = RoomPhase::Scoreboard;
                            inner.round_end_by_timeout = true;
                            inner.votes.clear();
                        }
                        TimerKind::Vote => tally::apply_tally(&mut inner),
                    }
                    tracing::info!(room = %room.code, ?kind, "timer expired");
                    broadcast::broadcast_room(&room.code, &inner);
                    return;
                }

                // broadcast even a plain decrement so clients track the clock
                broadcast::broadcast_room(&room.code, &inner);
            }
            // resolves (with an error) once the stored sender is dropped
            _ = cancel.changed() => return,
        }
    }
}
