//! Inbound command dispatch
//!
//! Commands arrive already decoded from the session read loop; every
//! precondition is enforced by the room itself under its lock. The return
//! value, if any, is an error for the offending sender only — successful
//! commands answer through the room broadcast instead.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{AppState, Room, RoomError};
use std::sync::Arc;

fn error_reply(e: RoomError) -> Option<ServerMessage> {
    Some(ServerMessage::Error {
        code: e.code().to_string(),
        message: e.to_string(),
    })
}

/// Handle one decoded client command, returning an optional direct reply.
pub async fn handle_message(
    state: &Arc<AppState>,
    room: &Arc<Room>,
    player_id: &str,
    msg: ClientMessage,
) -> Option<ServerMessage> {
    let result = match msg {
        ClientMessage::SetJudge { target_id } => room.set_judge(&target_id).await,

        ClientMessage::SetChatEnabled { chat_enabled } => {
            room.set_chat_enabled(player_id, chat_enabled).await
        }

        ClientMessage::StartRound {
            secret_word,
            duration,
        } => room.clone().start_round(secret_word, duration).await,

        ClientMessage::GuessCorrect => room.clone().guess_correct(player_id).await,

        ClientMessage::VoteInsider { suspect_id } => {
            room.vote_insider(player_id, &suspect_id).await
        }

        ClientMessage::NextRound => {
            room.next_round().await;
            Ok(())
        }

        ClientMessage::Kick { target_id } => {
            let result = room.kick(player_id, &target_id).await;
            if result.is_ok() {
                state.remove_room_if_empty(room).await;
            }
            result
        }

        ClientMessage::Chat { text } => room.chat(player_id, &text).await,
    };

    match result {
        Ok(()) => None,
        Err(e) => error_reply(e),
    }
}
