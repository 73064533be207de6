//! Snapshot construction and delivery.
//!
//! Snapshots are built and handed to each session's outbound queue while the
//! caller still holds the room lock, so every published view reflects one
//! consistent state. Delivery is fire-and-forget: a send into a closed queue
//! is dropped and the dead connection surfaces later through its read loop.

use crate::protocol::{ChatSender, PlayerView, RoomSnapshot, ServerMessage};
use crate::state::{Player, RoomInner};
use crate::types::RoomCode;
use axum::extract::ws::Message;
use tokio::sync::mpsc::UnboundedSender;

/// Build the transport-safe copy of a room: display attributes plus deep
/// copies of the mutable collections, never connection handles.
pub fn snapshot(code: &RoomCode, inner: &RoomInner) -> RoomSnapshot {
    RoomSnapshot {
        code: code.clone(),
        state: inner.state,
        host_id: inner.host_id.clone(),
        judge_id: inner.judge_id.clone(),
        insider_id: inner.insider_id.clone(),
        timer: inner.timer,
        secret_word: inner.secret_word.clone(),
        round_end_by_timeout: inner.round_end_by_timeout,
        chat_enabled: inner.chat_enabled,
        blocked_voters: inner.blocked_voters.clone(),
        voted: inner.voted.clone(),
        last_votes: inner.last_votes.clone(),
        players: inner
            .players
            .values()
            .map(|p| (p.id.clone(), PlayerView::from(p)))
            .collect(),
    }
}

fn send_json(tx: &UnboundedSender<Message>, msg: &ServerMessage) {
    match serde_json::to_string(msg) {
        Ok(json) => {
            if tx.send(Message::Text(json.into())).is_err() {
                tracing::warn!("dropping message for a disconnected player");
            }
        }
        Err(e) => tracing::error!(error = %e, "failed to serialize server message"),
    }
}

fn fan_out(inner: &RoomInner, json: &str) {
    for p in inner.players.values() {
        if let Some(tx) = &p.tx {
            let _ = tx.send(Message::Text(json.to_string().into()));
        }
    }
}

/// Publish the current state to every connected player in the room.
pub fn broadcast_room(code: &RoomCode, inner: &RoomInner) {
    let msg = ServerMessage::Room {
        self_id: None,
        room: snapshot(code, inner),
    };
    // the payload is identical for everyone, so serialize once
    match serde_json::to_string(&msg) {
        Ok(json) => fan_out(inner, &json),
        Err(e) => tracing::error!(error = %e, "failed to serialize room snapshot"),
    }
}

/// Send a snapshot tagged with the recipient's own id (join handshake), so
/// the client can tell which player it is.
pub fn send_room_to_player(code: &RoomCode, inner: &RoomInner, player_id: &str) {
    let Some(player) = inner.players.get(player_id) else {
        return;
    };
    let Some(tx) = &player.tx else {
        return;
    };
    send_json(
        tx,
        &ServerMessage::Room {
            self_id: Some(player_id.to_string()),
            room: snapshot(code, inner),
        },
    );
}

/// Report an error to a single sender. Best-effort.
pub fn send_error(tx: &UnboundedSender<Message>, code: &str, message: &str) {
    send_json(
        tx,
        &ServerMessage::Error {
            code: code.to_string(),
            message: message.to_string(),
        },
    );
}

/// Relay a chat line verbatim to every member.
pub fn broadcast_chat(inner: &RoomInner, sender: &Player, text: &str) {
    let msg = ServerMessage::Chat {
        from: ChatSender {
            id: sender.id.clone(),
            name: sender.name.clone(),
        },
        text: text.to_string(),
        ts: chrono::Utc::now().timestamp(),
    };
    match serde_json::to_string(&msg) {
        Ok(json) => fan_out(inner, &json),
        Err(e) => tracing::error!(error = %e, "failed to serialize chat message"),
    }
}
