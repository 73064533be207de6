pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::SplitSink, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::broadcast;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub room: Option<String>,
    pub name: Option<String>,
    pub mode: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::debug!(room = ?params.room, name = ?params.name, mode = ?params.mode, "WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

/// Send an error straight over a socket that has no session queue yet
/// (rejected before join).
async fn reject(sink: &mut SplitSink<WebSocket, Message>, code: &str, message: &str) {
    let msg = ServerMessage::Error {
        code: code.to_string(),
        message: message.to_string(),
    };
    if let Ok(json) = serde_json::to_string(&msg) {
        let _ = sink.send(Message::Text(json.into())).await;
    }
    let _ = sink.send(Message::Close(None)).await;
}

/// Drive one player session: resolve the room, join it, pump queued outbound
/// messages onto the socket, and feed decoded commands into the room until
/// the connection drops. The session owns the connection; the room only ever
/// sees the queue's sender.
async fn handle_socket(socket: WebSocket, params: WsQuery, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();

    let (room_code, name) = match (params.room, params.name) {
        (Some(r), Some(n)) if !r.is_empty() && !n.is_empty() => (r, n),
        _ => {
            reject(&mut sink, "VALIDATION_ERROR", "missing room or name").await;
            return;
        }
    };

    let create = params.mode.as_deref() == Some("create");
    let room = match state.get_or_create_room(&room_code, create).await {
        Ok(room) => room,
        Err(e) => {
            reject(&mut sink, e.code(), &e.to_string()).await;
            return;
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    // Writer half: forwards the session queue to the socket. A queued Close
    // frame (kick) ends it deliberately.
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() || closing {
                break;
            }
        }
    });

    let player_id = room.join(name.clone(), Some(tx.clone())).await;
    tracing::info!(room = %room_code, player = %name, id = %player_id, "player joined");

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(cmd) => {
                    tracing::debug!(room = %room_code, player = %player_id, ?cmd, "command received");
                    if let Some(reply) =
                        handlers::handle_message(&state, &room, &player_id, cmd).await
                    {
                        if let Ok(json) = serde_json::to_string(&reply) {
                            let _ = tx.send(Message::Text(json.into()));
                        }
                    }
                }
                Err(e) => {
                    broadcast::send_error(
                        &tx,
                        "VALIDATION_ERROR",
                        &format!("invalid message: {}", e),
                    );
                }
            },
            Message::Ping(data) => {
                let _ = tx.send(Message::Pong(data));
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    tracing::info!(room = %room_code, player = %name, "player disconnected");
    room.leave(&player_id).await;
    state.remove_room_if_empty(&room).await;

    // dropping our queue sender lets the writer drain and stop
    drop(tx);
    let _ = writer.await;
}
