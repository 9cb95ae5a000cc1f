//! WebSocket transport: upgrades a connection, registers a session, and
//! pumps `ServerMessage`s out while pulling `join-room`/`leave-room`
//! requests in, with a write deadline per send.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::NotifierRegistry;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct NotifierState {
    pub registry: Arc<NotifierRegistry>,
    pub write_timeout: Duration,
}

pub async fn ws_handler(
    State(state): State<Arc<NotifierState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

async fn handle_socket(socket: WebSocket, state: Arc<NotifierState>, addr: SocketAddr) {
    let (mut sink, mut stream) = socket.split();
    let (session, mut outbox) = state.registry.register_session(Some(addr.to_string()), None);

    let welcome = ServerMessage::Welcome { session_id: session.id, server_time: Utc::now() };
    if send_with_deadline(&mut sink, &welcome, state.write_timeout).await.is_err() {
        state.registry.remove_session(session.id);
        return;
    }

    let registry = Arc::clone(&state.registry);
    let session_id = session.id;
    let write_timeout = state.write_timeout;

    let mut writer_task = tokio::spawn(async move {
        while let Some(message) = outbox.recv().await {
            if send_with_deadline(&mut sink, &message, write_timeout).await.is_err() {
                break;
            }
        }
    });

    let mut reader_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = stream.next().await {
            let Message::Text(text) = msg else { continue };
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::JoinRoom { room, filters, user_id }) => {
                    let result = registry.join_room(&session, &room, filters);
                    info!(room, user_id = ?user_id, "session joined room");
                    let _ = session.sender.send(ServerMessage::RoomJoined {
                        room: room.clone(),
                        member_count: result.member_count,
                        filters: result.filters,
                    });
                }
                Ok(ClientMessage::LeaveRoom { room }) => {
                    registry.leave_room(&session, &room);
                }
                Err(e) => {
                    warn!(error = %e, "dropping unparseable client message");
                }
            }
        }
        registry.remove_session(session_id);
    });

    tokio::select! {
        _ = &mut writer_task => { reader_task.abort(); }
        _ = &mut reader_task => { writer_task.abort(); }
    }
}

async fn send_with_deadline(
    sink: &mut (impl futures::SinkExt<Message> + Unpin),
    message: &ServerMessage,
    timeout: Duration,
) -> Result<(), ()> {
    let text = serde_json::to_string(message).map_err(|_| ())?;
    tokio::time::timeout(timeout, sink.send(Message::Text(text))).await.map_err(|_| ())?.map_err(|_| ())
}
