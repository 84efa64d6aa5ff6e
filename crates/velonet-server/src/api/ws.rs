//! WebSocket endpoint feeding the realtime hub.
//!
//! Protocol: the first client frame must be `register { user_id }`.  After
//! that the connection carries heartbeats, typing indicators, and status
//! changes upstream, and [`ServerEvent`]s downstream via a per-connection
//! channel drained by a forwarding task.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use velonet_shared::events::{ClientEvent, ServerEvent};
use velonet_shared::PresenceStatus;

use crate::realtime::Hub;
use crate::state::{AppState, Db};

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();

    // First frame: register.
    let user_id = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(ClientEvent::Register { user_id }) => break user_id,
                    Ok(_) | Err(_) => {
                        debug!("websocket client spoke before registering; closing");
                        return;
                    }
                }
            }
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
            Some(Ok(_)) => continue,
        }
    };

    let known = {
        let db = state.db.lock().await;
        db.profile_exists(user_id).unwrap_or(false)
    };
    if !known {
        debug!(user = %user_id, "websocket register for unknown profile; closing");
        return;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let (conn_id, came_online) = state.hub.register(user_id, tx).await;

    if came_online {
        broadcast_presence(&state.db, &state.hub, user_id, PresenceStatus::Online).await;
    }

    // Drain hub events onto the socket until either side goes away.
    let forward = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "could not serialize realtime event");
                    continue;
                }
            };
            if sink.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        let msg = match frame {
            Ok(msg) => msg,
            Err(_) => break,
        };
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => handle_client_event(&state, user_id, conn_id, event).await,
                Err(e) => debug!(user = %user_id, error = %e, "ignoring malformed client event"),
            },
            Message::Close(_) => break,
            // Ping/pong is handled by the transport; binary frames are not
            // part of the protocol.
            _ => {}
        }
    }

    forward.abort();

    let went_offline = state.hub.remove(user_id, conn_id).await;
    if went_offline {
        broadcast_presence(&state.db, &state.hub, user_id, PresenceStatus::Offline).await;
    }
}

async fn handle_client_event(state: &AppState, user_id: Uuid, conn_id: Uuid, event: ClientEvent) {
    match event {
        // Already bound; a second register is a no-op.
        ClientEvent::Register { .. } => {}

        ClientEvent::Heartbeat => {
            state.hub.heartbeat(user_id, conn_id).await;
        }

        ClientEvent::StatusChange { status } => {
            // Offline is derived from disconnects/sweeps, never client-set.
            if status == PresenceStatus::Offline {
                return;
            }
            state.hub.set_status(user_id, status).await;
            broadcast_presence(&state.db, &state.hub, user_id, status).await;
        }

        ClientEvent::TypingStart { to } => {
            state
                .hub
                .send_to_user(to, &ServerEvent::TypingStart { from: user_id })
                .await;
        }

        ClientEvent::TypingStop { to } => {
            state
                .hub
                .send_to_user(to, &ServerEvent::TypingStop { from: user_id })
                .await;
        }
    }
}

/// Tell a user's connected friends about their presence change.
pub async fn broadcast_presence(db: &Db, hub: &Hub, user_id: Uuid, status: PresenceStatus) {
    let friends = {
        let db = db.lock().await;
        db.friend_ids(user_id)
    };

    match friends {
        Ok(friends) => {
            hub.send_to_many(&friends, &ServerEvent::UserStatusChange { user_id, status })
                .await;
        }
        Err(e) => warn!(user = %user_id, error = %e, "could not load friends for presence broadcast"),
    }
}
