//! Direct-message endpoints.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use velonet_shared::events::{MessageEvent, ServerEvent};
use velonet_shared::{InteractionKind, NotificationKind};
use velonet_store::{Message, NewNotification, StoreError};

use crate::api::{created, ok, Pagination};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBody {
    sender_id: Uuid,
    recipient_id: Uuid,
    body: String,
}

pub async fn send(
    State(state): State<AppState>,
    Json(body): Json<SendBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.body.trim().is_empty() {
        return Err(ApiError::BadRequest("Message body must not be empty".into()));
    }
    if body.sender_id == body.recipient_id {
        return Err(ApiError::BadRequest(
            "Cannot send a message to yourself".into(),
        ));
    }

    let (message, sender_name) = {
        let db = state.db.lock().await;

        let sender = db.get_profile(body.sender_id).map_err(|e| match e {
            StoreError::NotFound => ApiError::NotFound("No such sender profile".into()),
            other => other.into(),
        })?;
        db.get_profile(body.recipient_id).map_err(|e| match e {
            StoreError::NotFound => ApiError::NotFound("No such recipient profile".into()),
            other => other.into(),
        })?;

        let message = db.insert_message(body.sender_id, body.recipient_id, body.body.trim())?;
        db.record_interaction(body.sender_id, InteractionKind::Message, Utc::now())?;
        (message, sender.display_name)
    };

    // Live delivery to the recipient's open tabs.
    state
        .hub
        .send_to_user(message.recipient_id, &to_event(&message))
        .await;

    state
        .notifier
        .notify(NewNotification {
            recipient_id: message.recipient_id,
            kind: NotificationKind::Message,
            title: format!("New message from {sender_name}"),
            body: preview(&message.body),
            actor_id: Some(message.sender_id),
            related_id: Some(message.id),
            related_kind: Some("message".to_string()),
            action_url: Some(format!("/chat/{}", message.sender_id)),
        })
        .await;

    Ok(created(message))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationQuery {
    user_id: Uuid,
    peer_id: Uuid,
    limit: Option<u32>,
    offset: Option<u32>,
}

pub async fn conversation(
    State(state): State<AppState>,
    Query(query): Query<ConversationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = Pagination::new(query.limit, query.offset).clamp();
    let messages = state
        .db
        .lock()
        .await
        .conversation(query.user_id, query.peer_id, limit, offset)?;
    Ok(ok(messages))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadQuery {
    user_id: Uuid,
}

pub async fn unread_count(
    State(state): State<AppState>,
    Query(query): Query<UnreadQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let count = state.db.lock().await.unread_message_count(query.user_id)?;
    Ok(ok(serde_json::json!({ "count": count })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.lock().await;
    db.get_message(id)?;
    let updated = db.mark_message_read(id)?;
    Ok(ok(serde_json::json!({ "updated": updated })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkConversationBody {
    user_id: Uuid,
    peer_id: Uuid,
}

pub async fn mark_conversation_read(
    State(state): State<AppState>,
    Json(body): Json<MarkConversationBody>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state
        .db
        .lock()
        .await
        .mark_conversation_read(body.user_id, body.peer_id)?;
    Ok(ok(serde_json::json!({ "updated": updated })))
}

fn to_event(message: &Message) -> ServerEvent {
    ServerEvent::NewMessage(MessageEvent {
        id: message.id,
        sender_id: message.sender_id,
        recipient_id: Some(message.recipient_id),
        group_id: None,
        body: message.body.clone(),
        created_at: message.created_at,
    })
}

/// Notification bodies show a bounded preview, never the whole message.
fn preview(body: &str) -> String {
    const MAX_CHARS: usize = 80;
    if body.chars().count() <= MAX_CHARS {
        body.to_string()
    } else {
        let mut cut: String = body.chars().take(MAX_CHARS).collect();
        cut.push('…');
        cut
    }
}
