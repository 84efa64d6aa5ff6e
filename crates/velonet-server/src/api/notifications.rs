//! Notification read/unread endpoints.  Creation happens exclusively through
//! the fan-out pipeline ([`crate::notify`]).

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::{ok, Pagination};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    user_id: Uuid,
    limit: Option<u32>,
    offset: Option<u32>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = Pagination::new(query.limit, query.offset).clamp();
    let notifications = state
        .db
        .lock()
        .await
        .list_notifications(query.user_id, limit, offset)?;
    Ok(ok(notifications))
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
    let count = state
        .db
        .lock()
        .await
        .unread_notification_count(query.user_id)?;
    Ok(ok(serde_json::json!({ "count": count })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.lock().await;
    db.get_notification(id)?;
    let updated = db.mark_notification_read(id)?;
    Ok(ok(serde_json::json!({ "updated": updated })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllBody {
    user_id: Uuid,
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Json(body): Json<MarkAllBody>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state
        .db
        .lock()
        .await
        .mark_all_notifications_read(body.user_id)?;
    Ok(ok(serde_json::json!({ "updated": updated })))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.db.lock().await.delete_notification(id)?;
    if !deleted {
        return Err(ApiError::NotFound("No such notification".into()));
    }
    Ok(ok(serde_json::json!({ "deleted": true })))
}
