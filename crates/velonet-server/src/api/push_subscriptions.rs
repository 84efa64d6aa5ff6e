//! Push subscription registration, as posted by the browser after
//! `PushManager.subscribe()`.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::{created, ok};
use crate::error::ApiError;
use crate::state::AppState;

/// The `keys` object of a browser `PushSubscription`.
#[derive(Deserialize)]
pub struct SubscriptionKeys {
    p256dh: String,
    auth: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeBody {
    user_id: Uuid,
    endpoint: String,
    keys: SubscriptionKeys,
}

pub async fn subscribe(
    State(state): State<AppState>,
    Json(body): Json<SubscribeBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.endpoint.trim().is_empty() {
        return Err(ApiError::BadRequest("endpoint must not be empty".into()));
    }
    if body.keys.p256dh.trim().is_empty() || body.keys.auth.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "subscription keys must not be empty".into(),
        ));
    }

    let db = state.db.lock().await;
    if !db.profile_exists(body.user_id)? {
        return Err(ApiError::NotFound("No such profile".into()));
    }

    let subscription = db.upsert_push_subscription(
        body.user_id,
        body.endpoint.trim(),
        &body.keys.p256dh,
        &body.keys.auth,
    )?;
    Ok(created(subscription))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeBody {
    endpoint: String,
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    Json(body): Json<UnsubscribeBody>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state
        .db
        .lock()
        .await
        .delete_push_subscription(body.endpoint.trim())?;
    if !removed {
        return Err(ApiError::NotFound("No such subscription".into()));
    }
    Ok(ok(serde_json::json!({ "removed": true })))
}
