//! Profile endpoints.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use velonet_shared::InteractionKind;
use velonet_store::{NewProfile, ProfileUpdate, StoreError};

use crate::api::{created, ok, Pagination};
use crate::error::ApiError;
use crate::state::AppState;

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<NewProfile>,
) -> Result<impl IntoResponse, ApiError> {
    if body.user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("userId must not be empty".into()));
    }
    if body.display_name.trim().is_empty() {
        return Err(ApiError::BadRequest("displayName must not be empty".into()));
    }

    let db = state.db.lock().await;

    match db.get_profile_by_user_id(&body.user_id) {
        Ok(_) => {
            return Err(ApiError::Conflict(
                "A profile already exists for this user".into(),
            ))
        }
        Err(StoreError::NotFound) => {}
        Err(e) => return Err(e.into()),
    }

    let profile = db.create_profile(&body)?;
    Ok(created(profile))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state.db.lock().await.get_profile(id)?;
    Ok(ok(profile))
}

pub async fn get_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state.db.lock().await.get_profile_by_user_id(&user_id)?;
    Ok(ok(profile))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    search: Option<String>,
    limit: Option<u32>,
    offset: Option<u32>,
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = Pagination::new(query.limit, query.offset).clamp();
    let term = query.search.unwrap_or_default();
    if term.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "search query parameter is required".into(),
        ));
    }

    let profiles = state.db.lock().await.search_profiles(&term, limit, offset)?;
    Ok(ok(profiles))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ProfileUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    if body.display_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::BadRequest("displayName must not be empty".into()));
    }

    let profile = state.db.lock().await.update_profile(id, &body)?;
    Ok(ok(profile))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.db.lock().await.delete_profile(id)?;
    if !deleted {
        return Err(ApiError::NotFound("No such profile".into()));
    }
    Ok(ok(serde_json::json!({ "deleted": true })))
}

/// Called by the auth callback after a successful sign-in; refreshes the
/// login signal of the interaction score.
pub async fn record_login(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let score = state
        .db
        .lock()
        .await
        .record_interaction(id, InteractionKind::Login, Utc::now())?;
    Ok(ok(serde_json::json!({ "interactionScore": score })))
}
