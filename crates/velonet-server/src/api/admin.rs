//! Admin console endpoints, guarded by the `ADMIN_TOKEN` bearer token.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::api::{ok, Pagination};
use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::state::AppState;

fn verify_admin_token(headers: &HeaderMap, config: &ServerConfig) -> Result<(), ApiError> {
    let Some(ref expected) = config.admin_token else {
        return Err(ApiError::Forbidden(
            "Admin API is disabled (no ADMIN_TOKEN configured)".into(),
        ));
    };

    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or(auth);

    // Constant-time comparison to prevent timing attacks on admin token.
    use subtle::ConstantTimeEq;
    let token_bytes = token.as_bytes();
    let expected_bytes = expected.as_bytes();
    if token_bytes.len() != expected_bytes.len()
        || token_bytes.ct_eq(expected_bytes).unwrap_u8() != 1
    {
        return Err(ApiError::Forbidden("Invalid admin token".into()));
    }

    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatus {
    version: &'static str,
    uptime_secs: u64,
    profiles: i64,
    posts: i64,
    groups: i64,
    online_users: usize,
    realtime_connections: usize,
}

pub async fn status(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    verify_admin_token(&headers, &state.config)?;

    let (profiles, posts, groups) = {
        let db = state.db.lock().await;
        (db.count_profiles()?, db.count_posts()?, db.count_groups()?)
    };

    Ok(ok(AdminStatus {
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        profiles,
        posts,
        groups,
        online_users: state.hub.online_user_count().await,
        realtime_connections: state.hub.connection_count().await,
    }))
}

pub async fn list_profiles(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<impl IntoResponse, ApiError> {
    verify_admin_token(&headers, &state.config)?;

    let (limit, offset) = page.clamp();
    let profiles = state.db.lock().await.list_profiles(limit, offset)?;
    Ok(ok(profiles))
}

pub async fn delete_profile(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    verify_admin_token(&headers, &state.config)?;

    if !state.db.lock().await.delete_profile(id)? {
        return Err(ApiError::NotFound("No such profile".into()));
    }
    info!(profile = %id, "admin deleted profile");
    Ok(ok(serde_json::json!({ "deleted": true })))
}

pub async fn delete_post(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    verify_admin_token(&headers, &state.config)?;

    if !state.db.lock().await.delete_post(id)? {
        return Err(ApiError::NotFound("No such post".into()));
    }
    info!(post = %id, "admin deleted post");
    Ok(ok(serde_json::json!({ "deleted": true })))
}

pub async fn delete_group(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    verify_admin_token(&headers, &state.config)?;

    if !state.db.lock().await.delete_group(id)? {
        return Err(ApiError::NotFound("No such group".into()));
    }
    info!(group = %id, "admin deleted group");
    Ok(ok(serde_json::json!({ "deleted": true })))
}
