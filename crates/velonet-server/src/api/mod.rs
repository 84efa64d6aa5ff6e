//! HTTP API surface.
//!
//! One module per resource; every endpoint speaks the uniform envelope
//! `{ success, data?, error? }` with conventional status codes (400
//! validation, 401/403 auth, 404 not found, 409 conflict, 500 internal).

pub mod admin;
pub mod friends;
pub mod groups;
pub mod messages;
pub mod notifications;
pub mod posts;
pub mod profiles;
pub mod push_subscriptions;
pub mod ws;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::routing::{delete, get, patch, post};
use axum::{middleware, Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use velonet_shared::constants::{DEFAULT_PAGE_LIMIT, MAX_BODY_BYTES, MAX_PAGE_LIMIT};

use crate::rate_limit::rate_limit_middleware;
use crate::state::AppState;

/// Uniform response envelope.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 200 with a success envelope.
pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data: Some(data),
        error: None,
    })
}

/// 201 with a success envelope.
pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::CREATED, ok(data))
}

/// Limit/offset pagination accepted by every listing endpoint.
///
/// Query structs keep their own `limit`/`offset` fields (serde's `flatten`
/// does not mix with urlencoded query strings) and funnel them through here.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    limit: Option<u32>,
    offset: Option<u32>,
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self { limit, offset }
    }

    /// Effective (limit, offset), with the limit capped.
    pub fn clamp(&self) -> (u32, u32) {
        (
            self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT),
            self.offset.unwrap_or(0),
        )
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        // Profiles
        .route("/api/profiles", post(profiles::create).get(profiles::search))
        .route(
            "/api/profiles/:id",
            get(profiles::get_by_id)
                .patch(profiles::update)
                .delete(profiles::remove),
        )
        .route("/api/profiles/:id/login", post(profiles::record_login))
        .route("/api/profiles/by-user/:user_id", get(profiles::get_by_user))
        // Friend requests & friendships
        .route(
            "/api/friend-requests",
            post(friends::create_request).get(friends::list_requests),
        )
        .route("/api/friend-requests/:id", patch(friends::resolve_request))
        .route(
            "/api/friends",
            get(friends::list_friends).delete(friends::unfriend),
        )
        // Direct messages
        .route("/api/messages", post(messages::send))
        .route("/api/messages/conversation", get(messages::conversation))
        .route("/api/messages/unread-count", get(messages::unread_count))
        .route("/api/messages/:id/read", patch(messages::mark_read))
        .route(
            "/api/messages/read-conversation",
            patch(messages::mark_conversation_read),
        )
        // Groups
        .route("/api/groups", post(groups::create).get(groups::list))
        .route(
            "/api/groups/:id",
            get(groups::get_detail)
                .patch(groups::update)
                .delete(groups::remove),
        )
        .route(
            "/api/groups/:id/members",
            post(groups::join).get(groups::members),
        )
        .route(
            "/api/groups/:id/members/:profile_id",
            delete(groups::leave),
        )
        .route("/api/groups/:id/images", post(groups::add_image))
        .route(
            "/api/groups/:id/images/:image_id",
            delete(groups::remove_image),
        )
        .route(
            "/api/groups/:id/messages",
            post(groups::send_message).get(groups::list_messages),
        )
        .route(
            "/api/groups/:id/unread-count",
            get(groups::unread_count),
        )
        .route(
            "/api/group-messages/:id/read",
            patch(groups::mark_message_read),
        )
        // Posts
        .route("/api/posts", post(posts::create))
        .route("/api/posts/feed", get(posts::feed))
        .route("/api/posts/:id", get(posts::get_detail).delete(posts::remove))
        .route("/api/posts/:id/replies", post(posts::reply))
        .route("/api/posts/:id/views", post(posts::record_view))
        // Notifications
        .route("/api/notifications", get(notifications::list))
        .route(
            "/api/notifications/unread-count",
            get(notifications::unread_count),
        )
        .route(
            "/api/notifications/read-all",
            patch(notifications::mark_all_read),
        )
        .route(
            "/api/notifications/:id",
            delete(notifications::remove),
        )
        .route(
            "/api/notifications/:id/read",
            patch(notifications::mark_read),
        )
        // Push subscriptions
        .route(
            "/api/push-subscriptions",
            post(push_subscriptions::subscribe).delete(push_subscriptions::unsubscribe),
        )
        // Realtime
        .route("/api/ws", get(ws::ws_handler))
        // Admin
        .route("/admin/status", get(admin::status))
        .route("/admin/profiles", get(admin::list_profiles))
        .route("/admin/profiles/:id", delete(admin::delete_profile))
        .route("/admin/posts/:id", delete(admin::delete_post))
        .route("/admin/groups/:id", delete(admin::delete_group))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
