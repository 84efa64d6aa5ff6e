//! Friend request and friendship endpoints.
//!
//! The only genuinely stateful business rules in the API live here:
//! duplicate-request detection in either direction, the status-guarded
//! accept, and the idempotent two-row friendship insert.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use velonet_shared::{FriendRequestStatus, InteractionKind, NotificationKind};
use velonet_store::{NewNotification, StoreError};

use crate::api::{created, ok};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestBody {
    requester_id: Uuid,
    addressee_id: Uuid,
}

pub async fn create_request(
    State(state): State<AppState>,
    Json(body): Json<CreateRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.requester_id == body.addressee_id {
        return Err(ApiError::BadRequest(
            "Cannot send a friend request to yourself".into(),
        ));
    }

    let (request, requester) = {
        let db = state.db.lock().await;

        let requester = db.get_profile(body.requester_id).map_err(|e| match e {
            StoreError::NotFound => ApiError::NotFound("No such requester profile".into()),
            other => other.into(),
        })?;
        db.get_profile(body.addressee_id).map_err(|e| match e {
            StoreError::NotFound => ApiError::NotFound("No such addressee profile".into()),
            other => other.into(),
        })?;

        if db.are_friends(body.requester_id, body.addressee_id)? {
            return Err(ApiError::Conflict("Already friends".into()));
        }
        if db
            .pending_request_between(body.requester_id, body.addressee_id)?
            .is_some()
        {
            return Err(ApiError::Conflict(
                "A pending friend request already exists between these users".into(),
            ));
        }

        // The UNIQUE constraint is the backstop for the race between the
        // check above and this insert.
        let request = db
            .create_friend_request(body.requester_id, body.addressee_id)
            .map_err(|e| match e {
                StoreError::Sqlite(_) => ApiError::Conflict(
                    "A pending friend request already exists between these users".into(),
                ),
                other => other.into(),
            })?;
        (request, requester)
    };

    state
        .notifier
        .notify(NewNotification {
            recipient_id: body.addressee_id,
            kind: NotificationKind::FriendRequest,
            title: "New friend request".to_string(),
            body: format!("{} wants to ride with you", requester.display_name),
            actor_id: Some(body.requester_id),
            related_id: Some(request.id),
            related_kind: Some("friend_request".to_string()),
            action_url: Some("/friends/requests".to_string()),
        })
        .await;

    Ok(created(request))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequestBody {
    status: FriendRequestStatus,
}

pub async fn resolve_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ResolveRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.status == FriendRequestStatus::Pending {
        return Err(ApiError::BadRequest(
            "status must be 'accepted' or 'rejected'".into(),
        ));
    }

    let (request, addressee_name) = {
        let db = state.db.lock().await;

        let request = db.get_friend_request(id)?;
        if request.status != FriendRequestStatus::Pending {
            return Err(ApiError::Conflict("Request already resolved".into()));
        }

        // Status guard: a concurrent resolve wins and we report the conflict.
        if !db.resolve_friend_request(id, body.status)? {
            return Err(ApiError::Conflict("Request already resolved".into()));
        }

        let mut addressee_name = None;
        if body.status == FriendRequestStatus::Accepted {
            let now = Utc::now();
            db.insert_friendship_pair(request.requester_id, request.addressee_id, now)?;
            db.record_interaction(request.requester_id, InteractionKind::FriendAccept, now)?;
            db.record_interaction(request.addressee_id, InteractionKind::FriendAccept, now)?;
            addressee_name = Some(db.get_profile(request.addressee_id)?.display_name);
        }

        (db.get_friend_request(id)?, addressee_name)
    };

    if let Some(name) = addressee_name {
        state
            .notifier
            .notify(NewNotification {
                recipient_id: request.requester_id,
                kind: NotificationKind::FriendAccept,
                title: "Friend request accepted".to_string(),
                body: format!("{name} accepted your friend request"),
                actor_id: Some(request.addressee_id),
                related_id: Some(request.id),
                related_kind: Some("friend_request".to_string()),
                action_url: Some("/friends".to_string()),
            })
            .await;
    }

    Ok(ok(request))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestDirection {
    Incoming,
    Outgoing,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequestsQuery {
    user_id: Uuid,
    direction: Option<RequestDirection>,
}

pub async fn list_requests(
    State(state): State<AppState>,
    Query(query): Query<ListRequestsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.lock().await;
    let requests = match query.direction.unwrap_or(RequestDirection::Incoming) {
        RequestDirection::Incoming => db.incoming_requests(query.user_id)?,
        RequestDirection::Outgoing => db.outgoing_requests(query.user_id)?,
    };
    Ok(ok(requests))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFriendsQuery {
    user_id: Uuid,
}

pub async fn list_friends(
    State(state): State<AppState>,
    Query(query): Query<ListFriendsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let friends = state.db.lock().await.list_friends(query.user_id)?;
    Ok(ok(friends))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnfriendBody {
    user_id: Uuid,
    friend_id: Uuid,
}

pub async fn unfriend(
    State(state): State<AppState>,
    Json(body): Json<UnfriendBody>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state
        .db
        .lock()
        .await
        .delete_friendship(body.user_id, body.friend_id)?;
    if !removed {
        return Err(ApiError::NotFound("No such friendship".into()));
    }
    Ok(ok(serde_json::json!({ "removed": true })))
}
