//! Group, membership, group-image, and group-message endpoints.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use velonet_shared::events::{MessageEvent, ServerEvent};
use velonet_shared::{GroupRole, GroupType, InteractionKind, NotificationKind};
use velonet_store::{
    Group, GroupImage, GroupMember, GroupMessage, GroupUpdate, NewGroup, NewNotification,
};

use crate::api::{created, ok, Pagination};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupBody {
    creator_id: Uuid,
    #[serde(flatten)]
    group: NewGroup,
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateGroupBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.group.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Group name must not be empty".into()));
    }
    if body.group.group_type == GroupType::Location
        && (body.group.city.is_none()
            || body.group.latitude.is_none()
            || body.group.longitude.is_none())
    {
        return Err(ApiError::BadRequest(
            "Location groups require city, latitude and longitude".into(),
        ));
    }

    let db = state.db.lock().await;
    if !db.profile_exists(body.creator_id)? {
        return Err(ApiError::NotFound("No such creator profile".into()));
    }

    let group = db.create_group(&body.group, body.creator_id)?;
    Ok(created(group))
}

/// A group joined with its images and member list.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDetail {
    #[serde(flatten)]
    group: Group,
    images: Vec<GroupImage>,
    members: Vec<GroupMember>,
}

pub async fn get_detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.lock().await;
    let group = db.get_group(id)?;
    let images = db.list_group_images(id)?;
    let members = db.list_group_members(id)?;
    Ok(ok(GroupDetail {
        group,
        images,
        members,
    }))
}

pub async fn list(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = page.clamp();
    let groups = state.db.lock().await.list_groups(limit, offset)?;
    Ok(ok(groups))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorQuery {
    actor_id: Uuid,
}

/// Require `actor` to be an admin of `group`; 403 otherwise.
fn require_admin(
    db: &velonet_store::Database,
    group: Uuid,
    actor: Uuid,
) -> Result<(), ApiError> {
    match db.member_role(group, actor)? {
        Some(GroupRole::Admin) => Ok(()),
        Some(GroupRole::Member) => Err(ApiError::Forbidden(
            "Only group admins may do this".into(),
        )),
        None => Err(ApiError::Forbidden("Not a member of this group".into())),
    }
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(actor): Query<ActorQuery>,
    Json(body): Json<GroupUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.lock().await;
    db.get_group(id)?;
    require_admin(&db, id, actor.actor_id)?;

    let group = db.update_group(id, &body)?;
    Ok(ok(group))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(actor): Query<ActorQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.lock().await;
    db.get_group(id)?;
    require_admin(&db, id, actor.actor_id)?;

    db.delete_group(id)?;
    Ok(ok(serde_json::json!({ "deleted": true })))
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinBody {
    user_id: Uuid,
}

pub async fn join(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<JoinBody>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.lock().await;
    db.get_group(id)?;
    if !db.profile_exists(body.user_id)? {
        return Err(ApiError::NotFound("No such profile".into()));
    }
    if db.member_role(id, body.user_id)?.is_some() {
        return Err(ApiError::Conflict("Already a member of this group".into()));
    }

    let member = db.add_group_member(id, body.user_id, GroupRole::Member)?;
    Ok(created(member))
}

pub async fn leave(
    State(state): State<AppState>,
    Path((id, profile_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.lock().await;

    let role = db
        .member_role(id, profile_id)?
        .ok_or_else(|| ApiError::NotFound("Not a member of this group".into()))?;

    // The last admin must delete the group (or hand it over) instead of
    // leaving it ownerless.
    if role == GroupRole::Admin && db.count_group_admins(id)? == 1 {
        return Err(ApiError::Conflict(
            "The only admin cannot leave the group".into(),
        ));
    }

    db.remove_group_member(id, profile_id)?;
    Ok(ok(serde_json::json!({ "removed": true })))
}

pub async fn members(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.lock().await;
    db.get_group(id)?;
    let members = db.list_group_members(id)?;
    Ok(ok(members))
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddImageBody {
    url: String,
}

pub async fn add_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(actor): Query<ActorQuery>,
    Json(body): Json<AddImageBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.url.trim().is_empty() {
        return Err(ApiError::BadRequest("Image url must not be empty".into()));
    }

    let db = state.db.lock().await;
    db.get_group(id)?;
    require_admin(&db, id, actor.actor_id)?;

    let image = db.add_group_image(id, body.url.trim())?;
    Ok(created(image))
}

pub async fn remove_image(
    State(state): State<AppState>,
    Path((id, image_id)): Path<(Uuid, Uuid)>,
    Query(actor): Query<ActorQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.lock().await;
    db.get_group(id)?;
    require_admin(&db, id, actor.actor_id)?;

    if !db.remove_group_image(image_id)? {
        return Err(ApiError::NotFound("No such image".into()));
    }
    Ok(ok(serde_json::json!({ "deleted": true })))
}

// ---------------------------------------------------------------------------
// Group messages
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendGroupMessageBody {
    sender_id: Uuid,
    body: String,
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SendGroupMessageBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.body.trim().is_empty() {
        return Err(ApiError::BadRequest("Message body must not be empty".into()));
    }

    let (message, group_name, sender_name, recipients) = {
        let db = state.db.lock().await;
        let group = db.get_group(id)?;

        if db.member_role(id, body.sender_id)?.is_none() {
            return Err(ApiError::Forbidden("Not a member of this group".into()));
        }
        let sender = db.get_profile(body.sender_id)?;

        let message = db.insert_group_message(id, body.sender_id, body.body.trim())?;
        db.record_interaction(body.sender_id, InteractionKind::Message, Utc::now())?;

        let recipients: Vec<Uuid> = db
            .group_member_ids(id)?
            .into_iter()
            .filter(|m| *m != body.sender_id)
            .collect();

        (message, group.name, sender.display_name, recipients)
    };

    let event = to_event(&message);
    for member in &recipients {
        state.hub.send_to_user(*member, &event).await;
        state
            .notifier
            .notify(NewNotification {
                recipient_id: *member,
                kind: NotificationKind::GroupMessage,
                title: format!("New message in {group_name}"),
                body: format!("{sender_name}: {}", message.body),
                actor_id: Some(message.sender_id),
                related_id: Some(message.group_id),
                related_kind: Some("group".to_string()),
                action_url: Some(format!("/groups/{}", message.group_id)),
            })
            .await;
    }

    Ok(created(message))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesQuery {
    user_id: Uuid,
    limit: Option<u32>,
    offset: Option<u32>,
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = Pagination::new(query.limit, query.offset).clamp();

    let db = state.db.lock().await;
    db.get_group(id)?;
    if db.member_role(id, query.user_id)?.is_none() {
        return Err(ApiError::Forbidden("Not a member of this group".into()));
    }

    let messages = db.list_group_messages(id, limit, offset)?;
    Ok(ok(messages))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadBody {
    user_id: Uuid,
}

pub async fn mark_message_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<MarkReadBody>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.lock().await;
    let message = db.get_group_message(id)?;
    if db.member_role(message.group_id, body.user_id)?.is_none() {
        return Err(ApiError::Forbidden("Not a member of this group".into()));
    }

    let updated = db.mark_group_message_read(id, body.user_id)?;
    Ok(ok(serde_json::json!({ "updated": updated })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadQuery {
    user_id: Uuid,
}

pub async fn unread_count(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<UnreadQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.lock().await;
    db.get_group(id)?;
    if db.member_role(id, query.user_id)?.is_none() {
        return Err(ApiError::Forbidden("Not a member of this group".into()));
    }

    let count = db.unread_group_message_count(id, query.user_id)?;
    Ok(ok(serde_json::json!({ "count": count })))
}

fn to_event(message: &GroupMessage) -> ServerEvent {
    ServerEvent::NewMessage(MessageEvent {
        id: message.id,
        sender_id: message.sender_id,
        recipient_id: None,
        group_id: Some(message.group_id),
        body: message.body.clone(),
        created_at: message.created_at,
    })
}
