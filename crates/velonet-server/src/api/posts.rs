//! Post, reply, feed, and view-marker endpoints.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use velonet_shared::{InteractionKind, NotificationKind};
use velonet_store::{FeedPost, NewNotification, Post, PostImage, PostReply, StoreError};

use crate::api::{created, ok, Pagination};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostBody {
    author_id: Uuid,
    body: String,
    #[serde(default)]
    image_urls: Vec<String>,
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreatePostBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.body.trim().is_empty() {
        return Err(ApiError::BadRequest("Post body must not be empty".into()));
    }

    let (post, images, author_name, friends) = {
        let db = state.db.lock().await;

        let author = db.get_profile(body.author_id).map_err(|e| match e {
            StoreError::NotFound => ApiError::NotFound("No such author profile".into()),
            other => other.into(),
        })?;

        let post = db.create_post(body.author_id, body.body.trim(), &body.image_urls)?;
        db.record_interaction(body.author_id, InteractionKind::Post, Utc::now())?;

        let images = db.list_post_images(post.id)?;
        let friends = db.friend_ids(body.author_id)?;
        (post, images, author.display_name, friends)
    };

    for friend in &friends {
        state
            .notifier
            .notify(NewNotification {
                recipient_id: *friend,
                kind: NotificationKind::Post,
                title: "New post".to_string(),
                body: format!("{author_name} shared a new post"),
                actor_id: Some(post.author_id),
                related_id: Some(post.id),
                related_kind: Some("post".to_string()),
                action_url: Some(format!("/posts/{}", post.id)),
            })
            .await;
    }

    Ok(created(PostWithImages { post, images }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostWithImages {
    #[serde(flatten)]
    post: Post,
    images: Vec<PostImage>,
}

/// A post joined with everything the detail page renders.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetail {
    #[serde(flatten)]
    post: Post,
    images: Vec<PostImage>,
    replies: Vec<PostReply>,
    reply_count: i64,
}

pub async fn get_detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.lock().await;
    let post = db.get_post(id)?;
    let images = db.list_post_images(id)?;
    let replies = db.list_post_replies(id)?;
    let reply_count = replies.len() as i64;
    Ok(ok(PostDetail {
        post,
        images,
        replies,
        reply_count,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    user_id: Uuid,
    limit: Option<u32>,
    offset: Option<u32>,
}

pub async fn feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = Pagination::new(query.limit, query.offset).clamp();

    let db = state.db.lock().await;
    if !db.profile_exists(query.user_id)? {
        return Err(ApiError::NotFound("No such profile".into()));
    }

    let posts = db.feed(query.user_id, limit, offset)?;
    let mut feed = Vec::with_capacity(posts.len());
    for post in posts {
        let images = db.list_post_images(post.id)?;
        let reply_count = db.reply_count(post.id)?;
        let seen = db.seen_reply_count(query.user_id, post.id)?.unwrap_or(0);
        feed.push(FeedPost {
            post,
            images,
            reply_count,
            unseen_replies: (reply_count - seen).max(0),
        });
    }

    Ok(ok(feed))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyBody {
    author_id: Uuid,
    body: String,
}

pub async fn reply(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ReplyBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.body.trim().is_empty() {
        return Err(ApiError::BadRequest("Reply body must not be empty".into()));
    }

    let (reply, post_author, author_name) = {
        let db = state.db.lock().await;
        let post = db.get_post(id)?;
        let author = db.get_profile(body.author_id).map_err(|e| match e {
            StoreError::NotFound => ApiError::NotFound("No such author profile".into()),
            other => other.into(),
        })?;

        let reply = db.insert_post_reply(id, body.author_id, body.body.trim())?;
        (reply, post.author_id, author.display_name)
    };

    // Replying to your own post is not news to you.
    if post_author != reply.author_id {
        state
            .notifier
            .notify(NewNotification {
                recipient_id: post_author,
                kind: NotificationKind::PostReply,
                title: "New reply".to_string(),
                body: format!("{author_name} replied to your post"),
                actor_id: Some(reply.author_id),
                related_id: Some(id),
                related_kind: Some("post".to_string()),
                action_url: Some(format!("/posts/{id}")),
            })
            .await;
    }

    Ok(created(reply))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordViewBody {
    user_id: Uuid,
}

/// Snapshot the current reply count as "seen" for this viewer.
pub async fn record_view(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<RecordViewBody>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.lock().await;
    db.get_post(id)?;
    if !db.profile_exists(body.user_id)? {
        return Err(ApiError::NotFound("No such profile".into()));
    }

    let reply_count = db.reply_count(id)?;
    db.record_post_view(body.user_id, id, reply_count)?;
    Ok(ok(serde_json::json!({ "seenReplyCount": reply_count })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteQuery {
    actor_id: Uuid,
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.lock().await;
    let post = db.get_post(id)?;
    if post.author_id != query.actor_id {
        return Err(ApiError::Forbidden(
            "Only the author may delete a post".into(),
        ));
    }

    db.delete_post(id)?;
    Ok(ok(serde_json::json!({ "deleted": true })))
}
