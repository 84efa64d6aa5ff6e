//! CRUD operations for [`Post`] records, their images, replies, and the
//! per-viewer view markers behind the "new activity" badge.

use chrono::Utc;
use rusqlite::{params, Row};
use uuid::Uuid;

use crate::convert::{ts_col, uuid_col};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Post, PostImage, PostReply};

const POST_COLUMNS: &str = "id, author_id, body, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Posts
    // ------------------------------------------------------------------

    /// Insert a post together with its ordered images.
    pub fn create_post(&self, author: Uuid, body: &str, image_urls: &[String]) -> Result<Post> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        self.conn().execute(
            "INSERT INTO posts (id, author_id, body, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id.to_string(), author.to_string(), body, now.to_rfc3339()],
        )?;

        for (position, url) in image_urls.iter().enumerate() {
            self.conn().execute(
                "INSERT INTO post_images (id, post_id, url, position) VALUES (?1, ?2, ?3, ?4)",
                params![
                    Uuid::new_v4().to_string(),
                    id.to_string(),
                    url,
                    position as i64,
                ],
            )?;
        }

        self.get_post(id)
    }

    pub fn get_post(&self, id: Uuid) -> Result<Post> {
        self.conn()
            .query_row(
                &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
                params![id.to_string()],
                row_to_post,
            )
            .map_err(StoreError::from_query)
    }

    /// Posts by `user` and by their friends, newest first.
    pub fn feed(&self, user: Uuid, limit: u32, offset: u32) -> Result<Vec<Post>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {POST_COLUMNS} FROM posts
             WHERE author_id = ?1
                OR author_id IN (SELECT friend_id FROM friendships WHERE user_id = ?1)
             ORDER BY created_at DESC
             LIMIT ?2 OFFSET ?3"
        ))?;

        let rows = stmt.query_map(params![user.to_string(), limit, offset], row_to_post)?;

        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }

    /// Delete a post; images, replies, and view markers cascade.
    pub fn delete_post(&self, id: Uuid) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM posts WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }

    pub fn count_posts(&self) -> Result<i64> {
        let count = self
            .conn()
            .query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Images
    // ------------------------------------------------------------------

    pub fn list_post_images(&self, post: Uuid) -> Result<Vec<PostImage>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, post_id, url, position FROM post_images
             WHERE post_id = ?1 ORDER BY position ASC",
        )?;

        let rows = stmt.query_map(params![post.to_string()], |row| {
            Ok(PostImage {
                id: uuid_col(row, 0)?,
                post_id: uuid_col(row, 1)?,
                url: row.get(2)?,
                position: row.get(3)?,
            })
        })?;

        let mut images = Vec::new();
        for row in rows {
            images.push(row?);
        }
        Ok(images)
    }

    // ------------------------------------------------------------------
    // Replies
    // ------------------------------------------------------------------

    pub fn insert_post_reply(&self, post: Uuid, author: Uuid, body: &str) -> Result<PostReply> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        self.conn().execute(
            "INSERT INTO post_replies (id, post_id, author_id, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id.to_string(),
                post.to_string(),
                author.to_string(),
                body,
                now.to_rfc3339(),
            ],
        )?;

        Ok(PostReply {
            id,
            post_id: post,
            author_id: author,
            body: body.to_string(),
            created_at: now,
        })
    }

    /// Replies to a post, oldest first.
    pub fn list_post_replies(&self, post: Uuid) -> Result<Vec<PostReply>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, post_id, author_id, body, created_at
             FROM post_replies WHERE post_id = ?1
             ORDER BY created_at ASC",
        )?;

        let rows = stmt.query_map(params![post.to_string()], |row| {
            Ok(PostReply {
                id: uuid_col(row, 0)?,
                post_id: uuid_col(row, 1)?,
                author_id: uuid_col(row, 2)?,
                body: row.get(3)?,
                created_at: ts_col(row, 4)?,
            })
        })?;

        let mut replies = Vec::new();
        for row in rows {
            replies.push(row?);
        }
        Ok(replies)
    }

    pub fn reply_count(&self, post: Uuid) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM post_replies WHERE post_id = ?1",
            params![post.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ------------------------------------------------------------------
    // View markers
    // ------------------------------------------------------------------

    /// Record that `viewer` has seen the post with `seen_reply_count`
    /// replies.  Upserts on the `(profile_id, post_id)` key.
    pub fn record_post_view(&self, viewer: Uuid, post: Uuid, seen_reply_count: i64) -> Result<()> {
        self.conn().execute(
            "INSERT INTO post_views (profile_id, post_id, seen_reply_count, viewed_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (profile_id, post_id) DO UPDATE SET
                 seen_reply_count = excluded.seen_reply_count,
                 viewed_at = excluded.viewed_at",
            params![
                viewer.to_string(),
                post.to_string(),
                seen_reply_count,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// The reply count `viewer` last saw, or `None` when they never viewed
    /// the post.
    pub fn seen_reply_count(&self, viewer: Uuid, post: Uuid) -> Result<Option<i64>> {
        let mut stmt = self.conn().prepare(
            "SELECT seen_reply_count FROM post_views
             WHERE profile_id = ?1 AND post_id = ?2",
        )?;

        let mut rows = stmt.query_map(
            params![viewer.to_string(), post.to_string()],
            |row| row.get::<_, i64>(0),
        )?;

        rows.next().transpose().map_err(StoreError::Sqlite)
    }
}

fn row_to_post(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: uuid_col(row, 0)?,
        author_id: uuid_col(row, 1)?,
        body: row.get(2)?,
        created_at: ts_col(row, 3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewProfile;
    use velonet_shared::{BikeType, SkillLevel};

    fn profile(db: &Database, user_id: &str) -> Uuid {
        db.create_profile(&NewProfile {
            user_id: user_id.to_string(),
            display_name: user_id.to_string(),
            bio: None,
            city: None,
            latitude: None,
            longitude: None,
            avatar_url: None,
            skill_level: SkillLevel::Intermediate,
            bike_type: BikeType::Gravel,
        })
        .unwrap()
        .id
    }

    #[test]
    fn post_keeps_image_order() {
        let db = Database::open_in_memory().unwrap();
        let author = profile(&db, "a");

        let urls = vec![
            "https://cdn/1.jpg".to_string(),
            "https://cdn/2.jpg".to_string(),
        ];
        let post = db.create_post(author, "climbed the Koppenberg", &urls).unwrap();

        let images = db.list_post_images(post.id).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].url, "https://cdn/1.jpg");
        assert_eq!(images[1].position, 1);
    }

    #[test]
    fn feed_contains_own_and_friends_posts_only() {
        let db = Database::open_in_memory().unwrap();
        let me = profile(&db, "me");
        let friend = profile(&db, "friend");
        let stranger = profile(&db, "stranger");
        db.insert_friendship_pair(me, friend, Utc::now()).unwrap();

        db.create_post(me, "mine", &[]).unwrap();
        db.create_post(friend, "friend's", &[]).unwrap();
        db.create_post(stranger, "stranger's", &[]).unwrap();

        let feed = db.feed(me, 50, 0).unwrap();
        assert_eq!(feed.len(), 2);
        assert!(feed.iter().all(|p| p.author_id != stranger));
    }

    #[test]
    fn view_marker_upserts() {
        let db = Database::open_in_memory().unwrap();
        let author = profile(&db, "a");
        let viewer = profile(&db, "v");
        let post = db.create_post(author, "hello", &[]).unwrap();

        assert_eq!(db.seen_reply_count(viewer, post.id).unwrap(), None);

        db.record_post_view(viewer, post.id, 0).unwrap();
        db.insert_post_reply(post.id, author, "self reply").unwrap();
        db.record_post_view(viewer, post.id, 1).unwrap();

        assert_eq!(db.seen_reply_count(viewer, post.id).unwrap(), Some(1));
    }

    #[test]
    fn deleting_post_cascades() {
        let db = Database::open_in_memory().unwrap();
        let author = profile(&db, "a");
        let post = db
            .create_post(author, "gone soon", &["https://cdn/x.jpg".to_string()])
            .unwrap();
        db.insert_post_reply(post.id, author, "first").unwrap();

        assert!(db.delete_post(post.id).unwrap());
        assert!(db.list_post_images(post.id).unwrap().is_empty());
        assert_eq!(db.reply_count(post.id).unwrap(), 0);
    }
}
