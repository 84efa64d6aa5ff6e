//! CRUD operations for [`Notification`] records.
//!
//! Writes happen through the server's fan-out pipeline; everything here is
//! the storage half of it plus the read-state bookkeeping the client uses
//! for its unread badge.

use chrono::Utc;
use rusqlite::{params, Row};
use uuid::Uuid;

use crate::convert::{enum_col, ts_col, uuid_col, uuid_col_opt};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{NewNotification, Notification};

const NOTIFICATION_COLUMNS: &str = "id, recipient_id, kind, title, body, actor_id, related_id, \
     related_kind, action_url, is_read, created_at";

impl Database {
    /// Insert a notification row; created unread.
    pub fn insert_notification(&self, new: &NewNotification) -> Result<Notification> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        self.conn().execute(
            "INSERT INTO notifications (id, recipient_id, kind, title, body, actor_id,
                 related_id, related_kind, action_url, is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10)",
            params![
                id.to_string(),
                new.recipient_id.to_string(),
                new.kind.as_str(),
                new.title,
                new.body,
                new.actor_id.map(|a| a.to_string()),
                new.related_id.map(|r| r.to_string()),
                new.related_kind,
                new.action_url,
                now.to_rfc3339(),
            ],
        )?;

        self.get_notification(id)
    }

    pub fn get_notification(&self, id: Uuid) -> Result<Notification> {
        self.conn()
            .query_row(
                &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"),
                params![id.to_string()],
                row_to_notification,
            )
            .map_err(StoreError::from_query)
    }

    /// Notifications for a user, newest first.
    pub fn list_notifications(
        &self,
        recipient: Uuid,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Notification>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE recipient_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2 OFFSET ?3"
        ))?;

        let rows = stmt.query_map(
            params![recipient.to_string(), limit, offset],
            row_to_notification,
        )?;

        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row?);
        }
        Ok(notifications)
    }

    pub fn unread_notification_count(&self, recipient: Uuid) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND is_read = 0",
            params![recipient.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Flag one notification read.  Returns `false` when it does not exist
    /// or was already read.
    pub fn mark_notification_read(&self, id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND is_read = 0",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Flag every unread notification for `recipient` read; returns how many
    /// were flipped.
    pub fn mark_all_notifications_read(&self, recipient: Uuid) -> Result<usize> {
        let affected = self.conn().execute(
            "UPDATE notifications SET is_read = 1 WHERE recipient_id = ?1 AND is_read = 0",
            params![recipient.to_string()],
        )?;
        Ok(affected)
    }

    pub fn delete_notification(&self, id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM notifications WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_notification(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: uuid_col(row, 0)?,
        recipient_id: uuid_col(row, 1)?,
        kind: enum_col(row, 2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        actor_id: uuid_col_opt(row, 5)?,
        related_id: uuid_col_opt(row, 6)?,
        related_kind: row.get(7)?,
        action_url: row.get(8)?,
        is_read: row.get(9)?,
        created_at: ts_col(row, 10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewProfile;
    use velonet_shared::{BikeType, NotificationKind, SkillLevel};

    fn profile(db: &Database, user_id: &str) -> Uuid {
        db.create_profile(&NewProfile {
            user_id: user_id.to_string(),
            display_name: user_id.to_string(),
            bio: None,
            city: None,
            latitude: None,
            longitude: None,
            avatar_url: None,
            skill_level: SkillLevel::Beginner,
            bike_type: BikeType::Ebike,
        })
        .unwrap()
        .id
    }

    fn notification_for(recipient: Uuid, title: &str) -> NewNotification {
        NewNotification {
            recipient_id: recipient,
            kind: NotificationKind::Message,
            title: title.to_string(),
            body: "you have mail".to_string(),
            actor_id: None,
            related_id: None,
            related_kind: None,
            action_url: Some("/chat".to_string()),
        }
    }

    #[test]
    fn mark_one_read_decrements_unread_by_exactly_one() {
        let db = Database::open_in_memory().unwrap();
        let user = profile(&db, "u");

        let first = db.insert_notification(&notification_for(user, "one")).unwrap();
        db.insert_notification(&notification_for(user, "two")).unwrap();
        assert_eq!(db.unread_notification_count(user).unwrap(), 2);

        assert!(db.mark_notification_read(first.id).unwrap());
        assert_eq!(db.unread_notification_count(user).unwrap(), 1);

        // Marking again changes nothing.
        assert!(!db.mark_notification_read(first.id).unwrap());
        assert_eq!(db.unread_notification_count(user).unwrap(), 1);
    }

    #[test]
    fn mark_all_resets_unread_to_zero() {
        let db = Database::open_in_memory().unwrap();
        let user = profile(&db, "u");
        let other = profile(&db, "o");

        for i in 0..3 {
            db.insert_notification(&notification_for(user, &format!("n{i}")))
                .unwrap();
        }
        db.insert_notification(&notification_for(other, "keep me unread"))
            .unwrap();

        assert_eq!(db.mark_all_notifications_read(user).unwrap(), 3);
        assert_eq!(db.unread_notification_count(user).unwrap(), 0);
        assert_eq!(db.unread_notification_count(other).unwrap(), 1);
    }

    #[test]
    fn optional_references_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let user = profile(&db, "u");
        let actor = profile(&db, "a");
        let related = Uuid::new_v4();

        let stored = db
            .insert_notification(&NewNotification {
                recipient_id: user,
                kind: NotificationKind::PostReply,
                title: "New reply".to_string(),
                body: "someone replied".to_string(),
                actor_id: Some(actor),
                related_id: Some(related),
                related_kind: Some("post".to_string()),
                action_url: None,
            })
            .unwrap();

        assert_eq!(stored.actor_id, Some(actor));
        assert_eq!(stored.related_id, Some(related));
        assert_eq!(stored.related_kind.as_deref(), Some("post"));
        assert!(!stored.is_read);
    }
}
