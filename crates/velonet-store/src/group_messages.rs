//! Group messages and their per-reader receipts.
//!
//! Unlike direct messages there is no `is_read` flag; each reader gets a
//! receipt row, inserted idempotently.

use chrono::Utc;
use rusqlite::{params, Row};
use uuid::Uuid;

use crate::convert::{ts_col, uuid_col};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::GroupMessage;

const GROUP_MESSAGE_COLUMNS: &str = "id, group_id, sender_id, body, created_at";

impl Database {
    pub fn insert_group_message(
        &self,
        group: Uuid,
        sender: Uuid,
        body: &str,
    ) -> Result<GroupMessage> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        self.conn().execute(
            "INSERT INTO group_messages (id, group_id, sender_id, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id.to_string(),
                group.to_string(),
                sender.to_string(),
                body,
                now.to_rfc3339(),
            ],
        )?;

        self.get_group_message(id)
    }

    pub fn get_group_message(&self, id: Uuid) -> Result<GroupMessage> {
        self.conn()
            .query_row(
                &format!("SELECT {GROUP_MESSAGE_COLUMNS} FROM group_messages WHERE id = ?1"),
                params![id.to_string()],
                row_to_group_message,
            )
            .map_err(StoreError::from_query)
    }

    /// Messages in a group, newest first.
    pub fn list_group_messages(
        &self,
        group: Uuid,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<GroupMessage>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {GROUP_MESSAGE_COLUMNS} FROM group_messages
             WHERE group_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2 OFFSET ?3"
        ))?;

        let rows = stmt.query_map(
            params![group.to_string(), limit, offset],
            row_to_group_message,
        )?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Record that `reader` has seen a group message.  Idempotent: a repeat
    /// call returns `false` and changes nothing.
    pub fn mark_group_message_read(&self, message: Uuid, reader: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "INSERT INTO group_message_receipts (message_id, profile_id, read_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (message_id, profile_id) DO NOTHING",
            params![
                message.to_string(),
                reader.to_string(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(affected > 0)
    }

    /// Messages in `group` that `reader` has neither sent nor receipted.
    pub fn unread_group_message_count(&self, group: Uuid, reader: Uuid) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM group_messages m
             WHERE m.group_id = ?1
               AND m.sender_id <> ?2
               AND NOT EXISTS (
                   SELECT 1 FROM group_message_receipts r
                   WHERE r.message_id = m.id AND r.profile_id = ?2
               )",
            params![group.to_string(), reader.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn row_to_group_message(row: &Row<'_>) -> rusqlite::Result<GroupMessage> {
    Ok(GroupMessage {
        id: uuid_col(row, 0)?,
        group_id: uuid_col(row, 1)?,
        sender_id: uuid_col(row, 2)?,
        body: row.get(3)?,
        created_at: ts_col(row, 4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewGroup, NewProfile};
    use velonet_shared::{BikeType, GroupRole, GroupType, SkillLevel};

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
            bike_type: BikeType::City,
        })
        .unwrap()
        .id
    }

    fn group_with(db: &Database, creator: Uuid, others: &[Uuid]) -> Uuid {
        let group = db
            .create_group(
                &NewGroup {
                    name: "Evening spins".to_string(),
                    description: None,
                    group_type: GroupType::General,
                    city: None,
                    latitude: None,
                    longitude: None,
                },
                creator,
            )
            .unwrap();
        for member in others {
            db.add_group_member(group.id, *member, GroupRole::Member)
                .unwrap();
        }
        group.id
    }

    #[test]
    fn receipts_drive_unread_counts() {
        let db = Database::open_in_memory().unwrap();
        let a = profile(&db, "a");
        let b = profile(&db, "b");
        let group = group_with(&db, a, &[b]);

        let first = db.insert_group_message(group, a, "ride at 7?").unwrap();
        db.insert_group_message(group, a, "bring lights").unwrap();

        // The sender has nothing unread, the other member has two.
        assert_eq!(db.unread_group_message_count(group, a).unwrap(), 0);
        assert_eq!(db.unread_group_message_count(group, b).unwrap(), 2);

        assert!(db.mark_group_message_read(first.id, b).unwrap());
        assert_eq!(db.unread_group_message_count(group, b).unwrap(), 1);

        // Re-reading is a no-op.
        assert!(!db.mark_group_message_read(first.id, b).unwrap());
        assert_eq!(db.unread_group_message_count(group, b).unwrap(), 1);
    }

    #[test]
    fn listing_is_newest_first_and_paged() {
        let db = Database::open_in_memory().unwrap();
        let a = profile(&db, "a");
        let group = group_with(&db, a, &[]);

        for i in 0..5 {
            db.insert_group_message(group, a, &format!("msg {i}")).unwrap();
        }

        let page = db.list_group_messages(group, 2, 0).unwrap();
        assert_eq!(page.len(), 2);

        let rest = db.list_group_messages(group, 10, 2).unwrap();
        assert_eq!(rest.len(), 3);
    }
}
