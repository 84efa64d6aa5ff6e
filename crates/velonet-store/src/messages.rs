//! CRUD operations for direct [`Message`] records.

use chrono::Utc;
use rusqlite::{params, Row};
use uuid::Uuid;

use crate::convert::{ts_col, uuid_col};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Message;

const MESSAGE_COLUMNS: &str = "id, sender_id, recipient_id, body, is_read, created_at";

impl Database {
    /// Insert a direct message; created unread.
    pub fn insert_message(&self, sender: Uuid, recipient: Uuid, body: &str) -> Result<Message> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        self.conn().execute(
            "INSERT INTO messages (id, sender_id, recipient_id, body, is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![
                id.to_string(),
                sender.to_string(),
                recipient.to_string(),
                body,
                now.to_rfc3339(),
            ],
        )?;

        self.get_message(id)
    }

    pub fn get_message(&self, id: Uuid) -> Result<Message> {
        self.conn()
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id.to_string()],
                row_to_message,
            )
            .map_err(StoreError::from_query)
    }

    /// Messages exchanged between two users, newest first.
    pub fn conversation(
        &self,
        a: Uuid,
        b: Uuid,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE (sender_id = ?1 AND recipient_id = ?2)
                OR (sender_id = ?2 AND recipient_id = ?1)
             ORDER BY created_at DESC
             LIMIT ?3 OFFSET ?4"
        ))?;

        let rows = stmt.query_map(
            params![a.to_string(), b.to_string(), limit, offset],
            row_to_message,
        )?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Flag a single message as read.  Returns `false` when the message does
    /// not exist or was already read.
    pub fn mark_message_read(&self, id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE messages SET is_read = 1 WHERE id = ?1 AND is_read = 0",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Flag every message from `sender` to `reader` as read.  Returns the
    /// number of rows flipped.
    pub fn mark_conversation_read(&self, reader: Uuid, sender: Uuid) -> Result<usize> {
        let affected = self.conn().execute(
            "UPDATE messages SET is_read = 1
             WHERE recipient_id = ?1 AND sender_id = ?2 AND is_read = 0",
            params![reader.to_string(), sender.to_string()],
        )?;
        Ok(affected)
    }

    /// Unread direct messages addressed to `user`.
    pub fn unread_message_count(&self, user: Uuid) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM messages WHERE recipient_id = ?1 AND is_read = 0",
            params![user.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: uuid_col(row, 0)?,
        sender_id: uuid_col(row, 1)?,
        recipient_id: uuid_col(row, 2)?,
        body: row.get(3)?,
        is_read: row.get(4)?,
        created_at: ts_col(row, 5)?,
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
            skill_level: SkillLevel::Advanced,
            bike_type: BikeType::Mountain,
        })
        .unwrap()
        .id
    }

    #[test]
    fn conversation_spans_both_directions() {
        let db = Database::open_in_memory().unwrap();
        let a = profile(&db, "a");
        let b = profile(&db, "b");
        let c = profile(&db, "c");

        db.insert_message(a, b, "hey").unwrap();
        db.insert_message(b, a, "hello").unwrap();
        db.insert_message(a, c, "unrelated").unwrap();

        let conversation = db.conversation(a, b, 50, 0).unwrap();
        assert_eq!(conversation.len(), 2);
        assert!(conversation.iter().all(|m| !m.is_read));
    }

    #[test]
    fn mark_single_read_flips_exactly_one() {
        let db = Database::open_in_memory().unwrap();
        let a = profile(&db, "a");
        let b = profile(&db, "b");

        let first = db.insert_message(a, b, "one").unwrap();
        db.insert_message(a, b, "two").unwrap();
        assert_eq!(db.unread_message_count(b).unwrap(), 2);

        assert!(db.mark_message_read(first.id).unwrap());
        assert_eq!(db.unread_message_count(b).unwrap(), 1);

        // Second attempt is a no-op.
        assert!(!db.mark_message_read(first.id).unwrap());
    }

    #[test]
    fn mark_conversation_read_only_touches_that_sender() {
        let db = Database::open_in_memory().unwrap();
        let a = profile(&db, "a");
        let b = profile(&db, "b");
        let c = profile(&db, "c");

        db.insert_message(a, b, "from a").unwrap();
        db.insert_message(a, b, "from a again").unwrap();
        db.insert_message(c, b, "from c").unwrap();

        assert_eq!(db.mark_conversation_read(b, a).unwrap(), 2);
        assert_eq!(db.unread_message_count(b).unwrap(), 1);
    }
}
