//! CRUD operations for [`Profile`] records, including the interaction-score
//! recompute that runs after every qualifying write.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use uuid::Uuid;

use velonet_shared::score::{interaction_score, InteractionSignals};
use velonet_shared::InteractionKind;

use crate::convert::{enum_col, ts_col, ts_col_opt, uuid_col};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{NewProfile, Profile, ProfileUpdate};

const PROFILE_COLUMNS: &str = "id, user_id, display_name, bio, city, latitude, longitude, \
     avatar_url, skill_level, bike_type, interaction_score, last_login_at, last_message_at, \
     last_post_at, last_friend_accept_at, created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new profile.  The `user_id` uniqueness constraint is the
    /// backstop; callers pre-check with [`Database::get_profile_by_user_id`]
    /// to produce a conflict response instead of a constraint error.
    pub fn create_profile(&self, new: &NewProfile) -> Result<Profile> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        self.conn().execute(
            "INSERT INTO profiles (id, user_id, display_name, bio, city, latitude, longitude,
                 avatar_url, skill_level, bike_type, interaction_score, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?11, ?11)",
            params![
                id.to_string(),
                new.user_id,
                new.display_name,
                new.bio,
                new.city,
                new.latitude,
                new.longitude,
                new.avatar_url,
                new.skill_level.as_str(),
                new.bike_type.as_str(),
                now.to_rfc3339(),
            ],
        )?;

        self.get_profile(id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single profile by internal id.
    pub fn get_profile(&self, id: Uuid) -> Result<Profile> {
        self.conn()
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
                params![id.to_string()],
                row_to_profile,
            )
            .map_err(StoreError::from_query)
    }

    /// Fetch a profile by the external auth identity.
    pub fn get_profile_by_user_id(&self, user_id: &str) -> Result<Profile> {
        self.conn()
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ?1"),
                params![user_id],
                row_to_profile,
            )
            .map_err(StoreError::from_query)
    }

    /// Whether a profile with this id exists.
    pub fn profile_exists(&self, id: Uuid) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM profiles WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Case-insensitive display-name search.
    pub fn search_profiles(&self, query: &str, limit: u32, offset: u32) -> Result<Vec<Profile>> {
        let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles
             WHERE display_name LIKE ?1 ESCAPE '\\'
             ORDER BY display_name ASC
             LIMIT ?2 OFFSET ?3"
        ))?;

        let rows = stmt.query_map(params![pattern, limit, offset], row_to_profile)?;

        let mut profiles = Vec::new();
        for row in rows {
            profiles.push(row?);
        }
        Ok(profiles)
    }

    /// List profiles, newest first.  Used by the admin surface.
    pub fn list_profiles(&self, limit: u32, offset: u32) -> Result<Vec<Profile>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles
             ORDER BY created_at DESC
             LIMIT ?1 OFFSET ?2"
        ))?;

        let rows = stmt.query_map(params![limit, offset], row_to_profile)?;

        let mut profiles = Vec::new();
        for row in rows {
            profiles.push(row?);
        }
        Ok(profiles)
    }

    pub fn count_profiles(&self) -> Result<i64> {
        let count = self
            .conn()
            .query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))?;
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Apply a partial update; absent fields keep their current value.
    pub fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<Profile> {
        let affected = self.conn().execute(
            "UPDATE profiles SET
                 display_name = COALESCE(?1, display_name),
                 bio          = COALESCE(?2, bio),
                 city         = COALESCE(?3, city),
                 latitude     = COALESCE(?4, latitude),
                 longitude    = COALESCE(?5, longitude),
                 avatar_url   = COALESCE(?6, avatar_url),
                 skill_level  = COALESCE(?7, skill_level),
                 bike_type    = COALESCE(?8, bike_type),
                 updated_at   = ?9
             WHERE id = ?10",
            params![
                update.display_name,
                update.bio,
                update.city,
                update.latitude,
                update.longitude,
                update.avatar_url,
                update.skill_level.map(|s| s.as_str()),
                update.bike_type.map(|b| b.as_str()),
                Utc::now().to_rfc3339(),
                id.to_string(),
            ],
        )?;

        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_profile(id)
    }

    /// Record an interaction: touch the signal's timestamp column and
    /// recompute the stored interaction score from all four signals.
    ///
    /// Returns the new score.
    pub fn record_interaction(
        &self,
        id: Uuid,
        kind: InteractionKind,
        now: DateTime<Utc>,
    ) -> Result<f64> {
        let column = match kind {
            InteractionKind::Login => "last_login_at",
            InteractionKind::Message => "last_message_at",
            InteractionKind::Post => "last_post_at",
            InteractionKind::FriendAccept => "last_friend_accept_at",
        };

        let affected = self.conn().execute(
            &format!("UPDATE profiles SET {column} = ?1, updated_at = ?1 WHERE id = ?2"),
            params![now.to_rfc3339(), id.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }

        let signals = self
            .conn()
            .query_row(
                "SELECT last_login_at, last_message_at, last_post_at, last_friend_accept_at
                 FROM profiles WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok(InteractionSignals {
                        last_login_at: ts_col_opt(row, 0)?,
                        last_message_at: ts_col_opt(row, 1)?,
                        last_post_at: ts_col_opt(row, 2)?,
                        last_friend_accept_at: ts_col_opt(row, 3)?,
                    })
                },
            )
            .map_err(StoreError::from_query)?;

        let score = interaction_score(now, &signals);

        self.conn().execute(
            "UPDATE profiles SET interaction_score = ?1 WHERE id = ?2",
            params![score, id.to_string()],
        )?;

        Ok(score)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a profile.  Foreign keys cascade through every owned row
    /// (requests, friendships, messages, posts, notifications, ...).
    pub fn delete_profile(&self, id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM profiles WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

pub(crate) fn row_to_profile(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: uuid_col(row, 0)?,
        user_id: row.get(1)?,
        display_name: row.get(2)?,
        bio: row.get(3)?,
        city: row.get(4)?,
        latitude: row.get(5)?,
        longitude: row.get(6)?,
        avatar_url: row.get(7)?,
        skill_level: enum_col(row, 8)?,
        bike_type: enum_col(row, 9)?,
        interaction_score: row.get(10)?,
        last_login_at: ts_col_opt(row, 11)?,
        last_message_at: ts_col_opt(row, 12)?,
        last_post_at: ts_col_opt(row, 13)?,
        last_friend_accept_at: ts_col_opt(row, 14)?,
        created_at: ts_col(row, 15)?,
        updated_at: ts_col(row, 16)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use velonet_shared::{BikeType, SkillLevel};

    fn new_profile(user_id: &str, name: &str) -> NewProfile {
        NewProfile {
            user_id: user_id.to_string(),
            display_name: name.to_string(),
            bio: None,
            city: Some("Ghent".to_string()),
            latitude: Some(51.05),
            longitude: Some(3.72),
            avatar_url: None,
            skill_level: SkillLevel::Intermediate,
            bike_type: BikeType::Gravel,
        }
    }

    #[test]
    fn create_and_fetch_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let created = db.create_profile(&new_profile("auth|1", "Ada")).unwrap();

        let by_id = db.get_profile(created.id).unwrap();
        assert_eq!(by_id, created);

        let by_user = db.get_profile_by_user_id("auth|1").unwrap();
        assert_eq!(by_user.id, created.id);
        assert_eq!(by_user.interaction_score, 0.0);
    }

    #[test]
    fn duplicate_user_id_is_a_constraint_error() {
        let db = Database::open_in_memory().unwrap();
        db.create_profile(&new_profile("auth|1", "Ada")).unwrap();
        let err = db.create_profile(&new_profile("auth|1", "Imposter"));
        assert!(matches!(err, Err(StoreError::Sqlite(_))));
    }

    #[test]
    fn partial_update_keeps_unset_fields() {
        let db = Database::open_in_memory().unwrap();
        let created = db.create_profile(&new_profile("auth|1", "Ada")).unwrap();

        let updated = db
            .update_profile(
                created.id,
                &ProfileUpdate {
                    bio: Some("climbing hills".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.bio.as_deref(), Some("climbing hills"));
        assert_eq!(updated.display_name, "Ada");
        assert_eq!(updated.city.as_deref(), Some("Ghent"));
    }

    #[test]
    fn update_of_missing_profile_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = db.update_profile(Uuid::new_v4(), &ProfileUpdate::default());
        assert!(matches!(err, Err(StoreError::NotFound)));
    }

    #[test]
    fn record_interaction_updates_score() {
        let db = Database::open_in_memory().unwrap();
        let created = db.create_profile(&new_profile("auth|1", "Ada")).unwrap();

        let score = db
            .record_interaction(created.id, InteractionKind::Login, Utc::now())
            .unwrap();
        assert!(score > 0.0);

        let reloaded = db.get_profile(created.id).unwrap();
        assert_eq!(reloaded.interaction_score, score);
        assert!(reloaded.last_login_at.is_some());
        assert!(reloaded.last_post_at.is_none());
    }

    #[test]
    fn search_matches_substring() {
        let db = Database::open_in_memory().unwrap();
        db.create_profile(&new_profile("auth|1", "Ada Wheeler")).unwrap();
        db.create_profile(&new_profile("auth|2", "Bram Peeters")).unwrap();

        let hits = db.search_profiles("wheel", 10, 0).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].display_name, "Ada Wheeler");
    }

    #[test]
    fn delete_profile_reports_whether_it_existed() {
        let db = Database::open_in_memory().unwrap();
        let created = db.create_profile(&new_profile("auth|1", "Ada")).unwrap();

        assert!(db.delete_profile(created.id).unwrap());
        assert!(!db.delete_profile(created.id).unwrap());
        assert!(matches!(db.get_profile(created.id), Err(StoreError::NotFound)));
    }
}
