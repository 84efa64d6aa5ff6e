//! Friend requests and the friendship graph.
//!
//! A friendship is a symmetric pair of directed rows.  Accepting a request
//! inserts both directions in one statement with `ON CONFLICT DO NOTHING`,
//! which makes concurrent accepts idempotent; the status transition itself is
//! guarded with `WHERE status = 'pending'`.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use uuid::Uuid;

use velonet_shared::FriendRequestStatus;

use crate::convert::{enum_col, ts_col, uuid_col};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{FriendRequest, Profile};
use crate::profiles::row_to_profile;

const REQUEST_COLUMNS: &str =
    "id, requester_id, addressee_id, status, created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Friend requests
    // ------------------------------------------------------------------

    /// Insert a pending friend request.
    ///
    /// Callers validate the business rules first (no self-request, no
    /// existing friendship, no pending request in either direction); the
    /// schema's UNIQUE and CHECK constraints are the backstop.
    pub fn create_friend_request(&self, requester: Uuid, addressee: Uuid) -> Result<FriendRequest> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        self.conn().execute(
            "INSERT INTO friend_requests (id, requester_id, addressee_id, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, 'pending', ?4, ?4)",
            params![
                id.to_string(),
                requester.to_string(),
                addressee.to_string(),
                now.to_rfc3339(),
            ],
        )?;

        self.get_friend_request(id)
    }

    /// Fetch a single friend request.
    pub fn get_friend_request(&self, id: Uuid) -> Result<FriendRequest> {
        self.conn()
            .query_row(
                &format!("SELECT {REQUEST_COLUMNS} FROM friend_requests WHERE id = ?1"),
                params![id.to_string()],
                row_to_friend_request,
            )
            .map_err(StoreError::from_query)
    }

    /// Any pending request between two users, in either direction.
    pub fn pending_request_between(&self, a: Uuid, b: Uuid) -> Result<Option<FriendRequest>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {REQUEST_COLUMNS} FROM friend_requests
             WHERE status = 'pending'
               AND ((requester_id = ?1 AND addressee_id = ?2)
                 OR (requester_id = ?2 AND addressee_id = ?1))
             LIMIT 1"
        ))?;

        let mut rows = stmt.query_map(
            params![a.to_string(), b.to_string()],
            row_to_friend_request,
        )?;

        rows.next().transpose().map_err(StoreError::Sqlite)
    }

    /// Transition a pending request to `accepted` or `rejected`.
    ///
    /// Returns `false` when the request was not pending anymore (resolved by
    /// a concurrent call); the status guard makes the race harmless.
    pub fn resolve_friend_request(&self, id: Uuid, status: FriendRequestStatus) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE friend_requests SET status = ?1, updated_at = ?2
             WHERE id = ?3 AND status = 'pending'",
            params![status.as_str(), Utc::now().to_rfc3339(), id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Pending requests addressed to `user`, newest first.
    pub fn incoming_requests(&self, user: Uuid) -> Result<Vec<FriendRequest>> {
        self.requests_where("addressee_id", user)
    }

    /// Pending requests sent by `user`, newest first.
    pub fn outgoing_requests(&self, user: Uuid) -> Result<Vec<FriendRequest>> {
        self.requests_where("requester_id", user)
    }

    fn requests_where(&self, column: &str, user: Uuid) -> Result<Vec<FriendRequest>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {REQUEST_COLUMNS} FROM friend_requests
             WHERE {column} = ?1 AND status = 'pending'
             ORDER BY created_at DESC"
        ))?;

        let rows = stmt.query_map(params![user.to_string()], row_to_friend_request)?;

        let mut requests = Vec::new();
        for row in rows {
            requests.push(row?);
        }
        Ok(requests)
    }

    // ------------------------------------------------------------------
    // Friendships
    // ------------------------------------------------------------------

    /// Whether a friendship row exists from `a` to `b`.  Rows are always
    /// created in pairs, so one direction implies the other.
    pub fn are_friends(&self, a: Uuid, b: Uuid) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM friendships WHERE user_id = ?1 AND friend_id = ?2",
            params![a.to_string(), b.to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Insert both directions of a friendship in one statement.  `ON CONFLICT
    /// DO NOTHING` makes a retried or concurrent accept a no-op.
    pub fn insert_friendship_pair(&self, a: Uuid, b: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.conn().execute(
            "INSERT INTO friendships (user_id, friend_id, created_at)
             VALUES (?1, ?2, ?3), (?2, ?1, ?3)
             ON CONFLICT (user_id, friend_id) DO NOTHING",
            params![a.to_string(), b.to_string(), at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Ids of every friend of `user`.
    pub fn friend_ids(&self, user: Uuid) -> Result<Vec<Uuid>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT friend_id FROM friendships WHERE user_id = ?1")?;

        let rows = stmt.query_map(params![user.to_string()], |row| uuid_col(row, 0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    /// Profiles of every friend of `user`, ordered by display name.
    pub fn list_friends(&self, user: Uuid) -> Result<Vec<Profile>> {
        let mut stmt = self.conn().prepare(
            "SELECT p.id, p.user_id, p.display_name, p.bio, p.city, p.latitude, p.longitude,
                    p.avatar_url, p.skill_level, p.bike_type, p.interaction_score,
                    p.last_login_at, p.last_message_at, p.last_post_at, p.last_friend_accept_at,
                    p.created_at, p.updated_at
             FROM friendships f
             JOIN profiles p ON p.id = f.friend_id
             WHERE f.user_id = ?1
             ORDER BY p.display_name ASC",
        )?;

        let rows = stmt.query_map(params![user.to_string()], row_to_profile)?;

        let mut friends = Vec::new();
        for row in rows {
            friends.push(row?);
        }
        Ok(friends)
    }

    /// Remove both directions of a friendship.  Returns `false` when no row
    /// existed.
    pub fn delete_friendship(&self, a: Uuid, b: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM friendships
             WHERE (user_id = ?1 AND friend_id = ?2)
                OR (user_id = ?2 AND friend_id = ?1)",
            params![a.to_string(), b.to_string()],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_friend_request(row: &Row<'_>) -> rusqlite::Result<FriendRequest> {
    Ok(FriendRequest {
        id: uuid_col(row, 0)?,
        requester_id: uuid_col(row, 1)?,
        addressee_id: uuid_col(row, 2)?,
        status: enum_col(row, 3)?,
        created_at: ts_col(row, 4)?,
        updated_at: ts_col(row, 5)?,
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
            display_name: format!("rider {user_id}"),
            bio: None,
            city: None,
            latitude: None,
            longitude: None,
            avatar_url: None,
            skill_level: SkillLevel::Beginner,
            bike_type: BikeType::Road,
        })
        .unwrap()
        .id
    }

    fn friendship_rows(db: &Database) -> i64 {
        db.conn()
            .query_row("SELECT COUNT(*) FROM friendships", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn accept_creates_exactly_two_rows_and_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let a = profile(&db, "a");
        let b = profile(&db, "b");

        let request = db.create_friend_request(a, b).unwrap();
        assert_eq!(request.status, FriendRequestStatus::Pending);

        assert!(db
            .resolve_friend_request(request.id, FriendRequestStatus::Accepted)
            .unwrap());
        let now = Utc::now();
        db.insert_friendship_pair(a, b, now).unwrap();
        assert_eq!(friendship_rows(&db), 2);
        assert!(db.are_friends(a, b).unwrap());
        assert!(db.are_friends(b, a).unwrap());

        // Retried accept: status guard refuses, the pair insert no-ops.
        assert!(!db
            .resolve_friend_request(request.id, FriendRequestStatus::Accepted)
            .unwrap());
        db.insert_friendship_pair(a, b, now).unwrap();
        assert_eq!(friendship_rows(&db), 2);
    }

    #[test]
    fn self_request_violates_check_constraint() {
        let db = Database::open_in_memory().unwrap();
        let a = profile(&db, "a");
        assert!(matches!(
            db.create_friend_request(a, a),
            Err(StoreError::Sqlite(_))
        ));
    }

    #[test]
    fn duplicate_pending_request_violates_unique_constraint() {
        let db = Database::open_in_memory().unwrap();
        let a = profile(&db, "a");
        let b = profile(&db, "b");

        db.create_friend_request(a, b).unwrap();
        assert!(matches!(
            db.create_friend_request(a, b),
            Err(StoreError::Sqlite(_))
        ));
    }

    #[test]
    fn pending_request_is_visible_in_both_directions() {
        let db = Database::open_in_memory().unwrap();
        let a = profile(&db, "a");
        let b = profile(&db, "b");

        let request = db.create_friend_request(a, b).unwrap();

        assert_eq!(
            db.pending_request_between(a, b).unwrap().map(|r| r.id),
            Some(request.id)
        );
        assert_eq!(
            db.pending_request_between(b, a).unwrap().map(|r| r.id),
            Some(request.id)
        );

        assert_eq!(db.incoming_requests(b).unwrap().len(), 1);
        assert_eq!(db.outgoing_requests(a).unwrap().len(), 1);
        assert!(db.incoming_requests(a).unwrap().is_empty());
    }

    #[test]
    fn rejected_request_no_longer_blocks() {
        let db = Database::open_in_memory().unwrap();
        let a = profile(&db, "a");
        let b = profile(&db, "b");

        let request = db.create_friend_request(a, b).unwrap();
        db.resolve_friend_request(request.id, FriendRequestStatus::Rejected)
            .unwrap();

        assert!(db.pending_request_between(a, b).unwrap().is_none());
        // A fresh request is now allowed again.
        db.create_friend_request(a, b).unwrap();
    }

    #[test]
    fn unfriending_removes_both_directions() {
        let db = Database::open_in_memory().unwrap();
        let a = profile(&db, "a");
        let b = profile(&db, "b");

        db.insert_friendship_pair(a, b, Utc::now()).unwrap();
        assert_eq!(db.list_friends(a).unwrap().len(), 1);
        assert_eq!(db.friend_ids(b).unwrap(), vec![a]);

        assert!(db.delete_friendship(b, a).unwrap());
        assert_eq!(friendship_rows(&db), 0);
        assert!(!db.delete_friendship(a, b).unwrap());
    }
}
