//! CRUD operations for [`PushSubscription`] records.
//!
//! A subscription is keyed by its endpoint URL.  Browsers rotate endpoints
//! silently, so subscribing again with a known endpoint re-binds it to the
//! (possibly different) profile and fresh keys instead of erroring.

use chrono::Utc;
use rusqlite::{params, Row};
use uuid::Uuid;

use crate::convert::{ts_col, uuid_col};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::PushSubscription;

const SUBSCRIPTION_COLUMNS: &str = "id, profile_id, endpoint, p256dh, auth, created_at";

impl Database {
    /// Insert or refresh a subscription for this endpoint.
    pub fn upsert_push_subscription(
        &self,
        profile: Uuid,
        endpoint: &str,
        p256dh: &str,
        auth: &str,
    ) -> Result<PushSubscription> {
        self.conn().execute(
            "INSERT INTO push_subscriptions (id, profile_id, endpoint, p256dh, auth, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (endpoint) DO UPDATE SET
                 profile_id = excluded.profile_id,
                 p256dh = excluded.p256dh,
                 auth = excluded.auth",
            params![
                Uuid::new_v4().to_string(),
                profile.to_string(),
                endpoint,
                p256dh,
                auth,
                Utc::now().to_rfc3339(),
            ],
        )?;

        self.conn()
            .query_row(
                &format!("SELECT {SUBSCRIPTION_COLUMNS} FROM push_subscriptions WHERE endpoint = ?1"),
                params![endpoint],
                row_to_subscription,
            )
            .map_err(StoreError::from_query)
    }

    /// All subscriptions registered for a profile (one per device/browser).
    pub fn push_subscriptions_for(&self, profile: Uuid) -> Result<Vec<PushSubscription>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM push_subscriptions
             WHERE profile_id = ?1
             ORDER BY created_at ASC"
        ))?;

        let rows = stmt.query_map(params![profile.to_string()], row_to_subscription)?;

        let mut subscriptions = Vec::new();
        for row in rows {
            subscriptions.push(row?);
        }
        Ok(subscriptions)
    }

    /// Remove a subscription by endpoint; used both by explicit unsubscribe
    /// and by the push pipeline when the service reports the endpoint gone.
    pub fn delete_push_subscription(&self, endpoint: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM push_subscriptions WHERE endpoint = ?1",
            params![endpoint],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_subscription(row: &Row<'_>) -> rusqlite::Result<PushSubscription> {
    Ok(PushSubscription {
        id: uuid_col(row, 0)?,
        profile_id: uuid_col(row, 1)?,
        endpoint: row.get(2)?,
        p256dh: row.get(3)?,
        auth: row.get(4)?,
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
            bike_type: BikeType::Road,
        })
        .unwrap()
        .id
    }

    #[test]
    fn re_subscribing_refreshes_instead_of_erroring() {
        let db = Database::open_in_memory().unwrap();
        let user = profile(&db, "u");

        let first = db
            .upsert_push_subscription(user, "https://push/ep1", "key-a", "auth-a")
            .unwrap();
        let second = db
            .upsert_push_subscription(user, "https://push/ep1", "key-b", "auth-b")
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.p256dh, "key-b");
        assert_eq!(db.push_subscriptions_for(user).unwrap().len(), 1);
    }

    #[test]
    fn one_user_many_devices() {
        let db = Database::open_in_memory().unwrap();
        let user = profile(&db, "u");

        db.upsert_push_subscription(user, "https://push/laptop", "k1", "a1")
            .unwrap();
        db.upsert_push_subscription(user, "https://push/phone", "k2", "a2")
            .unwrap();

        let subs = db.push_subscriptions_for(user).unwrap();
        assert_eq!(subs.len(), 2);

        assert!(db.delete_push_subscription("https://push/laptop").unwrap());
        assert_eq!(db.push_subscriptions_for(user).unwrap().len(), 1);
        assert!(!db.delete_push_subscription("https://push/laptop").unwrap());
    }
}
