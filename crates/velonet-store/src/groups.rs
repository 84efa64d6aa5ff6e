//! CRUD operations for [`Group`] records, their members, and their images.

use chrono::Utc;
use rusqlite::{params, Row};
use uuid::Uuid;

use velonet_shared::GroupRole;

use crate::convert::{enum_col, ts_col, uuid_col};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Group, GroupImage, GroupMember, GroupUpdate, NewGroup};

const GROUP_COLUMNS: &str =
    "id, name, description, group_type, city, latitude, longitude, created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------

    /// Insert a group and enroll the creator as its first admin.
    pub fn create_group(&self, new: &NewGroup, creator: Uuid) -> Result<Group> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        self.conn().execute(
            "INSERT INTO groups (id, name, description, group_type, city, latitude, longitude,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                id.to_string(),
                new.name,
                new.description,
                new.group_type.as_str(),
                new.city,
                new.latitude,
                new.longitude,
                now.to_rfc3339(),
            ],
        )?;

        self.conn().execute(
            "INSERT INTO group_members (group_id, profile_id, role, joined_at)
             VALUES (?1, ?2, 'admin', ?3)",
            params![id.to_string(), creator.to_string(), now.to_rfc3339()],
        )?;

        self.get_group(id)
    }

    pub fn get_group(&self, id: Uuid) -> Result<Group> {
        self.conn()
            .query_row(
                &format!("SELECT {GROUP_COLUMNS} FROM groups WHERE id = ?1"),
                params![id.to_string()],
                row_to_group,
            )
            .map_err(StoreError::from_query)
    }

    /// List groups, newest first.
    pub fn list_groups(&self, limit: u32, offset: u32) -> Result<Vec<Group>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups
             ORDER BY created_at DESC
             LIMIT ?1 OFFSET ?2"
        ))?;

        let rows = stmt.query_map(params![limit, offset], row_to_group)?;

        let mut groups = Vec::new();
        for row in rows {
            groups.push(row?);
        }
        Ok(groups)
    }

    pub fn update_group(&self, id: Uuid, update: &GroupUpdate) -> Result<Group> {
        let affected = self.conn().execute(
            "UPDATE groups SET
                 name        = COALESCE(?1, name),
                 description = COALESCE(?2, description),
                 city        = COALESCE(?3, city),
                 latitude    = COALESCE(?4, latitude),
                 longitude   = COALESCE(?5, longitude),
                 updated_at  = ?6
             WHERE id = ?7",
            params![
                update.name,
                update.description,
                update.city,
                update.latitude,
                update.longitude,
                Utc::now().to_rfc3339(),
                id.to_string(),
            ],
        )?;

        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_group(id)
    }

    /// Delete a group; members, images, messages, and receipts cascade.
    pub fn delete_group(&self, id: Uuid) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM groups WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }

    pub fn count_groups(&self) -> Result<i64> {
        let count = self
            .conn()
            .query_row("SELECT COUNT(*) FROM groups", [], |row| row.get(0))?;
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Members
    // ------------------------------------------------------------------

    /// Enroll a profile.  The `(group_id, profile_id)` primary key blocks
    /// double joins; callers pre-check with [`Database::member_role`].
    pub fn add_group_member(
        &self,
        group: Uuid,
        profile: Uuid,
        role: GroupRole,
    ) -> Result<GroupMember> {
        let now = Utc::now();

        self.conn().execute(
            "INSERT INTO group_members (group_id, profile_id, role, joined_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                group.to_string(),
                profile.to_string(),
                role.as_str(),
                now.to_rfc3339(),
            ],
        )?;

        Ok(GroupMember {
            group_id: group,
            profile_id: profile,
            role,
            joined_at: now,
        })
    }

    pub fn remove_group_member(&self, group: Uuid, profile: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM group_members WHERE group_id = ?1 AND profile_id = ?2",
            params![group.to_string(), profile.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// The member's role, or `None` when not a member.
    pub fn member_role(&self, group: Uuid, profile: Uuid) -> Result<Option<GroupRole>> {
        let mut stmt = self.conn().prepare(
            "SELECT role FROM group_members WHERE group_id = ?1 AND profile_id = ?2",
        )?;

        let mut rows = stmt.query_map(
            params![group.to_string(), profile.to_string()],
            |row| enum_col::<GroupRole>(row, 0),
        )?;

        rows.next().transpose().map_err(StoreError::Sqlite)
    }

    pub fn list_group_members(&self, group: Uuid) -> Result<Vec<GroupMember>> {
        let mut stmt = self.conn().prepare(
            "SELECT group_id, profile_id, role, joined_at
             FROM group_members WHERE group_id = ?1
             ORDER BY joined_at ASC",
        )?;

        let rows = stmt.query_map(params![group.to_string()], |row| {
            Ok(GroupMember {
                group_id: uuid_col(row, 0)?,
                profile_id: uuid_col(row, 1)?,
                role: enum_col(row, 2)?,
                joined_at: ts_col(row, 3)?,
            })
        })?;

        let mut members = Vec::new();
        for row in rows {
            members.push(row?);
        }
        Ok(members)
    }

    /// Profile ids of every member; used by the group-message fan-out.
    pub fn group_member_ids(&self, group: Uuid) -> Result<Vec<Uuid>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT profile_id FROM group_members WHERE group_id = ?1")?;

        let rows = stmt.query_map(params![group.to_string()], |row| uuid_col(row, 0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    pub fn count_group_admins(&self, group: Uuid) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM group_members WHERE group_id = ?1 AND role = 'admin'",
            params![group.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Images
    // ------------------------------------------------------------------

    /// Append an image at the next free position.
    pub fn add_group_image(&self, group: Uuid, url: &str) -> Result<GroupImage> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        self.conn().execute(
            "INSERT INTO group_images (id, group_id, url, position, created_at)
             SELECT ?1, ?2, ?3, COALESCE(MAX(position) + 1, 0), ?4
             FROM group_images WHERE group_id = ?2",
            params![
                id.to_string(),
                group.to_string(),
                url,
                now.to_rfc3339(),
            ],
        )?;

        self.conn()
            .query_row(
                "SELECT id, group_id, url, position, created_at
                 FROM group_images WHERE id = ?1",
                params![id.to_string()],
                row_to_group_image,
            )
            .map_err(StoreError::from_query)
    }

    pub fn remove_group_image(&self, image_id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM group_images WHERE id = ?1",
            params![image_id.to_string()],
        )?;
        Ok(affected > 0)
    }

    pub fn list_group_images(&self, group: Uuid) -> Result<Vec<GroupImage>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, group_id, url, position, created_at
             FROM group_images WHERE group_id = ?1
             ORDER BY position ASC",
        )?;

        let rows = stmt.query_map(params![group.to_string()], row_to_group_image)?;

        let mut images = Vec::new();
        for row in rows {
            images.push(row?);
        }
        Ok(images)
    }
}

fn row_to_group(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: uuid_col(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        group_type: enum_col(row, 3)?,
        city: row.get(4)?,
        latitude: row.get(5)?,
        longitude: row.get(6)?,
        created_at: ts_col(row, 7)?,
        updated_at: ts_col(row, 8)?,
    })
}

fn row_to_group_image(row: &Row<'_>) -> rusqlite::Result<GroupImage> {
    Ok(GroupImage {
        id: uuid_col(row, 0)?,
        group_id: uuid_col(row, 1)?,
        url: row.get(2)?,
        position: row.get(3)?,
        created_at: ts_col(row, 4)?,
    })
}
