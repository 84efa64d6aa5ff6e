//! Database migration runner.
//!
//! The schema version lives in SQLite's `user_version` pragma.  Every
//! [`crate::Database`] open walks the table below and applies whatever is
//! newer than the stored version, bumping the pragma after each step.

pub mod v001_initial;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

type Migration = fn(&Connection) -> std::result::Result<(), rusqlite::Error>;

/// All schema migrations, oldest first.  Append here when the schema changes;
/// versions are 1-based and must stay contiguous.
const MIGRATIONS: &[(u32, &str, Migration)] = &[(1, "v001_initial", v001_initial::up)];

/// Apply every migration newer than the database's `user_version`.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    for (version, name, up) in MIGRATIONS {
        if current >= *version {
            continue;
        }
        tracing::info!(migration = name, "applying schema migration");
        up(conn).map_err(|e| StoreError::Migration(format!("{name}: {e}")))?;
        conn.pragma_update(None, "user_version", *version)?;
    }

    Ok(())
}
