//! # velonet-store
//!
//! Relational persistence for Velonet, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model.  Relational integrity (uniqueness, enum membership, cascade
//! deletes, self-reference prevention) is declared in the schema; helpers
//! surface constraint-relevant state (`are_friends`, `pending_request_between`)
//! so the API layer can turn it into 409s before inserting.

pub mod database;
pub mod friends;
pub mod group_messages;
pub mod groups;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod notifications;
pub mod posts;
pub mod profiles;
pub mod push_subscriptions;

mod convert;
mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
