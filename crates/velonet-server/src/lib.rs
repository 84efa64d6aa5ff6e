//! # velonet-server
//!
//! HTTP and realtime backend for the Velonet social network:
//! - **REST API** (axum) for profiles, the friendship graph, messaging,
//!   groups, posts, notifications, and push subscriptions
//! - **Realtime hub**: one WebSocket per client for presence, typing
//!   indicators, and live notification/message delivery
//! - **Notification fan-out**: persist a row, then best-effort delivery over
//!   the socket and Web Push, pruning dead subscriptions
//! - **Admin API** guarded by a bearer token
//! - **Per-IP rate limiting** to protect against abuse

pub mod api;
pub mod config;
pub mod error;
pub mod notify;
pub mod push;
pub mod rate_limit;
pub mod realtime;
pub mod state;
