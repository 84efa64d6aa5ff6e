//! Realtime wire protocol.
//!
//! A client holds one WebSocket connection and exchanges JSON-encoded events
//! with the server.  Client frames are [`ClientEvent`]s, server frames are
//! [`ServerEvent`]s; both are externally tagged with a `type` field so the
//! browser can switch on `event.type`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{NotificationKind, PresenceStatus};

/// Events a connected client may send.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Must be the first frame on a fresh connection; binds the socket to a
    /// profile id.
    Register { user_id: Uuid },

    /// Keep-alive; refreshes the server-side `last_seen` timestamp.
    Heartbeat,

    /// The user changed their presence (e.g. marked themselves away).
    StatusChange { status: PresenceStatus },

    /// The user started typing in a direct conversation with `to`.
    TypingStart { to: Uuid },

    /// The user stopped typing.
    TypingStop { to: Uuid },
}

/// Events the server pushes to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A notification row was just created for this user.
    NewNotification(NotificationEvent),

    /// A direct or group message addressed to this user arrived.
    NewMessage(MessageEvent),

    /// A friend's presence changed.
    UserStatusChange { user_id: Uuid, status: PresenceStatus },

    /// A peer started typing in a conversation with this user.
    TypingStart { from: Uuid },

    /// A peer stopped typing.
    TypingStop { from: Uuid },
}

/// Notification payload as delivered over the realtime channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Message payload as delivered over the realtime channel.  Exactly one of
/// `recipient_id` (direct) or `group_id` (group) is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    pub id: Uuid,
    pub sender_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Uuid>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_register_wire_format() {
        let id = Uuid::new_v4();
        let json = format!(r#"{{"type":"register","user_id":"{id}"}}"#);
        let event: ClientEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, ClientEvent::Register { user_id: id });
    }

    #[test]
    fn heartbeat_has_no_payload() {
        let event: ClientEvent = serde_json::from_str(r#"{"type":"heartbeat"}"#).unwrap();
        assert_eq!(event, ClientEvent::Heartbeat);
    }

    #[test]
    fn status_change_event_tags() {
        let event = ServerEvent::UserStatusChange {
            user_id: Uuid::nil(),
            status: PresenceStatus::Away,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"user_status_change""#));
        assert!(json.contains(r#""status":"away""#));
    }

    #[test]
    fn notification_event_round_trip() {
        let event = ServerEvent::NewNotification(NotificationEvent {
            id: Uuid::new_v4(),
            recipient_id: Uuid::new_v4(),
            kind: NotificationKind::Message,
            title: "New message".into(),
            body: "Ada sent you a message".into(),
            actor_id: Some(Uuid::new_v4()),
            related_id: None,
            related_kind: None,
            action_url: Some("/chat".into()),
            created_at: Utc::now(),
        });
        let json = serde_json::to_string(&event).unwrap();
        let back: ServerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
