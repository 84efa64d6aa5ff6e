use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SharedError;

/// Declares `as_str`, `FromStr`, and `Display` for a closed string enum.
///
/// The string form is what gets persisted in SQLite CHECK-constrained
/// columns and what appears on the JSON wire.
macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            /// All variants, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl FromStr for $name {
            type Err = SharedError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(SharedError::invalid($kind, other)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Profile enums
// ---------------------------------------------------------------------------

/// Rider experience level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
    Pro,
}

string_enum!(SkillLevel, "skill level", {
    Beginner => "beginner",
    Intermediate => "intermediate",
    Advanced => "advanced",
    Pro => "pro",
});

/// Primary bike discipline of a rider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BikeType {
    Road,
    Mountain,
    Gravel,
    City,
    Ebike,
}

string_enum!(BikeType, "bike type", {
    Road => "road",
    Mountain => "mountain",
    Gravel => "gravel",
    City => "city",
    Ebike => "ebike",
});

// ---------------------------------------------------------------------------
// Friend requests
// ---------------------------------------------------------------------------

/// Lifecycle of a friend request.  A request is mutated at most once:
/// `pending -> accepted` or `pending -> rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
    Rejected,
}

string_enum!(FriendRequestStatus, "friend request status", {
    Pending => "pending",
    Accepted => "accepted",
    Rejected => "rejected",
});

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

/// Whether a group is tied to a location (city + coordinates required) or a
/// general-interest group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupType {
    Location,
    General,
}

string_enum!(GroupType, "group type", {
    Location => "location",
    General => "general",
});

/// Role of a group member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRole {
    Admin,
    Member,
}

string_enum!(GroupRole, "group role", {
    Admin => "admin",
    Member => "member",
});

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Closed set of notification kinds the fan-out pipeline produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    FriendRequest,
    FriendAccept,
    Message,
    GroupMessage,
    Post,
    PostReply,
}

string_enum!(NotificationKind, "notification kind", {
    FriendRequest => "friend_request",
    FriendAccept => "friend_accept",
    Message => "message",
    GroupMessage => "group_message",
    Post => "post",
    PostReply => "post_reply",
});

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

/// Presence of a user as tracked by the realtime hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Online,
    Away,
    Offline,
}

string_enum!(PresenceStatus, "presence status", {
    Online => "online",
    Away => "away",
    Offline => "offline",
});

// ---------------------------------------------------------------------------
// Interaction signals
// ---------------------------------------------------------------------------

/// The four activity signals that feed the interaction score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Login,
    Message,
    Post,
    FriendAccept,
}

string_enum!(InteractionKind, "interaction kind", {
    Login => "login",
    Message => "message",
    Post => "post",
    FriendAccept => "friend_accept",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_round_trips() {
        for level in SkillLevel::ALL {
            assert_eq!(*level, level.as_str().parse().unwrap());
        }
        for kind in NotificationKind::ALL {
            assert_eq!(*kind, kind.as_str().parse().unwrap());
        }
        for status in FriendRequestStatus::ALL {
            assert_eq!(*status, status.as_str().parse().unwrap());
        }
    }

    #[test]
    fn unknown_value_is_rejected() {
        let err = "unicycle".parse::<BikeType>().unwrap_err();
        assert_eq!(err, SharedError::invalid("bike type", "unicycle"));
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&NotificationKind::FriendRequest).unwrap();
        assert_eq!(json, "\"friend_request\"");
    }
}
