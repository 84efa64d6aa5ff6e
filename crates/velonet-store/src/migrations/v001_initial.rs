//! v001 -- Initial schema creation.
//!
//! Creates the full relational model: profiles, the friendship graph, direct
//! and group messaging, posts, notifications, and push subscriptions.
//! Invariants (uniqueness, enum membership, self-reference prevention,
//! cascade deletes) are declared here rather than in application code.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Profiles
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS profiles (
    id                    TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    user_id               TEXT NOT NULL UNIQUE,       -- external auth subject
    display_name          TEXT NOT NULL,
    bio                   TEXT,
    city                  TEXT,
    latitude              REAL,
    longitude             REAL,
    avatar_url            TEXT,
    skill_level           TEXT NOT NULL
        CHECK (skill_level IN ('beginner','intermediate','advanced','pro')),
    bike_type             TEXT NOT NULL
        CHECK (bike_type IN ('road','mountain','gravel','city','ebike')),
    interaction_score     REAL NOT NULL DEFAULT 0,
    last_login_at         TEXT,                       -- ISO-8601 / RFC-3339
    last_message_at       TEXT,
    last_post_at          TEXT,
    last_friend_accept_at TEXT,
    created_at            TEXT NOT NULL,
    updated_at            TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Friend requests
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS friend_requests (
    id           TEXT PRIMARY KEY NOT NULL,
    requester_id TEXT NOT NULL,
    addressee_id TEXT NOT NULL,
    status       TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending','accepted','rejected')),
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,

    CHECK (requester_id <> addressee_id),
    UNIQUE (requester_id, addressee_id, status),
    FOREIGN KEY (requester_id) REFERENCES profiles(id) ON DELETE CASCADE,
    FOREIGN KEY (addressee_id) REFERENCES profiles(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_friend_requests_addressee
    ON friend_requests(addressee_id, status);

-- ----------------------------------------------------------------
-- Friendships (directed pairs; both directions inserted on accept)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS friendships (
    user_id    TEXT NOT NULL,
    friend_id  TEXT NOT NULL,
    created_at TEXT NOT NULL,

    PRIMARY KEY (user_id, friend_id),
    CHECK (user_id <> friend_id),
    FOREIGN KEY (user_id) REFERENCES profiles(id) ON DELETE CASCADE,
    FOREIGN KEY (friend_id) REFERENCES profiles(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Direct messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id           TEXT PRIMARY KEY NOT NULL,
    sender_id    TEXT NOT NULL,
    recipient_id TEXT NOT NULL,
    body         TEXT NOT NULL,
    is_read      INTEGER NOT NULL DEFAULT 0,         -- boolean 0/1
    created_at   TEXT NOT NULL,

    FOREIGN KEY (sender_id) REFERENCES profiles(id) ON DELETE CASCADE,
    FOREIGN KEY (recipient_id) REFERENCES profiles(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation
    ON messages(sender_id, recipient_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_messages_recipient_unread
    ON messages(recipient_id, is_read);

-- ----------------------------------------------------------------
-- Groups
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS groups (
    id          TEXT PRIMARY KEY NOT NULL,
    name        TEXT NOT NULL,
    description TEXT,
    group_type  TEXT NOT NULL CHECK (group_type IN ('location','general')),
    city        TEXT,
    latitude    REAL,
    longitude   REAL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS group_members (
    group_id   TEXT NOT NULL,
    profile_id TEXT NOT NULL,
    role       TEXT NOT NULL DEFAULT 'member' CHECK (role IN ('admin','member')),
    joined_at  TEXT NOT NULL,

    PRIMARY KEY (group_id, profile_id),
    FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE,
    FOREIGN KEY (profile_id) REFERENCES profiles(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS group_images (
    id         TEXT PRIMARY KEY NOT NULL,
    group_id   TEXT NOT NULL,
    url        TEXT NOT NULL,
    position   INTEGER NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_group_images_group
    ON group_images(group_id, position);

-- ----------------------------------------------------------------
-- Group messages + read receipts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS group_messages (
    id         TEXT PRIMARY KEY NOT NULL,
    group_id   TEXT NOT NULL,
    sender_id  TEXT NOT NULL,
    body       TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE,
    FOREIGN KEY (sender_id) REFERENCES profiles(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_group_messages_group_ts
    ON group_messages(group_id, created_at DESC);

CREATE TABLE IF NOT EXISTS group_message_receipts (
    message_id TEXT NOT NULL,
    profile_id TEXT NOT NULL,
    read_at    TEXT NOT NULL,

    PRIMARY KEY (message_id, profile_id),
    FOREIGN KEY (message_id) REFERENCES group_messages(id) ON DELETE CASCADE,
    FOREIGN KEY (profile_id) REFERENCES profiles(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Posts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS posts (
    id         TEXT PRIMARY KEY NOT NULL,
    author_id  TEXT NOT NULL,
    body       TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (author_id) REFERENCES profiles(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_posts_author_ts
    ON posts(author_id, created_at DESC);

CREATE TABLE IF NOT EXISTS post_images (
    id       TEXT PRIMARY KEY NOT NULL,
    post_id  TEXT NOT NULL,
    url      TEXT NOT NULL,
    position INTEGER NOT NULL,

    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_post_images_post
    ON post_images(post_id, position);

CREATE TABLE IF NOT EXISTS post_replies (
    id         TEXT PRIMARY KEY NOT NULL,
    post_id    TEXT NOT NULL,
    author_id  TEXT NOT NULL,
    body       TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
    FOREIGN KEY (author_id) REFERENCES profiles(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_post_replies_post
    ON post_replies(post_id, created_at ASC);

CREATE TABLE IF NOT EXISTS post_views (
    profile_id       TEXT NOT NULL,
    post_id          TEXT NOT NULL,
    seen_reply_count INTEGER NOT NULL DEFAULT 0,
    viewed_at        TEXT NOT NULL,

    PRIMARY KEY (profile_id, post_id),
    FOREIGN KEY (profile_id) REFERENCES profiles(id) ON DELETE CASCADE,
    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Notifications
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS notifications (
    id           TEXT PRIMARY KEY NOT NULL,
    recipient_id TEXT NOT NULL,
    kind         TEXT NOT NULL CHECK (kind IN (
        'friend_request','friend_accept','message',
        'group_message','post','post_reply')),
    title        TEXT NOT NULL,
    body         TEXT NOT NULL,
    actor_id     TEXT,
    related_id   TEXT,
    related_kind TEXT,
    action_url   TEXT,
    is_read      INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL,

    FOREIGN KEY (recipient_id) REFERENCES profiles(id) ON DELETE CASCADE,
    FOREIGN KEY (actor_id) REFERENCES profiles(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_notifications_recipient
    ON notifications(recipient_id, is_read, created_at DESC);

-- ----------------------------------------------------------------
-- Push subscriptions
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS push_subscriptions (
    id         TEXT PRIMARY KEY NOT NULL,
    profile_id TEXT NOT NULL,
    endpoint   TEXT NOT NULL UNIQUE,
    p256dh     TEXT NOT NULL,
    auth       TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (profile_id) REFERENCES profiles(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_push_subscriptions_profile
    ON push_subscriptions(profile_id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
