use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        // Timestamps are unix microseconds (UTC).
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL UNIQUE,
                photo       TEXT,
                created_at  INTEGER NOT NULL
            );

            CREATE TABLE sessions (
                token       TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL UNIQUE REFERENCES users(id),
                created_at  INTEGER NOT NULL
            );

            CREATE TABLE conversations (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                is_group        INTEGER NOT NULL,
                name            TEXT,
                photo           TEXT,
                direct_key      TEXT UNIQUE,
                last_activity   INTEGER NOT NULL,
                created_at      INTEGER NOT NULL,
                CHECK ((is_group = 1 AND name IS NOT NULL AND direct_key IS NULL)
                    OR (is_group = 0 AND direct_key IS NOT NULL))
            );

            CREATE UNIQUE INDEX idx_conversations_group_name
                ON conversations(name) WHERE is_group = 1;

            CREATE TABLE members (
                conversation_id INTEGER NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                user_id         TEXT NOT NULL REFERENCES users(id),
                peer_name       TEXT,
                joined_at       INTEGER NOT NULL,
                PRIMARY KEY (conversation_id, user_id)
            );

            CREATE INDEX idx_members_user ON members(user_id);

            CREATE TABLE messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                sender_id       TEXT NOT NULL REFERENCES users(id),
                content         TEXT NOT NULL,
                content_type    TEXT NOT NULL DEFAULT 'text',
                status          TEXT NOT NULL DEFAULT 'sent',
                created_at      INTEGER NOT NULL
            );

            CREATE INDEX idx_messages_conversation
                ON messages(conversation_id, created_at, id);

            CREATE TABLE comments (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id      INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                author_id       TEXT NOT NULL REFERENCES users(id),
                content         TEXT NOT NULL,
                content_type    TEXT NOT NULL DEFAULT 'text',
                created_at      INTEGER NOT NULL
            );

            CREATE INDEX idx_comments_message ON comments(message_id, created_at, id);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
