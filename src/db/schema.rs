//! Database schema and migrations.
//!
//! Migrations are applied in order; the `schema_version` table records
//! which ones have already run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: conversations (mentorship rooms) written by the lifecycle flow
    r#"
CREATE TABLE conversations (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    participant_a   INTEGER NOT NULL,               -- requester
    participant_b   INTEGER NOT NULL,               -- mentor
    topic           TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'active', -- 'active' or 'closed'
    created_at      TEXT NOT NULL,
    closed_at       TEXT,
    CHECK (participant_a <> participant_b)
);

CREATE INDEX idx_conversations_participant_a ON conversations(participant_a);
CREATE INDEX idx_conversations_participant_b ON conversations(participant_b);
"#,
    // v2: append-only message log
    r#"
CREATE TABLE messages (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id INTEGER NOT NULL REFERENCES conversations(id),
    sender_id       INTEGER NOT NULL,
    sender_role     TEXT NOT NULL,                  -- 'requester' or 'mentor'
    body            TEXT NOT NULL,
    created_at      TEXT NOT NULL                   -- RFC 3339, microseconds, UTC
);

CREATE INDEX idx_messages_conversation_order ON messages(conversation_id, created_at, id);
"#,
];
