use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id            TEXT PRIMARY KEY,
            email         TEXT NOT NULL UNIQUE,
            password      TEXT NOT NULL,
            display_name  TEXT NOT NULL,
            bio           TEXT NOT NULL DEFAULT '',
            avatar_url    TEXT,
            created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE TABLE IF NOT EXISTS study_groups (
            id            TEXT PRIMARY KEY,
            title         TEXT NOT NULL,
            subject       TEXT NOT NULL,
            description   TEXT NOT NULL,
            date_string   TEXT NOT NULL,
            scheduled_at  TEXT NOT NULL,
            created_at    TEXT NOT NULL,
            created_by    TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_groups_scheduled
            ON study_groups(scheduled_at);
        CREATE INDEX IF NOT EXISTS idx_groups_created
            ON study_groups(created_at);

        -- Denormalized per-user membership copies. Deliberately NOT a
        -- foreign key onto study_groups: the ref outlives the group between
        -- sweeps, and the sweep reconciles eventually.
        CREATE TABLE IF NOT EXISTS joined_groups (
            user_id       TEXT NOT NULL REFERENCES users(id),
            group_id      TEXT NOT NULL,
            title         TEXT NOT NULL,
            subject       TEXT NOT NULL,
            description   TEXT NOT NULL,
            date_string   TEXT NOT NULL,
            scheduled_at  TEXT NOT NULL,
            created_at    TEXT NOT NULL,
            created_by    TEXT NOT NULL,
            joined_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            PRIMARY KEY (user_id, group_id)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id            TEXT PRIMARY KEY,
            group_id      TEXT NOT NULL REFERENCES study_groups(id) ON DELETE CASCADE,
            sender_id     TEXT NOT NULL REFERENCES users(id),
            sender_email  TEXT NOT NULL,
            body          TEXT NOT NULL,
            sent_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_group
            ON messages(group_id, sent_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
