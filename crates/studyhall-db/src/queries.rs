use crate::Database;
use crate::models::{GroupRow, MessageRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        password_hash: &str,
        display_name: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password, display_name) VALUES (?1, ?2, ?3, ?4)",
                (id, email, password_hash, display_name),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn update_profile(
        &self,
        id: &str,
        display_name: &str,
        bio: &str,
        avatar_url: Option<&str>,
    ) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE users SET display_name = ?2, bio = ?3, avatar_url = ?4 WHERE id = ?1",
                rusqlite::params![id, display_name, bio, avatar_url],
            )?;
            Ok(n)
        })
    }

    /// Every user id in the system. The sweep fans out over this per expired
    /// group — O(groups x users), a known scaling bottleneck kept as-is.
    pub fn list_user_ids(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM users")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    // -- Groups --

    pub fn insert_group(&self, group: &GroupRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO study_groups
                 (id, title, subject, description, date_string, scheduled_at, created_at, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    group.id,
                    group.title,
                    group.subject,
                    group.description,
                    group.date_string,
                    group.scheduled_at,
                    group.created_at,
                    group.created_by,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_group(&self, id: &str) -> Result<Option<GroupRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {GROUP_COLS} FROM study_groups WHERE id = ?1"
            ))?;
            stmt.query_row([id], group_from_row).optional()
        })
    }

    /// All groups, newest first.
    pub fn list_groups(&self) -> Result<Vec<GroupRow>> {
        self.with_conn(|conn| {
            query_group_rows(
                conn,
                &format!("SELECT {GROUP_COLS} FROM study_groups ORDER BY created_at DESC"),
                [],
            )
        })
    }

    pub fn list_groups_created_by(&self, email: &str) -> Result<Vec<GroupRow>> {
        self.with_conn(|conn| {
            query_group_rows(
                conn,
                &format!(
                    "SELECT {GROUP_COLS} FROM study_groups
                     WHERE created_by = ?1 ORDER BY created_at DESC"
                ),
                [email],
            )
        })
    }

    /// Groups whose scheduled instant is strictly before the cutoff
    /// (fixed-format UTC string, see `format_ts`).
    pub fn expired_group_ids(&self, cutoff: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id FROM study_groups WHERE scheduled_at < ?1")?;
            let ids = stmt
                .query_map([cutoff], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    pub fn delete_group(&self, id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM study_groups WHERE id = ?1", [id])?;
            Ok(n)
        })
    }

    // -- Joined groups --

    /// Write (or overwrite) a user's denormalized membership copy.
    /// Joining twice is a harmless overwrite.
    pub fn upsert_joined_group(&self, user_id: &str, group: &GroupRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO joined_groups
                 (user_id, group_id, title, subject, description, date_string,
                  scheduled_at, created_at, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    user_id,
                    group.id,
                    group.title,
                    group.subject,
                    group.description,
                    group.date_string,
                    group.scheduled_at,
                    group.created_at,
                    group.created_by,
                ],
            )?;
            Ok(())
        })
    }

    pub fn list_joined_groups(&self, user_id: &str) -> Result<Vec<GroupRow>> {
        self.with_conn(|conn| {
            query_group_rows(
                conn,
                "SELECT group_id, title, subject, description, date_string,
                        scheduled_at, created_at, created_by
                 FROM joined_groups WHERE user_id = ?1 ORDER BY created_at DESC",
                [user_id],
            )
        })
    }

    pub fn delete_joined_group(&self, user_id: &str, group_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "DELETE FROM joined_groups WHERE user_id = ?1 AND group_id = ?2",
                (user_id, group_id),
            )?;
            Ok(n)
        })
    }

    // -- Messages --

    /// Insert a message and return its store-assigned send timestamp.
    pub fn insert_message(
        &self,
        id: &str,
        group_id: &str,
        sender_id: &str,
        sender_email: &str,
        body: &str,
    ) -> Result<String> {
        self.with_conn_mut(|conn| {
            let sent_at: String = conn.query_row(
                "INSERT INTO messages (id, group_id, sender_id, sender_email, body)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 RETURNING sent_at",
                rusqlite::params![id, group_id, sender_id, sender_email, body],
                |row| row.get(0),
            )?;
            Ok(sent_at)
        })
    }

    /// Full transcript for a group, oldest first.
    pub fn list_messages(&self, group_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, group_id, sender_id, sender_email, body, sent_at
                 FROM messages WHERE group_id = ?1 ORDER BY sent_at ASC",
            )?;
            let rows = stmt
                .query_map([group_id], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        group_id: row.get(1)?,
                        sender_id: row.get(2)?,
                        sender_email: row.get(3)?,
                        body: row.get(4)?,
                        sent_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

const GROUP_COLS: &str =
    "id, title, subject, description, date_string, scheduled_at, created_at, created_by";

fn group_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<GroupRow, rusqlite::Error> {
    Ok(GroupRow {
        id: row.get(0)?,
        title: row.get(1)?,
        subject: row.get(2)?,
        description: row.get(3)?,
        date_string: row.get(4)?,
        scheduled_at: row.get(5)?,
        created_at: row.get(6)?,
        created_by: row.get(7)?,
    })
}

fn query_group_rows<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<GroupRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, group_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn query_user(conn: &Connection, col: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, email, password, display_name, bio, avatar_url, created_at
         FROM users WHERE {col} = ?1"
    ))?;

    stmt.query_row([value], |row| {
        Ok(UserRow {
            id: row.get(0)?,
            email: row.get(1)?,
            password: row.get(2)?,
            display_name: row.get(3)?,
            bio: row.get(4)?,
            avatar_url: row.get(5)?,
            created_at: row.get(6)?,
        })
    })
    .optional()
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
