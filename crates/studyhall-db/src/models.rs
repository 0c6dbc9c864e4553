/// Database row types — these map directly to SQLite rows.
/// Distinct from studyhall-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub bio: String,
    pub avatar_url: Option<String>,
    pub created_at: String,
}

pub struct GroupRow {
    pub id: String,
    pub title: String,
    pub subject: String,
    pub description: String,
    pub date_string: String,
    pub scheduled_at: String,
    pub created_at: String,
    pub created_by: String,
}

pub struct MessageRow {
    pub id: String,
    pub group_id: String,
    pub sender_id: String,
    pub sender_email: String,
    pub body: String,
    pub sent_at: String,
}
