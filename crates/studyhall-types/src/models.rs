use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A scheduled study group.
///
/// `scheduled_at` is the authoritative instant; `date_string` is the
/// human-readable form the creator typed and is kept redundantly. A `None`
/// scheduled_at means the stored value was missing or unparseable — such a
/// group is treated as expired everywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub title: String,
    pub subject: String,
    pub description: String,
    pub date_string: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Creator's email handle.
    pub created_by: String,
}

/// A chat message inside a group. Never edited or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub group_id: Uuid,
    pub sender_id: Uuid,
    pub sender_email: String,
    pub body: String,
    /// Assigned by the store when the row is inserted.
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub bio: String,
    pub avatar_url: Option<String>,
}
