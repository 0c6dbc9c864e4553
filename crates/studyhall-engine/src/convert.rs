use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use studyhall_db::models::{GroupRow, MessageRow};
use studyhall_db::{format_ts, parse_ts};
use studyhall_types::models::{ChatMessage, Group};

pub(crate) fn group_to_row(group: &Group) -> GroupRow {
    GroupRow {
        id: group.id.to_string(),
        title: group.title.clone(),
        subject: group.subject.clone(),
        description: group.description.clone(),
        date_string: group.date_string.clone(),
        // a valid group always has a scheduled instant; an empty string here
        // would never satisfy the NOT NULL insert anyway
        scheduled_at: group.scheduled_at.map(format_ts).unwrap_or_default(),
        created_at: format_ts(group.created_at),
        created_by: group.created_by.clone(),
    }
}

/// Row → model with warn-and-fallback parsing. A corrupt `scheduled_at`
/// becomes `None`, which the expiry predicate treats as expired — so bad
/// rows fall out of listings instead of breaking them.
pub(crate) fn group_from_row(row: GroupRow) -> Group {
    let scheduled_at = parse_ts(&row.scheduled_at);
    if scheduled_at.is_none() {
        warn!(
            "Corrupt scheduled_at '{}' on group '{}', treating as expired",
            row.scheduled_at, row.id
        );
    }

    Group {
        id: parse_id(&row.id, "group id"),
        title: row.title,
        subject: row.subject,
        description: row.description,
        date_string: row.date_string,
        scheduled_at,
        created_at: parse_ts_or_epoch(&row.created_at, &row.id, "created_at"),
        created_by: row.created_by,
    }
}

pub(crate) fn message_from_row(row: MessageRow) -> ChatMessage {
    ChatMessage {
        id: parse_id(&row.id, "message id"),
        group_id: parse_id(&row.group_id, "group_id"),
        sender_id: parse_id(&row.sender_id, "sender_id"),
        sender_email: row.sender_email,
        body: row.body,
        sent_at: parse_ts_or_epoch(&row.sent_at, &row.id, "sent_at"),
    }
}

fn parse_id(s: &str, what: &str) -> Uuid {
    s.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, s, e);
        Uuid::default()
    })
}

fn parse_ts_or_epoch(s: &str, id: &str, what: &str) -> DateTime<Utc> {
    parse_ts(s).unwrap_or_else(|| {
        warn!("Corrupt {} '{}' on record '{}'", what, s, id);
        DateTime::default()
    })
}
