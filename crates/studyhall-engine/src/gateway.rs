use std::sync::Arc;

use chrono::{DateTime, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;
use uuid::Uuid;

use studyhall_db::Database;
use studyhall_types::api::CreateGroupRequest;
use studyhall_types::models::{ChatMessage, Group, UserProfile};

use crate::convert;
use crate::expiry;
use crate::feed::{ChangeFeed, StoreChange};

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Rejected locally, before any write reached the store.
    #[error("{0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Validates and applies user-initiated writes. Every successful write
/// publishes a change notification; callers never wait on subscribers
/// observing the result.
#[derive(Clone)]
pub struct MutationGateway {
    db: Arc<Database>,
    feed: ChangeFeed,
}

impl MutationGateway {
    pub fn new(db: Arc<Database>, feed: ChangeFeed) -> Self {
        Self { db, feed }
    }

    /// Create a study group. All fields are required, the date must parse,
    /// and the target day must not be before today (same-day is fine).
    pub fn create_group(
        &self,
        creator_email: &str,
        req: &CreateGroupRequest,
    ) -> Result<Group, GatewayError> {
        if req.title.trim().is_empty()
            || req.subject.trim().is_empty()
            || req.description.trim().is_empty()
            || req.date.trim().is_empty()
        {
            return Err(GatewayError::Validation(
                "All fields are required.".into(),
            ));
        }

        let scheduled_at = parse_target_date(&req.date).ok_or_else(|| {
            GatewayError::Validation("Please enter a valid date.".into())
        })?;

        if expiry::is_expired(Some(scheduled_at)) {
            return Err(GatewayError::Validation(
                "The group date cannot be in the past.".into(),
            ));
        }

        let group = Group {
            id: Uuid::new_v4(),
            title: req.title.clone(),
            subject: req.subject.clone(),
            description: req.description.clone(),
            date_string: req.date.clone(),
            scheduled_at: Some(scheduled_at),
            created_at: Utc::now(),
            created_by: creator_email.to_string(),
        };

        self.db.insert_group(&convert::group_to_row(&group))?;
        self.feed.publish(StoreChange::Groups);

        Ok(group)
    }

    /// Join a group: write (or overwrite) the user's denormalized copy.
    /// Joining an already-joined group is a harmless overwrite.
    pub fn join_group(&self, user_id: Uuid, group_id: Uuid) -> Result<(), GatewayError> {
        let row = self
            .db
            .get_group(&group_id.to_string())?
            .ok_or(GatewayError::NotFound)?;

        self.db.upsert_joined_group(&user_id.to_string(), &row)?;
        self.feed.publish(StoreChange::JoinedGroups { user_id });

        Ok(())
    }

    /// Post a message. Blank text (after trimming) is a silent no-op,
    /// mirrored to the caller as `None`. The send timestamp is assigned by
    /// the store, not the caller.
    pub fn send_message(
        &self,
        group_id: Uuid,
        sender_id: Uuid,
        sender_email: &str,
        text: &str,
    ) -> Result<Option<ChatMessage>, GatewayError> {
        let body = text.trim();
        if body.is_empty() {
            return Ok(None);
        }

        if self.db.get_group(&group_id.to_string())?.is_none() {
            return Err(GatewayError::NotFound);
        }

        let id = Uuid::new_v4();
        let sent_at = self.db.insert_message(
            &id.to_string(),
            &group_id.to_string(),
            &sender_id.to_string(),
            sender_email,
            body,
        )?;

        self.feed.publish(StoreChange::Messages { group_id });

        Ok(Some(ChatMessage {
            id,
            group_id,
            sender_id,
            sender_email: sender_email.to_string(),
            body: body.to_string(),
            sent_at: studyhall_db::parse_ts(&sent_at).unwrap_or_else(Utc::now),
        }))
    }

    pub fn get_profile(&self, user_id: Uuid) -> Result<UserProfile, GatewayError> {
        let row = self
            .db
            .get_user_by_id(&user_id.to_string())?
            .ok_or(GatewayError::NotFound)?;

        // Older rows may predate display names; fall back to the email
        // local part the way the signup flow does.
        let display_name = if row.display_name.is_empty() {
            row.email.split('@').next().unwrap_or_default().to_string()
        } else {
            row.display_name
        };

        Ok(UserProfile {
            id: user_id,
            email: row.email,
            display_name,
            bio: row.bio,
            avatar_url: row.avatar_url,
        })
    }

    pub fn update_profile(
        &self,
        user_id: Uuid,
        display_name: &str,
        bio: &str,
        avatar_url: Option<&str>,
    ) -> Result<UserProfile, GatewayError> {
        if display_name.trim().is_empty() {
            return Err(GatewayError::Validation(
                "Display name is required.".into(),
            ));
        }

        let n = self
            .db
            .update_profile(&user_id.to_string(), display_name, bio, avatar_url)?;
        if n == 0 {
            return Err(GatewayError::NotFound);
        }

        self.get_profile(user_id)
    }
}

/// Accepts what a person would type into a date field: RFC 3339, or
/// "YYYY-MM-DD HH:MM", or a bare "YYYY-MM-DD" (read as local midnight).
fn parse_target_date(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M") {
        return local_to_utc(ndt);
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(expiry::start_of_day(date));
    }

    None
}

fn local_to_utc(ndt: NaiveDateTime) -> Option<DateTime<Utc>> {
    match Local.from_local_datetime(&ndt) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => Some(Utc.from_utc_datetime(&ndt)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn gateway() -> (MutationGateway, Arc<Database>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let gw = MutationGateway::new(db.clone(), ChangeFeed::new());
        (gw, db)
    }

    fn request(date: &str) -> CreateGroupRequest {
        CreateGroupRequest {
            title: "Algorithms Study".into(),
            subject: "CS".into(),
            description: "Midterm prep".into(),
            date: date.into(),
        }
    }

    #[test]
    fn create_rejects_empty_title_without_touching_store() {
        let (gw, db) = gateway();
        let mut req = request("2099-01-01");
        req.title = "  ".into();

        let err = gw.create_group("a@example.com", &req).unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
        assert!(db.list_groups().unwrap().is_empty());
    }

    #[test]
    fn create_rejects_unparseable_date() {
        let (gw, db) = gateway();
        let err = gw
            .create_group("a@example.com", &request("next tuesday"))
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
        assert!(db.list_groups().unwrap().is_empty());
    }

    #[test]
    fn create_rejects_yesterday() {
        let (gw, db) = gateway();
        let yesterday = (Local::now().date_naive() - Duration::days(1))
            .format("%Y-%m-%d")
            .to_string();

        let err = gw
            .create_group("a@example.com", &request(&yesterday))
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
        assert!(db.list_groups().unwrap().is_empty());
    }

    #[test]
    fn create_accepts_today() {
        let (gw, db) = gateway();
        let today = Local::now().date_naive().format("%Y-%m-%d").to_string();

        let group = gw.create_group("a@example.com", &request(&today)).unwrap();
        assert_eq!(group.created_by, "a@example.com");
        assert!(group.scheduled_at.is_some());
        assert_eq!(db.list_groups().unwrap().len(), 1);
    }

    #[test]
    fn join_missing_group_is_not_found() {
        let (gw, _db) = gateway();
        let err = gw.join_group(Uuid::new_v4(), Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, GatewayError::NotFound));
    }

    #[test]
    fn blank_message_is_a_no_op() {
        let (gw, db) = gateway();
        let sent = gw
            .send_message(Uuid::new_v4(), Uuid::new_v4(), "a@example.com", "   \n")
            .unwrap();
        assert!(sent.is_none());
        // no-op short-circuits before the group-exists check
        assert!(db.list_groups().unwrap().is_empty());
    }

    #[test]
    fn parses_common_date_shapes() {
        assert!(parse_target_date("2099-06-01").is_some());
        assert!(parse_target_date("2099-06-01 18:30").is_some());
        assert!(parse_target_date("2099-06-01T18:30:00Z").is_some());
        assert!(parse_target_date("soonish").is_none());
    }
}
