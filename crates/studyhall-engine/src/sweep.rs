use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use studyhall_db::{Database, format_ts};

use crate::expiry;
use crate::feed::{ChangeFeed, StoreChange};

#[derive(Debug, Default, Clone, Copy)]
pub struct SweepOutcome {
    pub groups_deleted: usize,
    pub refs_deleted: usize,
}

/// Delete every group scheduled before the start of today, together with
/// each user's joined-groups copy of it.
///
/// Best-effort and retry-free: every per-group and per-ref deletion is
/// attempted independently, failures are logged and skipped. A ref missed
/// this cycle is re-derived and re-attempted next cycle, so the job is
/// idempotent and safe to run concurrently with ordinary reads and writes.
pub fn sweep_expired_groups(db: &Database, feed: &ChangeFeed) -> SweepOutcome {
    sweep_expired_groups_before(db, feed, expiry::start_of_today())
}

/// Cutoff-parameterized sweep; `cutoff` is normally local midnight.
pub fn sweep_expired_groups_before(
    db: &Database,
    feed: &ChangeFeed,
    cutoff: DateTime<Utc>,
) -> SweepOutcome {
    let mut outcome = SweepOutcome::default();

    let expired = match db.expired_group_ids(&format_ts(cutoff)) {
        Ok(ids) => ids,
        Err(e) => {
            warn!("Sweep: failed to query expired groups: {}", e);
            return outcome;
        }
    };

    if expired.is_empty() {
        return outcome;
    }

    // Fan-out over every user per expired group, as the membership index is
    // keyed per user. O(groups x users) — a known scaling bottleneck.
    //
    // Without the user list the cascade cannot run, and deleting the groups
    // anyway would orphan their joined refs for good: the next cycle
    // re-derives the expired set from the group collection, where those ids
    // would no longer exist. Bail out and let the next run retry everything.
    let user_ids = match db.list_user_ids() {
        Ok(ids) => ids,
        Err(e) => {
            warn!("Sweep: failed to enumerate users, deferring cycle: {}", e);
            return outcome;
        }
    };

    for group_id in &expired {
        match db.delete_group(group_id) {
            Ok(n) => {
                if n > 0 {
                    outcome.groups_deleted += n;
                    feed.publish(StoreChange::Groups);
                }
            }
            Err(e) => {
                // skip this group's whole cascade; the next run retries it
                warn!("Sweep: failed to delete group {}: {}", group_id, e);
                continue;
            }
        }

        for user_id in &user_ids {
            match db.delete_joined_group(user_id, group_id) {
                Ok(n) if n > 0 => {
                    outcome.refs_deleted += n;
                    if let Ok(uid) = Uuid::parse_str(user_id) {
                        feed.publish(StoreChange::JoinedGroups { user_id: uid });
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        "Sweep: failed to delete joined ref {}/{}: {}",
                        user_id, group_id, e
                    );
                }
            }
        }
    }

    outcome
}
