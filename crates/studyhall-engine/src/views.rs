use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use studyhall_db::Database;
use studyhall_types::models::{ChatMessage, Group};

use crate::convert;
use crate::expiry;
use crate::feed::{ChangeFeed, StoreChange};

/// One logical view over the store. Each open screen holds exactly one
/// subscription per query it renders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewQuery {
    AllGroups,
    JoinedGroups { user_id: Uuid },
    CreatedGroups { created_by: String },
    GroupMessages { group_id: Uuid },
}

/// A full snapshot for a view — never a diff. `Failed` is terminal: the
/// subscription task ends after delivering it and the view decides whether
/// to resubscribe.
#[derive(Debug, Clone)]
pub enum ViewUpdate {
    Groups(Vec<Group>),
    Messages(Vec<ChatMessage>),
    Failed(String),
}

/// Hands out live subscriptions backed by the change feed.
#[derive(Clone)]
pub struct SubscriptionManager {
    db: Arc<Database>,
    feed: ChangeFeed,
}

impl SubscriptionManager {
    pub fn new(db: Arc<Database>, feed: ChangeFeed) -> Self {
        Self { db, feed }
    }

    /// Open a subscription: the current snapshot is delivered immediately,
    /// then again after every relevant store change. Dropping the returned
    /// handle tears the subscription down.
    pub fn subscribe(&self, query: ViewQuery) -> ViewSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut feed_rx = self.feed.subscribe();
        let db = self.db.clone();

        let task = tokio::spawn(async move {
            if !deliver(&db, &query, &tx) {
                return;
            }

            loop {
                match feed_rx.recv().await {
                    Ok(change) => {
                        if affects(&query, &change) && !deliver(&db, &query, &tx) {
                            return;
                        }
                    }
                    // Snapshots are full result sets, so missed notices are
                    // harmless: one refresh covers them all.
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        if !deliver(&db, &query, &tx) {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        ViewSubscription { rx, task }
    }
}

/// Handle for one open view. Dropping it aborts the feed task — teardown
/// without unsubscribing would leak an open feed.
pub struct ViewSubscription {
    rx: mpsc::UnboundedReceiver<ViewUpdate>,
    task: JoinHandle<()>,
}

impl ViewSubscription {
    /// Next snapshot, or `None` once the subscription has ended.
    pub async fn recv(&mut self) -> Option<ViewUpdate> {
        self.rx.recv().await
    }
}

impl Drop for ViewSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Materialize and send. Returns false when the task should stop: either
/// the receiver hung up, or the store failed (terminal for this view).
fn deliver(db: &Database, query: &ViewQuery, tx: &mpsc::UnboundedSender<ViewUpdate>) -> bool {
    match materialize(db, query) {
        Ok(update) => tx.send(update).is_ok(),
        Err(e) => {
            warn!("View {:?} failed to materialize: {}", query, e);
            let message = match query {
                ViewQuery::GroupMessages { .. } => "Failed to load messages. Please try again.",
                _ => "Failed to load groups. Please try again.",
            };
            let _ = tx.send(ViewUpdate::Failed(message.into()));
            false
        }
    }
}

fn affects(query: &ViewQuery, change: &StoreChange) -> bool {
    match (query, change) {
        (ViewQuery::AllGroups, StoreChange::Groups) => true,
        (ViewQuery::CreatedGroups { .. }, StoreChange::Groups) => true,
        (
            ViewQuery::JoinedGroups { user_id },
            StoreChange::JoinedGroups { user_id: changed },
        ) => user_id == changed,
        (
            ViewQuery::GroupMessages { group_id },
            StoreChange::Messages { group_id: changed },
        ) => group_id == changed,
        _ => false,
    }
}

fn materialize(db: &Database, query: &ViewQuery) -> Result<ViewUpdate> {
    Ok(match query {
        ViewQuery::AllGroups => ViewUpdate::Groups(load_all_groups(db)?),
        ViewQuery::JoinedGroups { user_id } => {
            ViewUpdate::Groups(load_joined_groups(db, *user_id)?)
        }
        ViewQuery::CreatedGroups { created_by } => {
            ViewUpdate::Groups(load_created_groups(db, created_by)?)
        }
        ViewQuery::GroupMessages { group_id } => {
            ViewUpdate::Messages(load_messages(db, *group_id)?)
        }
    })
}

// The expiry filter below is deliberate redundancy: the sweep removes
// expired groups on its own schedule, and listings hide whatever the sweep
// has not reached yet.

/// All groups, newest first, expired ones filtered out.
pub fn load_all_groups(db: &Database) -> Result<Vec<Group>> {
    Ok(filter_live(db.list_groups()?))
}

pub fn load_joined_groups(db: &Database, user_id: Uuid) -> Result<Vec<Group>> {
    Ok(filter_live(db.list_joined_groups(&user_id.to_string())?))
}

pub fn load_created_groups(db: &Database, created_by: &str) -> Result<Vec<Group>> {
    Ok(filter_live(db.list_groups_created_by(created_by)?))
}

/// Transcript for one group, send time ascending. No expiry filter —
/// messages are never swept.
pub fn load_messages(db: &Database, group_id: Uuid) -> Result<Vec<ChatMessage>> {
    Ok(db
        .list_messages(&group_id.to_string())?
        .into_iter()
        .map(convert::message_from_row)
        .collect())
}

fn filter_live(rows: Vec<studyhall_db::models::GroupRow>) -> Vec<Group> {
    rows.into_iter()
        .map(convert::group_from_row)
        .filter(|g| !expiry::is_expired(g.scheduled_at))
        .collect()
}
