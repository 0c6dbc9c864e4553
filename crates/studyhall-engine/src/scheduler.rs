use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use studyhall_db::Database;

use crate::feed::ChangeFeed;
use crate::sweep;

/// Owns the process-wide sweep timer. Started once at process startup;
/// stopping (or dropping) it is the only teardown the sweep needs, since
/// each run re-derives its work from scratch.
pub struct Sweeper {
    task: JoinHandle<()>,
}

impl Sweeper {
    /// Run the sweep once immediately, then on every `period` tick.
    pub fn start(db: Arc<Database>, feed: ChangeFeed, period: Duration) -> Self {
        Self {
            task: tokio::spawn(run_sweep_loop(db, feed, period)),
        }
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_sweep_loop(db: Arc<Database>, feed: ChangeFeed, period: Duration) {
    // the first tick fires immediately — that is the startup run
    let mut interval = tokio::time::interval(period);

    loop {
        interval.tick().await;

        let outcome = sweep::sweep_expired_groups(&db, &feed);
        if outcome.groups_deleted > 0 {
            info!(
                "Sweep: removed {} expired groups and {} joined refs",
                outcome.groups_deleted, outcome.refs_deleted
            );
        }
    }
}
