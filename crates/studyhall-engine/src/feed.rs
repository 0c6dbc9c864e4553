use tokio::sync::broadcast;
use uuid::Uuid;

/// A change notification for one logical collection. Carries no payload:
/// subscribers re-materialize the full result set for their query, so the
/// notice only needs to say *what* changed, not *how*.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    /// The group collection changed (create or sweep deletion).
    Groups,
    /// One user's joined-groups index changed.
    JoinedGroups { user_id: Uuid },
    /// One group's transcript changed.
    Messages { group_id: Uuid },
}

/// Push-based change feed over the store. Every mutation — user-initiated
/// via the gateway or background via the sweep — publishes here after its
/// write lands.
#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<StoreChange>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.tx.subscribe()
    }

    /// Fire-and-forget: a send error only means nobody is listening.
    pub fn publish(&self, change: StoreChange) {
        let _ = self.tx.send(change);
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
