use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ChatMessage, Group};

/// Identifies one live view a client can subscribe to. User-scoped views
/// (joined/created) bind to the authenticated connection's identity, so they
/// carry no user id on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "view", content = "params")]
pub enum ViewRef {
    AllGroups,
    JoinedGroups,
    CreatedGroups,
    GroupMessages { group_id: Uuid },
}

/// Events sent over the WebSocket gateway, server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerEvent {
    /// Server confirms successful authentication.
    Ready { user_id: Uuid, email: String },

    /// Full current result set for a group-listing view. Expired groups are
    /// already filtered out; ordering is creation time descending.
    Groups { view: ViewRef, items: Vec<Group> },

    /// Full current transcript for a group, send time ascending.
    Messages {
        group_id: Uuid,
        items: Vec<ChatMessage>,
    },

    /// The feed behind a view failed. Terminal: the server will not retry;
    /// the client decides whether to re-subscribe.
    ViewFailed { view: ViewRef, message: String },
}

/// Commands sent from client to server over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientCommand {
    /// Authenticate the WebSocket connection. Must be the first frame.
    Identify { token: String },

    /// Open a live subscription for a view. The server immediately pushes
    /// the current snapshot, then again on every change.
    Subscribe { view: ViewRef },

    /// Tear down a view subscription.
    Unsubscribe { view: ViewRef },
}
