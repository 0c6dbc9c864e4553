use std::collections::HashMap;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use studyhall_engine::{SubscriptionManager, ViewQuery, ViewSubscription, ViewUpdate};
use studyhall_types::api::Claims;
use studyhall_types::events::{ClientCommand, ServerEvent, ViewRef};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long a client gets to send Identify before we hang up.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle a single WebSocket connection: Identify handshake, then a loop of
/// Subscribe/Unsubscribe commands and outbound view snapshots.
pub async fn handle_connection(
    socket: WebSocket,
    manager: SubscriptionManager,
    jwt_secret: String,
) {
    let (mut sender, mut receiver) = socket.split();

    // Step 1: Wait for Identify command with JWT
    let (user_id, email) = match wait_for_identify(&mut receiver, &jwt_secret).await {
        Some(identity) => identity,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    info!("{} ({}) connected to gateway", email, user_id);

    // Step 2: Send Ready event
    let ready = ServerEvent::Ready {
        user_id,
        email: email.clone(),
    };
    if send_event(&mut sender, &ready).await.is_err() {
        return;
    }

    // Step 3: Command/snapshot loop
    run_connection_loop(sender, receiver, manager, user_id, email).await;
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    manager: SubscriptionManager,
    user_id: Uuid,
    email: String,
) {
    // Snapshots from all of this connection's views funnel through one
    // channel so the socket has a single writer.
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerEvent>();

    // One forwarding task per open view. Aborting it drops the engine
    // subscription, which closes the underlying feed.
    let mut views: HashMap<ViewRef, JoinHandle<()>> = HashMap::new();

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut missed_heartbeats: u8 = 0;

    loop {
        tokio::select! {
            event = out_rx.recv() => {
                // out_tx lives in this scope, so the channel cannot close
                let Some(event) = event else { break };
                if send_event(&mut sender, &event).await.is_err() {
                    break;
                }
            }

            _ = heartbeat.tick() => {
                missed_heartbeats += 1;
                if missed_heartbeats > 2 {
                    info!("{} missed heartbeats, dropping connection", email);
                    break;
                }
                if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }

            frame = receiver.next() => {
                let Some(Ok(frame)) = frame else { break };
                match frame {
                    Message::Text(text) => {
                        match serde_json::from_str::<ClientCommand>(&text) {
                            Ok(ClientCommand::Subscribe { view }) => {
                                let query = query_for(view, user_id, &email);
                                let sub = manager.subscribe(query);
                                let task = tokio::spawn(forward_view(sub, view, out_tx.clone()));
                                // re-subscribing replaces the old feed
                                if let Some(old) = views.insert(view, task) {
                                    old.abort();
                                }
                            }
                            Ok(ClientCommand::Unsubscribe { view }) => {
                                if let Some(task) = views.remove(&view) {
                                    task.abort();
                                }
                            }
                            Ok(ClientCommand::Identify { .. }) => {
                                // already identified; ignore
                            }
                            Err(e) => {
                                warn!("{} sent an invalid command: {}", email, e);
                            }
                        }
                    }
                    Message::Pong(_) => {
                        missed_heartbeats = 0;
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    for (_, task) in views {
        task.abort();
    }
    info!("{} ({}) disconnected from gateway", email, user_id);
}

/// Relay snapshots from one engine subscription to the connection's
/// outbound channel. Ends when the view fails or either side goes away.
async fn forward_view(
    mut sub: ViewSubscription,
    view: ViewRef,
    out: mpsc::UnboundedSender<ServerEvent>,
) {
    while let Some(update) = sub.recv().await {
        let event = match update {
            ViewUpdate::Groups(items) => ServerEvent::Groups { view, items },
            ViewUpdate::Messages(items) => {
                let ViewRef::GroupMessages { group_id } = view else {
                    continue;
                };
                ServerEvent::Messages { group_id, items }
            }
            ViewUpdate::Failed(message) => {
                let _ = out.send(ServerEvent::ViewFailed { view, message });
                return;
            }
        };
        if out.send(event).is_err() {
            return;
        }
    }
}

fn query_for(view: ViewRef, user_id: Uuid, email: &str) -> ViewQuery {
    match view {
        ViewRef::AllGroups => ViewQuery::AllGroups,
        ViewRef::JoinedGroups => ViewQuery::JoinedGroups { user_id },
        ViewRef::CreatedGroups => ViewQuery::CreatedGroups {
            created_by: email.to_string(),
        },
        ViewRef::GroupMessages { group_id } => ViewQuery::GroupMessages { group_id },
    }
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize gateway event: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(json.into())).await
}

async fn wait_for_identify(
    receiver: &mut SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Option<(Uuid, String)> {
    let deadline = tokio::time::sleep(IDENTIFY_TIMEOUT);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => return None,

            frame = receiver.next() => {
                let Some(Ok(frame)) = frame else { return None };
                let Message::Text(text) = frame else { continue };

                let Ok(ClientCommand::Identify { token }) =
                    serde_json::from_str::<ClientCommand>(&text)
                else {
                    return None;
                };

                let claims = decode::<Claims>(
                    &token,
                    &DecodingKey::from_secret(jwt_secret.as_bytes()),
                    &Validation::default(),
                )
                .ok()?
                .claims;

                return Some((claims.sub, claims.email));
            }
        }
    }
}
