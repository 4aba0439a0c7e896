//! Inkroom WebSocket Relay
//!
//! A topic-based pub/sub relay for presence and ephemeral canvas events.
//! Payloads are relayed as opaque JSON; the relay only understands the
//! envelope.
//!
//! ## Protocol
//!
//! Client to relay:
//! ```json
//! { "type": "join", "topic": "canvas:abc", "key": "user-1" }
//! { "type": "track", "presence": { "userId": "user-1", "userName": "Ada" } }
//! { "type": "broadcast", "message": { "event": "cursor", "payload": { "x": 1, "y": 2 } } }
//! { "type": "leave" }
//! ```
//!
//! Relay to client: `joined`, `presence_sync`, `presence_join`,
//! `presence_leave`, `broadcast` (with `from`, never echoed to the sender)
//! and `error`.

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap},
    net::SocketAddr,
    sync::Arc,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_BIND: &str = "0.0.0.0:3030";
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Relay settings, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Per-topic broadcast buffer. Slow clients lag past this many messages.
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3030)),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// `INKROOM_BIND` and `INKROOM_CHANNEL_CAPACITY`; invalid values fall back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(bind) = lookup("INKROOM_BIND") {
            match bind.parse() {
                Ok(addr) => config.bind = addr,
                Err(e) => warn!("Ignoring INKROOM_BIND={bind}: {e}"),
            }
        }
        if let Some(capacity) = lookup("INKROOM_CHANNEL_CAPACITY") {
            match capacity.parse::<usize>() {
                Ok(n) if n > 0 => config.channel_capacity = n,
                _ => warn!("Ignoring INKROOM_CHANNEL_CAPACITY={capacity}"),
            }
        }
        config
    }
}

/// A message sent by a client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to a topic under a presence key
    Join { topic: String, key: String },
    /// Publish this client's presence record
    Track { presence: Value },
    /// Relay an application event to every other subscriber
    Broadcast { message: Value },
    /// Unsubscribe from the current topic
    Leave,
}

/// A message delivered to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Joined {
        topic: String,
        key: String,
    },
    /// Full roster keyed by presence key, including the receiver
    PresenceSync {
        presences: BTreeMap<String, Value>,
    },
    PresenceJoin {
        key: String,
        presence: Value,
    },
    PresenceLeave {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        presence: Option<Value>,
    },
    Broadcast {
        from: String,
        message: Value,
    },
    Error {
        message: String,
    },
}

/// A fanned-out message tagged with the connection that caused it.
#[derive(Debug, Clone)]
struct Envelope {
    origin: String,
    /// Deliver to the origin connection too.
    echo: bool,
    message: ServerMessage,
}

struct Member {
    key: String,
    presence: Option<Value>,
}

/// Topic state
struct Topic {
    tx: broadcast::Sender<Envelope>,
    /// Subscribed connections by connection id
    members: HashMap<String, Member>,
}

impl Topic {
    fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            members: HashMap::new(),
        }
    }

    fn roster(&self) -> BTreeMap<String, Value> {
        self.members
            .values()
            .filter_map(|m| Some((m.key.clone(), m.presence.clone()?)))
            .collect()
    }

    fn publish(&self, origin: &str, echo: bool, message: ServerMessage) {
        // No receivers is fine: everyone may have left already.
        let _ = self.tx.send(Envelope {
            origin: origin.to_string(),
            echo,
            message,
        });
    }
}

/// Shared application state
pub struct AppState {
    topics: DashMap<String, Topic>,
    channel_capacity: usize,
}

impl AppState {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Number of live topics.
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Number of connections subscribed to `topic`.
    pub fn subscribers(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |t| t.members.len())
    }

    /// Add a connection to a topic; returns its receiver and the current roster.
    fn join_topic(
        &self,
        topic: &str,
        conn_id: &str,
        key: &str,
    ) -> (broadcast::Receiver<Envelope>, BTreeMap<String, Value>) {
        let mut entry = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(self.channel_capacity));
        entry.members.insert(
            conn_id.to_string(),
            Member {
                key: key.to_string(),
                presence: None,
            },
        );
        (entry.tx.subscribe(), entry.roster())
    }

    fn track(&self, topic: &str, conn_id: &str, presence: Value) {
        let Some(mut entry) = self.topics.get_mut(topic) else {
            return;
        };
        let Some(member) = entry.members.get_mut(conn_id) else {
            return;
        };
        member.presence = Some(presence.clone());
        let key = member.key.clone();
        entry.publish(conn_id, true, ServerMessage::PresenceJoin { key, presence });
    }

    fn broadcast(&self, topic: &str, conn_id: &str, message: Value) {
        let Some(entry) = self.topics.get(topic) else {
            return;
        };
        let Some(member) = entry.members.get(conn_id) else {
            return;
        };
        let from = member.key.clone();
        entry.publish(conn_id, false, ServerMessage::Broadcast { from, message });
    }

    /// Remove a connection from a topic and tell the others.
    ///
    /// When `resync` is set the remaining peers also get a fresh roster.
    fn leave_topic(&self, topic: &str, conn_id: &str, resync: bool) {
        let Some(mut entry) = self.topics.get_mut(topic) else {
            return;
        };
        let Some(member) = entry.members.remove(conn_id) else {
            return;
        };
        entry.publish(
            conn_id,
            false,
            ServerMessage::PresenceLeave {
                key: member.key,
                presence: member.presence,
            },
        );
        if resync {
            let presences = entry.roster();
            entry.publish(conn_id, false, ServerMessage::PresenceSync { presences });
        }
        // Clean up empty topics
        if entry.members.is_empty() {
            drop(entry);
            self.topics.remove_if(topic, |_, t| t.members.is_empty());
            debug!("Removed empty topic {topic}");
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

/// Routes: `/` banner, `/health`, `/ws`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Index page
async fn index() -> &'static str {
    "Inkroom Relay Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            warn!("Failed to encode message: {e}");
            None
        }
    }
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = Uuid::new_v4().to_string();
    info!("New connection: {conn_id}");

    let (mut sender, mut receiver) = socket.split();
    let mut current_topic: Option<String> = None;
    let mut topic_rx: Option<broadcast::Receiver<Envelope>> = None;

    loop {
        // Replies addressed only to this connection
        let mut replies: Vec<ServerMessage> = Vec::new();

        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::Join { topic, key }) => {
                            if let Some(old) = current_topic.take() {
                                state.leave_topic(&old, &conn_id, false);
                            }
                            let (rx, presences) = state.join_topic(&topic, &conn_id, &key);
                            topic_rx = Some(rx);
                            info!("Connection {conn_id} joined {topic} as {key}");
                            replies.push(ServerMessage::Joined { topic: topic.clone(), key });
                            replies.push(ServerMessage::PresenceSync { presences });
                            current_topic = Some(topic);
                        }
                        Ok(ClientMessage::Track { presence }) => match &current_topic {
                            Some(topic) => state.track(topic, &conn_id, presence),
                            None => replies.push(not_joined()),
                        },
                        Ok(ClientMessage::Broadcast { message }) => match &current_topic {
                            Some(topic) => state.broadcast(topic, &conn_id, message),
                            None => replies.push(not_joined()),
                        },
                        Ok(ClientMessage::Leave) => {
                            if let Some(topic) = current_topic.take() {
                                state.leave_topic(&topic, &conn_id, false);
                                info!("Connection {conn_id} left {topic}");
                            }
                            topic_rx = None;
                        }
                        Err(e) => {
                            warn!("Invalid message from {conn_id}: {e}");
                            replies.push(ServerMessage::Error {
                                message: format!("Invalid message: {e}"),
                            });
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // Ignore binary/ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {conn_id}: {e}");
                        break;
                    }
                }
            }

            envelope = async {
                match &mut topic_rx {
                    Some(rx) => rx.recv().await,
                    // Not subscribed: wait for client input only
                    None => std::future::pending::<Result<Envelope, RecvError>>().await,
                }
            } => {
                match envelope {
                    Ok(envelope) => {
                        if envelope.echo || envelope.origin != conn_id {
                            replies.push(envelope.message);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Connection {conn_id} lagged; dropped {skipped} messages");
                    }
                    Err(RecvError::Closed) => topic_rx = None,
                }
            }
        }

        for reply in &replies {
            let Some(frame) = encode(reply) else { continue };
            if sender.send(frame).await.is_err() {
                cleanup(&state, &conn_id, current_topic.take());
                return;
            }
        }
    }

    cleanup(&state, &conn_id, current_topic);
}

fn cleanup(state: &AppState, conn_id: &str, topic: Option<String>) {
    if let Some(topic) = topic {
        state.leave_topic(&topic, conn_id, true);
    }
    info!("Connection closed: {conn_id}");
}

fn not_joined() -> ServerMessage {
    ServerMessage::Error {
        message: "not joined to a topic".to_string(),
    }
}
