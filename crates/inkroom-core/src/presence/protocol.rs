//! Wire messages exchanged with the presence relay.

use crate::element::HexColor;
use crate::layer::Layer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Who is present on a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub user_id: String,
    pub user_name: String,
    pub color: HexColor,
    /// Milliseconds since the Unix epoch.
    pub online_at: u64,
}

/// A collaborator's pointer in document space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorRecord {
    pub user_id: String,
    pub user_name: String,
    pub x: f64,
    pub y: f64,
    pub color: HexColor,
}

/// Layers published after a save so peers can catch up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasUpdate {
    pub user_id: String,
    /// Stored version the layers correspond to.
    #[serde(default)]
    pub version: u64,
    pub layers: Vec<Layer>,
    pub timestamp: u64,
}

/// Application events carried by `broadcast` messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum BroadcastMessage {
    Cursor(CursorRecord),
    CanvasUpdate(CanvasUpdate),
}

/// Messages sent to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to a topic under a presence key.
    Join { topic: String, key: String },
    /// Publish this client's presence record.
    Track { presence: PresenceRecord },
    /// Fan a message out to every other subscriber.
    Broadcast { message: BroadcastMessage },
    Leave,
}

/// Messages received from the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Joined {
        topic: String,
        key: String,
    },
    /// Full roster, keyed by presence key. Includes the receiver.
    PresenceSync {
        presences: BTreeMap<String, PresenceRecord>,
    },
    PresenceJoin {
        key: String,
        presence: PresenceRecord,
    },
    PresenceLeave {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        presence: Option<PresenceRecord>,
    },
    Broadcast {
        from: String,
        message: BroadcastMessage,
    },
    Error {
        message: String,
    },
}
