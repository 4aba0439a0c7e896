//! Ephemeral collaboration state: who is here and where their pointers are.
//!
//! [`PresenceChannel`] is transport-agnostic. It queues outgoing
//! [`ClientMessage`]s and folds incoming [`ServerMessage`]s into a roster and
//! a cursor map; a [`PresenceTransport`] moves the messages. Nothing here
//! touches the document store. Cursor traffic is lossy and last-write-wins
//! per user.

mod protocol;
mod transport;

pub use protocol::{
    BroadcastMessage, CanvasUpdate, ClientMessage, CursorRecord, PresenceRecord, ServerMessage,
};
pub use transport::{
    ConnectionState, MemoryHub, MemoryTransport, PresenceTransport, TransportError,
    TransportEvent,
};
#[cfg(not(target_arch = "wasm32"))]
pub use transport::NativeWebSocket;

use crate::clock::now_millis;
use crate::config::PRESENCE_PALETTE;
use crate::element::HexColor;
use crate::layer::Layer;
use kurbo::Point;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// The local participant.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub user_id: String,
    pub user_name: String,
    pub color: HexColor,
}

/// Something the UI may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum PresenceEvent {
    Joined,
    RosterChanged,
    CursorMoved(String),
    CursorRemoved(String),
    CanvasUpdate(CanvasUpdate),
    Connected,
    Disconnected,
    Error(String),
}

/// Pick a palette color at random.
pub fn random_color(palette: &[HexColor]) -> HexColor {
    let palette = if palette.is_empty() {
        &PRESENCE_PALETTE[..]
    } else {
        palette
    };
    let roll = Uuid::new_v4().as_u128();
    palette[(roll % palette.len() as u128) as usize]
}

/// Presence and cursor state for one shared canvas.
#[derive(Debug, Clone)]
pub struct PresenceChannel {
    canvas_id: String,
    me: Participant,
    joined: bool,
    roster: BTreeMap<String, PresenceRecord>,
    cursors: HashMap<String, CursorRecord>,
    outgoing: Vec<ClientMessage>,
}

impl PresenceChannel {
    /// A channel for `canvas_id` with a random color from `palette`.
    pub fn new(
        canvas_id: impl Into<String>,
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        palette: &[HexColor],
    ) -> Self {
        Self::with_participant(
            canvas_id,
            Participant {
                user_id: user_id.into(),
                user_name: user_name.into(),
                color: random_color(palette),
            },
        )
    }

    pub fn with_participant(canvas_id: impl Into<String>, me: Participant) -> Self {
        Self {
            canvas_id: canvas_id.into(),
            me,
            joined: false,
            roster: BTreeMap::new(),
            cursors: HashMap::new(),
            outgoing: Vec::new(),
        }
    }

    /// Topic shared by everyone editing this canvas.
    pub fn topic(&self) -> String {
        format!("canvas:{}", self.canvas_id)
    }

    pub fn participant(&self) -> &Participant {
        &self.me
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    /// Subscribe and announce ourselves.
    pub fn connect(&mut self) {
        log::info!("Joining {} as {}", self.topic(), self.me.user_id);
        self.outgoing.push(ClientMessage::Join {
            topic: self.topic(),
            key: self.me.user_id.clone(),
        });
        self.outgoing.push(ClientMessage::Track {
            presence: PresenceRecord {
                user_id: self.me.user_id.clone(),
                user_name: self.me.user_name.clone(),
                color: self.me.color,
                online_at: now_millis(),
            },
        });
    }

    /// Unsubscribe and forget every peer.
    pub fn disconnect(&mut self) {
        if self.joined {
            self.outgoing.push(ClientMessage::Leave);
        }
        self.joined = false;
        self.roster.clear();
        self.cursors.clear();
    }

    /// Share the local pointer position (document space).
    pub fn send_cursor(&mut self, position: Point) {
        self.outgoing.push(ClientMessage::Broadcast {
            message: BroadcastMessage::Cursor(CursorRecord {
                user_id: self.me.user_id.clone(),
                user_name: self.me.user_name.clone(),
                x: position.x,
                y: position.y,
                color: self.me.color,
            }),
        });
    }

    /// Publish the layers of a freshly saved version.
    pub fn broadcast_update(&mut self, version: u64, layers: Vec<Layer>) {
        self.outgoing.push(ClientMessage::Broadcast {
            message: BroadcastMessage::CanvasUpdate(CanvasUpdate {
                user_id: self.me.user_id.clone(),
                version,
                layers,
                timestamp: now_millis(),
            }),
        });
    }

    /// Drain queued messages for the transport.
    pub fn take_outgoing(&mut self) -> Vec<ClientMessage> {
        std::mem::take(&mut self.outgoing)
    }

    /// Other participants currently present.
    pub fn roster(&self) -> impl Iterator<Item = &PresenceRecord> {
        self.roster.values()
    }

    /// Latest known cursor of every other participant.
    pub fn cursors(&self) -> impl Iterator<Item = &CursorRecord> {
        self.cursors.values()
    }

    pub fn cursor(&self, user_id: &str) -> Option<&CursorRecord> {
        self.cursors.get(user_id)
    }

    /// Fold one relay message into local state.
    pub fn handle_message(&mut self, message: ServerMessage) -> Option<PresenceEvent> {
        match message {
            ServerMessage::Joined { topic, .. } => {
                if topic != self.topic() {
                    return None;
                }
                self.joined = true;
                Some(PresenceEvent::Joined)
            }
            ServerMessage::PresenceSync { presences } => {
                self.roster = presences
                    .into_iter()
                    .filter(|(key, record)| *key != self.me.user_id && record.user_id != self.me.user_id)
                    .collect();
                Some(PresenceEvent::RosterChanged)
            }
            ServerMessage::PresenceJoin { key, presence } => {
                if key == self.me.user_id {
                    return None;
                }
                self.roster.insert(key, presence);
                Some(PresenceEvent::RosterChanged)
            }
            ServerMessage::PresenceLeave { key, .. } => {
                self.roster.remove(&key);
                self.cursors
                    .remove(&key)
                    .map(|_| PresenceEvent::CursorRemoved(key))
                    .or(Some(PresenceEvent::RosterChanged))
            }
            ServerMessage::Broadcast { from, message } => match message {
                BroadcastMessage::Cursor(cursor) => {
                    if from == self.me.user_id || cursor.user_id == self.me.user_id {
                        return None;
                    }
                    let user = cursor.user_id.clone();
                    self.cursors.insert(user.clone(), cursor);
                    Some(PresenceEvent::CursorMoved(user))
                }
                BroadcastMessage::CanvasUpdate(update) => {
                    if update.user_id == self.me.user_id {
                        return None;
                    }
                    log::debug!(
                        "Canvas update from {} at version {}",
                        update.user_id,
                        update.version
                    );
                    Some(PresenceEvent::CanvasUpdate(update))
                }
            },
            ServerMessage::Error { message } => {
                log::warn!("Presence relay error: {message}");
                Some(PresenceEvent::Error(message))
            }
        }
    }

    /// Parse and handle a raw JSON frame. Malformed frames are dropped.
    pub fn handle_json(&mut self, json: &str) -> Option<PresenceEvent> {
        match serde_json::from_str::<ServerMessage>(json) {
            Ok(message) => self.handle_message(message),
            Err(e) => {
                log::warn!("Failed to parse presence message: {e}");
                None
            }
        }
    }

    /// Flush queued messages through `transport` and apply what came back.
    ///
    /// Send failures are logged and the message is dropped; presence traffic
    /// is ephemeral.
    pub fn pump(&mut self, transport: &mut dyn PresenceTransport) -> Vec<PresenceEvent> {
        for message in self.take_outgoing() {
            if let Err(e) = transport.send(&message) {
                log::warn!("Dropping presence message: {e}");
            }
        }
        let mut events = Vec::new();
        for event in transport.poll() {
            match event {
                TransportEvent::Message(message) => events.extend(self.handle_message(message)),
                TransportEvent::Connected => events.push(PresenceEvent::Connected),
                TransportEvent::Disconnected => {
                    // Remote cursors stay until their owners leave.
                    self.joined = false;
                    events.push(PresenceEvent::Disconnected);
                }
                TransportEvent::Error(message) => events.push(PresenceEvent::Error(message)),
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(user: &str) -> PresenceChannel {
        PresenceChannel::new("doc-1", user, user.to_uppercase(), &PRESENCE_PALETTE)
    }

    fn cursor_from(user: &str, x: f64) -> ServerMessage {
        ServerMessage::Broadcast {
            from: user.into(),
            message: BroadcastMessage::Cursor(CursorRecord {
                user_id: user.into(),
                user_name: user.into(),
                x,
                y: 0.0,
                color: HexColor::BLACK,
            }),
        }
    }

    fn record(user: &str) -> PresenceRecord {
        PresenceRecord {
            user_id: user.into(),
            user_name: user.into(),
            color: HexColor::BLACK,
            online_at: 1,
        }
    }

    #[test]
    fn test_color_comes_from_palette() {
        for _ in 0..20 {
            assert!(PRESENCE_PALETTE.contains(&channel("a").participant().color));
        }
        assert!(PRESENCE_PALETTE.contains(&random_color(&[])));
    }

    #[test]
    fn test_connect_queues_join_and_track() {
        let mut ch = channel("a");
        ch.connect();
        let out = ch.take_outgoing();
        assert_eq!(
            out[0],
            ClientMessage::Join {
                topic: "canvas:doc-1".into(),
                key: "a".into()
            }
        );
        assert!(matches!(&out[1], ClientMessage::Track { presence } if presence.user_id == "a"));
        assert!(ch.take_outgoing().is_empty());
    }

    #[test]
    fn test_self_cursor_is_ignored() {
        let mut ch = channel("a");
        assert_eq!(ch.handle_message(cursor_from("a", 1.0)), None);
        assert_eq!(ch.cursors().count(), 0);
    }

    #[test]
    fn test_cursor_last_write_wins_and_leave_removes() {
        let mut ch = channel("a");
        assert_eq!(
            ch.handle_message(cursor_from("b", 1.0)),
            Some(PresenceEvent::CursorMoved("b".into()))
        );
        ch.handle_message(cursor_from("b", 7.0));
        assert_eq!(ch.cursors().count(), 1);
        assert_eq!(ch.cursor("b").unwrap().x, 7.0);

        assert_eq!(
            ch.handle_message(ServerMessage::PresenceLeave {
                key: "b".into(),
                presence: None
            }),
            Some(PresenceEvent::CursorRemoved("b".into()))
        );
        assert!(ch.cursor("b").is_none());
    }

    #[test]
    fn test_roster_excludes_self() {
        let mut ch = channel("a");
        let presences = ["a", "b", "c"]
            .into_iter()
            .map(|u| (u.to_string(), record(u)))
            .collect();
        ch.handle_message(ServerMessage::PresenceSync { presences });
        let ids: Vec<&str> = ch.roster().map(|r| r.user_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);

        assert_eq!(
            ch.handle_message(ServerMessage::PresenceJoin {
                key: "a".into(),
                presence: record("a")
            }),
            None
        );
    }

    #[test]
    fn test_own_canvas_update_is_ignored() {
        let mut ch = channel("a");
        let update = |user: &str| ServerMessage::Broadcast {
            from: user.into(),
            message: BroadcastMessage::CanvasUpdate(CanvasUpdate {
                user_id: user.into(),
                version: 3,
                layers: vec![Layer::default()],
                timestamp: 0,
            }),
        };
        assert_eq!(ch.handle_message(update("a")), None);
        assert!(matches!(
            ch.handle_message(update("b")),
            Some(PresenceEvent::CanvasUpdate(u)) if u.version == 3
        ));
    }

    #[test]
    fn test_handle_json_drops_garbage() {
        let mut ch = channel("a");
        assert_eq!(ch.handle_json("{not json"), None);
        assert_eq!(
            ch.handle_json(r#"{"type":"joined","topic":"canvas:doc-1","key":"a"}"#),
            Some(PresenceEvent::Joined)
        );
        assert!(ch.is_joined());
    }

    #[test]
    fn test_two_peers_through_memory_hub() {
        let hub = MemoryHub::new();
        let mut ta = hub.connect();
        let mut tb = hub.connect();
        let mut a = channel("a");
        let mut b = channel("b");

        a.connect();
        b.connect();
        a.pump(&mut ta);
        b.pump(&mut tb);
        a.pump(&mut ta);

        assert!(a.is_joined() && b.is_joined());
        assert_eq!(a.roster().map(|r| r.user_id.clone()).collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(b.roster().map(|r| r.user_id.clone()).collect::<Vec<_>>(), vec!["a"]);

        a.send_cursor(Point::new(12.0, 34.0));
        a.pump(&mut ta);
        let events = b.pump(&mut tb);
        assert!(events.contains(&PresenceEvent::CursorMoved("a".into())));
        assert_eq!(b.cursor("a").unwrap().y, 34.0);
        // The relay never echoes to the sender.
        assert!(a.pump(&mut ta).is_empty());

        a.disconnect();
        a.pump(&mut ta);
        b.pump(&mut tb);
        assert!(b.cursor("a").is_none());
        assert_eq!(b.roster().count(), 0);
    }
}
