//! Transports that carry presence messages to and from a relay.
//!
//! [`NativeWebSocket`] talks to the relay server over a WebSocket on a
//! background thread. [`MemoryHub`] runs the same relay rules in-process,
//! which is what tests and single-machine sessions use.

use super::protocol::{ClientMessage, PresenceRecord, ServerMessage};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,
    #[error("already connected")]
    AlreadyConnected,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("transport channel closed")]
    ChannelClosed,
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events surfaced by a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    Message(ServerMessage),
    Error(String),
}

/// Moves presence messages. Implementations never block.
pub trait PresenceTransport {
    fn send(&mut self, message: &ClientMessage) -> Result<(), TransportError>;

    /// Drain everything received since the last poll.
    fn poll(&mut self) -> Vec<TransportEvent>;
}

// ============================================================================
// In-process relay
// ============================================================================

#[derive(Debug, Default)]
struct Slot {
    topic: Option<String>,
    key: String,
    presence: Option<PresenceRecord>,
    inbox: Vec<TransportEvent>,
}

#[derive(Debug, Default)]
struct HubState {
    next_id: u64,
    slots: HashMap<u64, Slot>,
}

impl HubState {
    fn members<'a>(&'a self, topic: &'a str) -> impl Iterator<Item = u64> + 'a {
        self.slots
            .iter()
            .filter(move |(_, slot)| slot.topic.as_deref() == Some(topic))
            .map(|(id, _)| *id)
    }

    fn roster(&self, topic: &str) -> BTreeMap<String, PresenceRecord> {
        self.slots
            .values()
            .filter(|slot| slot.topic.as_deref() == Some(topic))
            .filter_map(|slot| Some((slot.key.clone(), slot.presence.clone()?)))
            .collect()
    }

    fn deliver(&mut self, to: u64, message: ServerMessage) {
        if let Some(slot) = self.slots.get_mut(&to) {
            slot.inbox.push(TransportEvent::Message(message));
        }
    }

    fn fan_out(&mut self, topic: &str, except: Option<u64>, message: &ServerMessage) {
        let targets: Vec<u64> = self.members(topic).filter(|id| Some(*id) != except).collect();
        for id in targets {
            self.deliver(id, message.clone());
        }
    }

    fn leave(&mut self, id: u64) {
        let Some(slot) = self.slots.get_mut(&id) else {
            return;
        };
        let Some(topic) = slot.topic.take() else {
            return;
        };
        let key = slot.key.clone();
        let presence = slot.presence.take();
        self.fan_out(&topic, Some(id), &ServerMessage::PresenceLeave { key, presence });
    }

    fn handle(&mut self, id: u64, message: ClientMessage) {
        match message {
            ClientMessage::Join { topic, key } => {
                self.leave(id);
                if let Some(slot) = self.slots.get_mut(&id) {
                    slot.topic = Some(topic.clone());
                    slot.key = key.clone();
                }
                let presences = self.roster(&topic);
                self.deliver(id, ServerMessage::Joined { topic, key });
                self.deliver(id, ServerMessage::PresenceSync { presences });
            }
            ClientMessage::Track { presence } => {
                let Some(slot) = self.slots.get_mut(&id) else {
                    return;
                };
                let Some(topic) = slot.topic.clone() else {
                    self.deliver(id, not_joined());
                    return;
                };
                slot.presence = Some(presence.clone());
                let key = slot.key.clone();
                self.fan_out(&topic, None, &ServerMessage::PresenceJoin { key, presence });
            }
            ClientMessage::Broadcast { message } => {
                let Some(slot) = self.slots.get(&id) else {
                    return;
                };
                let Some(topic) = slot.topic.clone() else {
                    self.deliver(id, not_joined());
                    return;
                };
                let from = slot.key.clone();
                self.fan_out(&topic, Some(id), &ServerMessage::Broadcast { from, message });
            }
            ClientMessage::Leave => self.leave(id),
        }
    }
}

fn not_joined() -> ServerMessage {
    ServerMessage::Error {
        message: "not joined to a topic".to_string(),
    }
}

/// An in-process relay shared by any number of [`MemoryTransport`]s.
#[derive(Debug, Clone, Default)]
pub struct MemoryHub {
    state: Arc<Mutex<HubState>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new client.
    pub fn connect(&self) -> MemoryTransport {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.slots.insert(
            id,
            Slot {
                inbox: vec![TransportEvent::Connected],
                ..Slot::default()
            },
        );
        MemoryTransport {
            hub: self.clone(),
            id,
        }
    }

    /// Number of attached clients subscribed to `topic`.
    pub fn subscribers(&self, topic: &str) -> usize {
        self.lock().members(topic).count()
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        // A panicked peer cannot leave the relay maps half-updated in a way
        // that matters for ephemeral presence.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One client's handle on a [`MemoryHub`]. Dropping it leaves the topic.
#[derive(Debug)]
pub struct MemoryTransport {
    hub: MemoryHub,
    id: u64,
}

impl PresenceTransport for MemoryTransport {
    fn send(&mut self, message: &ClientMessage) -> Result<(), TransportError> {
        let mut state = self.hub.lock();
        if !state.slots.contains_key(&self.id) {
            return Err(TransportError::NotConnected);
        }
        state.handle(self.id, message.clone());
        Ok(())
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        self.hub
            .lock()
            .slots
            .get_mut(&self.id)
            .map(|slot| std::mem::take(&mut slot.inbox))
            .unwrap_or_default()
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        let mut state = self.hub.lock();
        state.leave(self.id);
        state.slots.remove(&self.id);
    }
}

// ============================================================================
// Native WebSocket Client
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
mod native_client {
    use super::*;
    use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::{Message, connect};
    use url::Url;

    /// Commands sent to the WebSocket thread.
    enum WsCommand {
        Send(String),
        Close,
    }

    /// WebSocket client for native platforms.
    ///
    /// Uses a background thread for non-blocking operation.
    pub struct NativeWebSocket {
        state: ConnectionState,
        cmd_tx: Option<Sender<WsCommand>>,
        event_rx: Option<Receiver<TransportEvent>>,
        _thread: Option<JoinHandle<()>>,
    }

    impl NativeWebSocket {
        pub fn new() -> Self {
            Self {
                state: ConnectionState::Disconnected,
                cmd_tx: None,
                event_rx: None,
                _thread: None,
            }
        }

        /// Connect to a relay at a `ws://` or `wss://` URL.
        pub fn connect(&mut self, url: &str) -> Result<(), TransportError> {
            if self.cmd_tx.is_some() {
                return Err(TransportError::AlreadyConnected);
            }
            let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
            if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
                return Err(TransportError::InvalidUrl(format!(
                    "unsupported scheme: {}",
                    parsed.scheme()
                )));
            }

            self.state = ConnectionState::Connecting;
            let (cmd_tx, cmd_rx) = channel::<WsCommand>();
            let (event_tx, event_rx) = channel::<TransportEvent>();
            let url = url.to_string();

            let handle = thread::spawn(move || run_socket(&url, cmd_rx, event_tx));

            self.cmd_tx = Some(cmd_tx);
            self.event_rx = Some(event_rx);
            self._thread = Some(handle);
            Ok(())
        }

        pub fn disconnect(&mut self) {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(WsCommand::Close);
            }
            self.event_rx = None;
            self._thread = None;
            self.state = ConnectionState::Disconnected;
        }

        pub fn state(&self) -> ConnectionState {
            self.state
        }

        pub fn is_connected(&self) -> bool {
            self.state == ConnectionState::Connected
        }
    }

    fn run_socket(url: &str, cmd_rx: Receiver<WsCommand>, event_tx: Sender<TransportEvent>) {
        log::info!("Presence socket connecting to {url}");
        let (mut socket, response) = match connect(url) {
            Ok(pair) => pair,
            Err(e) => {
                log::error!("Presence socket connection failed: {e}");
                let _ = event_tx.send(TransportEvent::Error(format!("Connection failed: {e}")));
                return;
            }
        };
        log::info!("Presence socket connected, status: {}", response.status());
        let _ = event_tx.send(TransportEvent::Connected);

        // Short read timeout so outgoing commands are not starved.
        if let tungstenite::stream::MaybeTlsStream::Plain(tcp) = socket.get_mut() {
            let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
            let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
        }

        loop {
            match cmd_rx.try_recv() {
                Ok(WsCommand::Send(text)) => {
                    if let Err(e) = socket.send(Message::Text(text)) {
                        log::error!("Presence socket send error: {e}");
                        break;
                    }
                }
                Ok(WsCommand::Close) | Err(TryRecvError::Disconnected) => {
                    let _ = socket.close(None);
                    break;
                }
                Err(TryRecvError::Empty) => {}
            }

            match socket.read() {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(message) => {
                        let _ = event_tx.send(TransportEvent::Message(message));
                    }
                    Err(e) => log::warn!("Failed to parse relay message: {e}"),
                },
                Ok(Message::Ping(data)) => {
                    let _ = socket.send(Message::Pong(data));
                }
                Ok(Message::Close(_)) => {
                    log::info!("Presence socket received close frame");
                    break;
                }
                Ok(_) => {}
                Err(tungstenite::Error::Io(ref e))
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => {
                    log::error!("Presence socket read error: {e}");
                    break;
                }
            }
        }

        log::info!("Presence socket thread exiting");
        let _ = event_tx.send(TransportEvent::Disconnected);
    }

    impl PresenceTransport for NativeWebSocket {
        fn send(&mut self, message: &ClientMessage) -> Result<(), TransportError> {
            let tx = self.cmd_tx.as_ref().ok_or(TransportError::NotConnected)?;
            let text = serde_json::to_string(message)?;
            tx.send(WsCommand::Send(text))
                .map_err(|_| TransportError::ChannelClosed)
        }

        fn poll(&mut self) -> Vec<TransportEvent> {
            let Some(rx) = self.event_rx.as_ref() else {
                return Vec::new();
            };
            let events: Vec<TransportEvent> = rx.try_iter().collect();
            for event in &events {
                match event {
                    TransportEvent::Connected => self.state = ConnectionState::Connected,
                    TransportEvent::Disconnected => self.state = ConnectionState::Disconnected,
                    TransportEvent::Error(_) => self.state = ConnectionState::Error,
                    TransportEvent::Message(_) => {}
                }
            }
            events
        }
    }

    impl Default for NativeWebSocket {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for NativeWebSocket {
        fn drop(&mut self) {
            self.disconnect();
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native_client::NativeWebSocket;
