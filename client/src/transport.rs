//! Realtime transport: the client end of the relay.
//!
//! DESIGN
//! ======
//! The session talks to the relay through the [`Transport`] trait and never
//! owns a socket directly. `join`, `leave` and `broadcast` are provided on
//! top of `send`; inbound frames and connection loss arrive through `recv`
//! as [`TransportEvent`]s, which the session dispatches by event name.
//!
//! - [`WsTransport`]: protobuf frames over a websocket. A pump task owns the
//!   socket and `select!`s between the outbound queue and inbound messages.
//! - [`LocalRelay`] / [`LocalTransport`]: an in-process relay with the same
//!   room rules as the server (scoping, roster, disconnect notices). Used as a
//!   test double and for several rooms inside one process.
//!
//! ERROR HANDLING
//! ==============
//! A lost connection is reported once as [`TransportEvent::Disconnected`].
//! Sends fail with [`TransportError::Closed`] until `reconnect` succeeds.
//! Nothing sent or missed during the gap is replayed.

#[cfg(test)]
#[path = "transport_test.rs"]
mod transport_test;

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use canvas::protocol::{JoinPayload, LeavePayload, RelayErrorPayload, SyncEvent};
use frames::{Frame, decode_frame, decode_json_frame, encode_frame, events};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// Bound on queued frames per direction.
pub const CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// TRAIT
// =============================================================================

/// What the transport hands to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Frame(Frame),
    /// The connection dropped. Derived state (presence, autosave) should be
    /// cleared or paused until `reconnect` succeeds.
    Disconnected,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("transport is not connected")]
    Closed,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Queue one frame for the relay.
    async fn send(&self, frame: Frame) -> Result<(), TransportError>;

    /// Next inbound event. `None` once the transport is gone for good.
    async fn recv(&self) -> Option<TransportEvent>;

    /// Re-establish a dropped connection. Room membership is not restored;
    /// callers join again.
    async fn reconnect(&self) -> Result<(), TransportError>;

    async fn join(&self, whiteboard_id: &str, email: &str) -> Result<(), TransportError> {
        let event =
            SyncEvent::Join(JoinPayload { email: email.to_owned(), whiteboard_id: whiteboard_id.to_owned() });
        self.broadcast(&event).await
    }

    async fn leave(&self, whiteboard_id: &str) -> Result<(), TransportError> {
        let event = SyncEvent::Leave(LeavePayload { whiteboard_id: whiteboard_id.to_owned() });
        self.broadcast(&event).await
    }

    async fn broadcast(&self, event: &SyncEvent) -> Result<(), TransportError> {
        self.send(event.to_frame()).await
    }
}

// =============================================================================
// WEBSOCKET
// =============================================================================

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Websocket transport speaking protobuf frames.
pub struct WsTransport {
    url: String,
    outbound: Mutex<Option<mpsc::Sender<Frame>>>,
    events_tx: mpsc::Sender<TransportEvent>,
    events_rx: tokio::sync::Mutex<mpsc::Receiver<TransportEvent>>,
}

impl WsTransport {
    /// Connect to the relay at `url` (`ws://host:port/api/ws`).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Socket`] if the handshake fails.
    pub async fn connect(url: impl Into<String>) -> Result<Self, TransportError> {
        let (events_tx, events_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let transport = Self {
            url: url.into(),
            outbound: Mutex::new(None),
            events_tx,
            events_rx: tokio::sync::Mutex::new(events_rx),
        };
        transport.open().await?;
        Ok(transport)
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn open(&self) -> Result<(), TransportError> {
        let (socket, _response) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        let (out_tx, out_rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(pump(socket, out_rx, self.events_tx.clone()));
        // Replacing the sender retires any previous pump.
        *self.outbound.lock().unwrap_or_else(PoisonError::into_inner) = Some(out_tx);
        info!(url = %self.url, "transport: connected");
        Ok(())
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        let tx = self.outbound.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let Some(tx) = tx else {
            return Err(TransportError::Closed);
        };
        tx.send(frame).await.map_err(|_| TransportError::Closed)
    }

    async fn recv(&self) -> Option<TransportEvent> {
        self.events_rx.lock().await.recv().await
    }

    async fn reconnect(&self) -> Result<(), TransportError> {
        self.open().await
    }
}

/// Own the socket until either side goes away, then report the drop.
async fn pump(socket: Socket, mut out_rx: mpsc::Receiver<Frame>, events_tx: mpsc::Sender<TransportEvent>) {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            msg = stream.next() => {
                let Some(Ok(msg)) = msg else { break };
                let decoded = match msg {
                    Message::Binary(bytes) => decode_frame(&bytes),
                    Message::Text(text) => decode_json_frame(text.as_str()),
                    Message::Close(_) => break,
                    _ => continue,
                };
                match decoded {
                    Ok(frame) => {
                        if events_tx.send(TransportEvent::Frame(frame)).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!(error = %e, "transport: dropping undecodable frame"),
                }
            }
            out = out_rx.recv() => {
                let Some(frame) = out else {
                    // Transport replaced or dropped this connection.
                    if let Err(e) = sink.close().await {
                        debug!(error = %e, "transport: close failed");
                    }
                    return;
                };
                if let Err(e) = sink.send(Message::binary(encode_frame(&frame))).await {
                    warn!(error = %e, "transport: send failed");
                    break;
                }
            }
        }
    }

    info!("transport: disconnected");
    if events_tx.send(TransportEvent::Disconnected).await.is_err() {
        debug!("transport: no listener for disconnect");
    }
}

// =============================================================================
// LOCAL RELAY
// =============================================================================

/// In-process relay. Clone to share; every clone routes through one state.
#[derive(Clone, Default)]
pub struct LocalRelay {
    inner: Arc<Mutex<RelayState>>,
}

#[derive(Default)]
struct RelayState {
    next_client: u64,
    clients: HashMap<u64, LocalClient>,
    /// Room ID to member connections.
    rooms: HashMap<String, BTreeSet<u64>>,
}

struct LocalClient {
    tx: mpsc::Sender<TransportEvent>,
    connected: bool,
    /// Joined room and the identity it was joined with.
    joined: Option<(String, String)>,
}

impl LocalRelay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new connection to this relay.
    #[must_use]
    pub fn connect(&self) -> LocalTransport {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let mut state = self.lock();
        state.next_client += 1;
        let client_id = state.next_client;
        state.clients.insert(client_id, LocalClient { tx, connected: true, joined: None });
        drop(state);

        LocalTransport { relay: self.clone(), client_id, rx: tokio::sync::Mutex::new(rx) }
    }

    /// Distinct identities currently joined to `room`.
    #[must_use]
    pub fn roster(&self, room: &str) -> Vec<String> {
        self.lock().roster(room)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RelayState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, client_id: u64, mut frame: Frame) -> Result<(), TransportError> {
        let mut state = self.lock();
        if !state.clients.get(&client_id).is_some_and(|c| c.connected) {
            return Err(TransportError::Closed);
        }

        match frame.event.as_str() {
            events::JOIN => match SyncEvent::from_frame(&frame) {
                Ok(SyncEvent::Join(p)) => {
                    state.part(client_id);
                    state.join(client_id, p.whiteboard_id, p.email);
                }
                _ => state.reject(client_id, "join requires email and whiteboardId"),
            },
            events::LEAVE => state.part(client_id),
            event if events::is_peer_event(event) => {
                let Some((room, email)) = state.clients.get(&client_id).and_then(|c| c.joined.clone()) else {
                    state.reject(client_id, "must join a whiteboard first");
                    return Ok(());
                };
                if frame.room() != Some(room.as_str()) {
                    state.reject(client_id, "whiteboardId does not match joined whiteboard");
                    return Ok(());
                }
                if event == events::CURSOR_MOVE
                    && let Some(data) = frame.data.as_object_mut()
                {
                    data.insert("email".to_owned(), email.clone().into());
                }
                frame.from = Some(email);
                state.broadcast(&room, &frame, Some(client_id));
            }
            other => {
                let message = format!("unknown event: {other}");
                state.reject(client_id, &message);
            }
        }
        Ok(())
    }

    /// Simulate a network drop: part the room, notify the peer.
    fn drop_connection(&self, client_id: u64) {
        let mut state = self.lock();
        state.part(client_id);
        if let Some(client) = state.clients.get_mut(&client_id) {
            client.connected = false;
            if client.tx.try_send(TransportEvent::Disconnected).is_err() {
                debug!(client_id, "relay: disconnect notice dropped");
            }
        }
    }

    fn reconnect(&self, client_id: u64) -> Result<(), TransportError> {
        let mut state = self.lock();
        let Some(client) = state.clients.get_mut(&client_id) else {
            return Err(TransportError::Closed);
        };
        client.connected = true;
        Ok(())
    }

    fn close(&self, client_id: u64) {
        let mut state = self.lock();
        state.part(client_id);
        state.clients.remove(&client_id);
    }
}

impl RelayState {
    fn roster(&self, room: &str) -> Vec<String> {
        let Some(members) = self.rooms.get(room) else {
            return Vec::new();
        };
        let emails: BTreeSet<String> = members
            .iter()
            .filter_map(|id| self.clients.get(id))
            .filter_map(|c| c.joined.as_ref().map(|(_, email)| email.clone()))
            .collect();
        emails.into_iter().collect()
    }

    fn join(&mut self, client_id: u64, room: String, email: String) {
        let already_present = self.roster(&room).contains(&email);
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.joined = Some((room.clone(), email.clone()));
        }
        self.rooms.entry(room.clone()).or_default().insert(client_id);

        let roster = SyncEvent::UserList(self.roster(&room)).to_frame();
        self.send_to(client_id, roster);
        if !already_present {
            let joined = SyncEvent::UserJoined(email).to_frame();
            self.broadcast(&room, &joined, Some(client_id));
        }
    }

    fn part(&mut self, client_id: u64) {
        let Some((room, email)) = self.clients.get_mut(&client_id).and_then(|c| c.joined.take()) else {
            return;
        };
        if let Some(members) = self.rooms.get_mut(&room) {
            members.remove(&client_id);
            if members.is_empty() {
                self.rooms.remove(&room);
            }
        }
        if !self.roster(&room).contains(&email) {
            let gone = SyncEvent::UserDisconnected(email).to_frame();
            self.broadcast(&room, &gone, None);
        }
    }

    fn broadcast(&self, room: &str, frame: &Frame, exclude: Option<u64>) {
        let Some(members) = self.rooms.get(room) else {
            return;
        };
        for id in members {
            if exclude == Some(*id) {
                continue;
            }
            self.send_to(*id, frame.clone());
        }
    }

    fn send_to(&self, client_id: u64, frame: Frame) {
        let Some(client) = self.clients.get(&client_id) else {
            return;
        };
        // Best-effort, like the server: a full peer misses the frame.
        if client.tx.try_send(TransportEvent::Frame(frame)).is_err() {
            debug!(client_id, "relay: peer channel full, frame dropped");
        }
    }

    fn reject(&self, client_id: u64, message: &str) {
        let frame = SyncEvent::RelayError(RelayErrorPayload { message: message.to_owned() }).to_frame();
        self.send_to(client_id, frame);
    }
}

/// One connection to a [`LocalRelay`]. Dropping it closes the connection.
pub struct LocalTransport {
    relay: LocalRelay,
    client_id: u64,
    rx: tokio::sync::Mutex<mpsc::Receiver<TransportEvent>>,
}

impl LocalTransport {
    #[must_use]
    pub fn client_id(&self) -> u64 {
        self.client_id
    }

    /// Cut this connection as a network failure would.
    pub fn drop_connection(&self) {
        self.relay.drop_connection(self.client_id);
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.relay.handle(self.client_id, frame)
    }

    async fn recv(&self) -> Option<TransportEvent> {
        self.rx.lock().await.recv().await
    }

    async fn reconnect(&self) -> Result<(), TransportError> {
        self.relay.reconnect(self.client_id)
    }
}

impl Drop for LocalTransport {
    fn drop(&mut self) {
        self.relay.close(self.client_id);
    }
}
