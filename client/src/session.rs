//! Whiteboard session: one engine bound to one room, transport and store.
//!
//! DESIGN
//! ======
//! Local input goes through the session: the engine mutates and rasterizes
//! synchronously, then each returned action is broadcast and mutating ones
//! trigger autosave. Inbound frames are decoded into [`SyncEvent`]s and
//! replayed into the engine. The engine lock is never held across an await.
//!
//! LIFECYCLE
//! =========
//! 1. Optionally load an existing document (objects, ink, camera).
//! 2. `join` the room; the relay replies with the roster.
//! 3. `run` (or `poll` repeatedly) applies inbound events.
//! 4. On disconnect: clear presence, pause autosave, reconnect with backoff,
//!    rejoin with the session identity, resume autosave. Edits made
//!    during the gap are saved but not retransmitted.
//! 5. `shutdown` leaves the room and flushes the last autosave.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::Arc;
use std::time::Duration;

use canvas::camera::Point;
use canvas::doc::{ObjectId, ObjectRef};
use canvas::document::{Role, WhiteboardDocument};
use canvas::engine::{Action, EngineCore};
use canvas::input::Tool;
use canvas::protocol::SyncEvent;
use canvas::raster::RasterError;
use tracing::{debug, info, warn};

use crate::autosave::{PersistenceCoordinator, PersistenceError, SaveNotice};
use crate::config::ClientConfig;
use crate::identity::{self, IdentityError, JsonFileStore, KeyValueStore};
use crate::shared::SharedEngine;
use crate::store::{DocumentStore, HttpDocumentStore, StoreError};
use crate::transport::{Transport, TransportError, TransportEvent, WsTransport};

const RECONNECT_INITIAL: Duration = Duration::from_millis(1000);
const RECONNECT_MAX: Duration = Duration::from_millis(10_000);

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to load document image: {0}")]
    Raster(#[from] RasterError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// What one inbound event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    /// Applied to the engine; `true` if the scene changed.
    Applied(bool),
    /// Undecodable payload, logged and dropped.
    Skipped,
    /// The transport dropped and the session has rejoined.
    Reconnected,
}

/// The collaborators a session is built from.
pub struct SessionParts {
    pub whiteboard_id: String,
    pub email: String,
    pub transport: Arc<dyn Transport>,
    pub store: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn KeyValueStore>,
    pub autosave_debounce: Duration,
}

pub struct WhiteboardSession {
    whiteboard_id: String,
    email: String,
    engine: SharedEngine,
    transport: Arc<dyn Transport>,
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn KeyValueStore>,
    autosave: PersistenceCoordinator,
}

impl WhiteboardSession {
    /// Session over a blank canvas. Saves go to the document keyed by the
    /// room ID; the first one creates it.
    #[must_use]
    pub fn new(parts: SessionParts, engine: EngineCore) -> Self {
        let document_id = parts.whiteboard_id.clone();
        Self::build(parts, engine, Some(document_id))
    }

    /// Session over an existing document, loaded before joining.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Raster`] if the stored ink cannot be decoded.
    pub fn open(parts: SessionParts, mut engine: EngineCore, doc: &WhiteboardDocument) -> Result<Self, SessionError> {
        engine.load_document(doc)?;
        info!(document_id = %doc.id, text_boxes = doc.text_boxes.len(), shapes = doc.shapes.len(), "document loaded");
        Ok(Self::build(parts, engine, Some(doc.id.clone())))
    }

    /// Connect over websocket and HTTP using `config`, load the whiteboard's
    /// document (keyed by `whiteboard_id`) if it exists, and join its room.
    ///
    /// # Errors
    ///
    /// Fails if the relay is unreachable, the store errors on anything other
    /// than a missing document, or the stored image is corrupt.
    pub async fn connect(config: &ClientConfig, whiteboard_id: &str, email: &str) -> Result<Self, SessionError> {
        let transport = WsTransport::connect(config.relay_url.as_str()).await?;
        let store = Arc::new(HttpDocumentStore::new(config.api_url.as_str(), email));
        let parts = SessionParts {
            whiteboard_id: whiteboard_id.to_owned(),
            email: email.to_owned(),
            transport: Arc::new(transport),
            store: store.clone(),
            identity: Arc::new(JsonFileStore::new(config.identity_path.clone())),
            autosave_debounce: config.autosave_debounce,
        };
        let engine = EngineCore::new(config.canvas_width, config.canvas_height);

        let session = match store.get(whiteboard_id).await {
            Ok(doc) => Self::open(parts, engine, &doc)?,
            Err(StoreError::NotFound(_)) => Self::new(parts, engine),
            Err(e) => return Err(e.into()),
        };
        session.join().await?;
        Ok(session)
    }

    fn build(parts: SessionParts, engine: EngineCore, document_id: Option<String>) -> Self {
        let engine = SharedEngine::new(engine);
        let autosave = PersistenceCoordinator::spawn(
            Arc::clone(&parts.store),
            Arc::new(engine.clone()),
            parts.email.clone(),
            document_id,
            parts.autosave_debounce,
        );
        Self {
            whiteboard_id: parts.whiteboard_id,
            email: parts.email,
            engine,
            transport: parts.transport,
            store: parts.store,
            identity: parts.identity,
            autosave,
        }
    }

    // =========================================================================
    // ROOM
    // =========================================================================

    /// Join the room and remember who joined.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the join frame cannot be sent.
    pub async fn join(&self) -> Result<(), SessionError> {
        if let Err(e) = identity::remember(self.identity.as_ref(), &self.email, Some(&self.whiteboard_id)) {
            warn!(error = %e, "could not remember identity");
        }
        self.transport.join(&self.whiteboard_id, &self.email).await?;
        info!(whiteboard_id = %self.whiteboard_id, email = %self.email, "joined whiteboard");
        Ok(())
    }

    /// Receive and apply one inbound event. `None` once the transport is gone.
    pub async fn poll(&self) -> Option<SessionSignal> {
        let event = self.transport.recv().await?;
        Some(self.handle_event(event).await)
    }

    /// Apply inbound events until the transport closes.
    pub async fn run(&self) {
        while self.poll().await.is_some() {}
        info!(whiteboard_id = %self.whiteboard_id, "session transport closed");
    }

    async fn handle_event(&self, event: TransportEvent) -> SessionSignal {
        match event {
            TransportEvent::Frame(frame) => match SyncEvent::from_frame(&frame) {
                Ok(event) => SessionSignal::Applied(self.engine.with(|e| e.apply_event(&event))),
                Err(e) => {
                    warn!(error = %e, from = ?frame.from, "skipping inbound frame");
                    SessionSignal::Skipped
                }
            },
            TransportEvent::Disconnected => {
                self.engine.with(|e| e.presence.clear());
                self.autosave.pause();
                warn!(whiteboard_id = %self.whiteboard_id, "transport disconnected");
                self.recover().await;
                SessionSignal::Reconnected
            }
        }
    }

    /// Reconnect with exponential backoff, then rejoin for a fresh roster.
    async fn recover(&self) {
        let mut backoff = RECONNECT_INITIAL;
        loop {
            tokio::time::sleep(backoff).await;
            match self.rejoin().await {
                Ok(()) => break,
                Err(e) => {
                    warn!(error = %e, retry_in = ?backoff, "reconnect failed");
                    backoff = (backoff * 2).min(RECONNECT_MAX);
                }
            }
        }
        self.autosave.resume();
    }

    async fn rejoin(&self) -> Result<(), SessionError> {
        self.transport.reconnect().await?;
        let email = self.rejoin_identity();
        self.transport.join(&self.whiteboard_id, &email).await?;
        info!(whiteboard_id = %self.whiteboard_id, %email, "rejoined whiteboard");
        Ok(())
    }

    /// The session's own identity; the remembered one only when it has none.
    fn rejoin_identity(&self) -> String {
        if !self.email.trim().is_empty() {
            return self.email.clone();
        }
        match identity::last_identity(self.identity.as_ref()) {
            Ok(Some(email)) => email,
            Ok(None) => self.email.clone(),
            Err(e) => {
                warn!(error = %e, "identity store unreadable");
                self.email.clone()
            }
        }
    }

    /// Leave the room and flush pending changes.
    pub async fn shutdown(&self) {
        if let Err(e) = self.transport.leave(&self.whiteboard_id).await {
            debug!(error = %e, "leave not delivered");
        }
        self.autosave.shutdown().await;
    }

    // =========================================================================
    // LOCAL INPUT
    // =========================================================================

    /// Broadcast each action and trigger autosave for mutations.
    pub async fn dispatch(&self, actions: Vec<Action>) {
        let mut mutated = false;
        for action in actions {
            mutated |= action.is_mutation();
            let Some(event) = action.to_event(&self.whiteboard_id) else {
                continue;
            };
            if let Err(e) = self.transport.broadcast(&event).await {
                warn!(error = %e, event = event.event_name(), "broadcast failed; change kept locally");
            }
        }
        if mutated {
            self.autosave.trigger();
        }
    }

    pub async fn pointer_down(&self, screen: Point) {
        let actions = self.engine.with(|e| e.on_pointer_down(screen, frames::now_ms()));
        self.dispatch(actions).await;
    }

    pub async fn pointer_move(&self, screen: Point) {
        let actions = self.engine.with(|e| e.on_pointer_move(screen));
        self.dispatch(actions).await;
    }

    pub async fn pointer_up(&self, screen: Point) {
        let actions = self.engine.with(|e| e.on_pointer_up(screen));
        self.dispatch(actions).await;
    }

    pub fn set_tool(&self, tool: Tool) {
        self.engine.with(|e| e.set_tool(tool));
    }

    /// Local only: editing state is never broadcast.
    pub async fn begin_text_edit(&self, id: ObjectId) {
        let actions = self.engine.with(|e| e.begin_text_edit(id));
        self.dispatch(actions).await;
    }

    pub async fn commit_text(&self, id: ObjectId, text: &str) {
        let action = self.engine.with(|e| e.commit_text(id, text));
        self.dispatch(action.into_iter().collect()).await;
    }

    pub async fn rotate_step(&self, target: ObjectRef) {
        let action = self.engine.with(|e| e.rotate_step(target));
        self.dispatch(action.into_iter().collect()).await;
    }

    /// Share the pointer position. Cursor traffic never triggers a save.
    pub async fn move_cursor(&self, screen: Point) {
        let payload = self.engine.with(|e| e.cursor_payload(screen, &self.email, &self.whiteboard_id));
        if let Err(e) = self.transport.broadcast(&SyncEvent::CursorMove(payload)).await {
            debug!(error = %e, "cursor update dropped");
        }
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    /// Save now; creates the document on first save.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the snapshot or write fails.
    pub async fn request_save(&self, name: Option<String>) -> Result<String, PersistenceError> {
        self.autosave.request_save(name).await
    }

    /// # Errors
    ///
    /// Returns [`PersistenceError::NoDocument`] before the first save.
    pub async fn add_collaborator(&self, email: &str, role: Option<Role>) -> Result<(), PersistenceError> {
        self.autosave.add_collaborator(email, role).await
    }

    #[must_use]
    pub fn save_notices(&self) -> tokio::sync::broadcast::Receiver<SaveNotice> {
        self.autosave.subscribe()
    }

    #[must_use]
    pub fn document_id(&self) -> Option<String> {
        self.autosave.document_id()
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[must_use]
    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    #[must_use]
    pub fn whiteboard_id(&self) -> &str {
        &self.whiteboard_id
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn roster(&self) -> Vec<String> {
        self.engine.with(|e| e.presence.roster().map(str::to_owned).collect())
    }
}
