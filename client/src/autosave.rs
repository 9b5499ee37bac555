//! Persistence coordinator: explicit saves and debounced autosave.
//!
//! DESIGN
//! ======
//! One background worker owns every write, so writes never overlap and an
//! in-flight write is never cancelled. The worker `select!`s over a command
//! channel and a single debounce deadline:
//!
//! - `trigger` marks the document dirty and re-arms the deadline. Triggers
//!   that arrive during a write queue up behind it, so the next debounce
//!   starts after the write completes.
//! - When the deadline passes, the worker snapshots the engine and writes.
//!   The snapshot is taken as the write starts, so it reflects the final
//!   state of a burst.
//! - `pause` (transport down) disarms the deadline but remembers dirtiness;
//!   `resume` re-arms it.
//! - Without a document ID the first successful write creates one under a
//!   store-assigned ID. With one (a session passes its room ID) every write
//!   goes through `update`, which creates the document on first save.
//!
//! ERROR HANDLING
//! ==============
//! A failed autosave is logged and published as [`SaveNotice::Failed`]. It is
//! not retried; the next trigger writes the whole state again. Explicit saves
//! return their error to the caller and publish the same notice.

#[cfg(test)]
#[path = "autosave_test.rs"]
mod autosave_test;

use std::future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use canvas::document::Role;
use canvas::raster::RasterError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::shared::SnapshotSource;
use crate::store::{DocumentStore, StoreError};

/// Name given to a document first saved without one.
pub const DEFAULT_DOCUMENT_NAME: &str = "Untitled Whiteboard";

const NOTICE_CAPACITY: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to encode canvas: {0}")]
    Snapshot(#[from] RasterError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("whiteboard has not been saved yet")]
    NoDocument,
    #[error("persistence worker has stopped")]
    Stopped,
}

/// Transient outcome of a write, for a status line or toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveNotice {
    Saved { document_id: String, timestamp: i64 },
    Failed { message: String },
}

enum Command {
    Trigger,
    Save { name: Option<String>, reply: oneshot::Sender<Result<String, PersistenceError>> },
    Pause,
    Resume,
    Shutdown,
}

pub struct PersistenceCoordinator {
    tx: mpsc::UnboundedSender<Command>,
    notices: broadcast::Sender<SaveNotice>,
    document_id: Arc<Mutex<Option<String>>>,
    store: Arc<dyn DocumentStore>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PersistenceCoordinator {
    /// Start the worker. `document_id` is the existing document to update,
    /// or `None` to create one on the first write (owned by `owner`).
    #[must_use]
    pub fn spawn(
        store: Arc<dyn DocumentStore>,
        source: Arc<dyn SnapshotSource>,
        owner: impl Into<String>,
        document_id: Option<String>,
        debounce: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        let document_id = Arc::new(Mutex::new(document_id));

        let worker = Worker {
            store: Arc::clone(&store),
            source,
            owner: owner.into(),
            document_id: Arc::clone(&document_id),
            notices: notices.clone(),
            debounce,
        };
        let handle = tokio::spawn(worker.run(rx));

        Self { tx, notices, document_id, store, worker: Mutex::new(Some(handle)) }
    }

    /// Note a mutation; a write follows once the debounce window is quiet.
    pub fn trigger(&self) {
        self.command(Command::Trigger);
    }

    /// Write now, bypassing the debounce. Returns the document ID.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the snapshot or the write fails.
    pub async fn request_save(&self, name: Option<String>) -> Result<String, PersistenceError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Save { name, reply })
            .map_err(|_| PersistenceError::Stopped)?;
        rx.await.map_err(|_| PersistenceError::Stopped)?
    }

    /// Share the saved document with `email`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NoDocument`] before the first save, or the
    /// store's error.
    pub async fn add_collaborator(&self, email: &str, role: Option<Role>) -> Result<(), PersistenceError> {
        let Some(id) = self.document_id() else {
            return Err(PersistenceError::NoDocument);
        };
        self.store.add_collaborator(&id, email, role).await?;
        info!(document_id = %id, %email, "collaborator added");
        Ok(())
    }

    pub fn pause(&self) {
        self.command(Command::Pause);
    }

    pub fn resume(&self) {
        self.command(Command::Resume);
    }

    #[must_use]
    pub fn document_id(&self) -> Option<String> {
        self.document_id.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SaveNotice> {
        self.notices.subscribe()
    }

    /// Flush a pending autosave and stop the worker.
    pub async fn shutdown(&self) {
        self.command(Command::Shutdown);
        let handle = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "persistence worker ended abnormally");
            }
        }
    }

    fn command(&self, command: Command) {
        if self.tx.send(command).is_err() {
            debug!("persistence worker stopped; command dropped");
        }
    }
}

// =============================================================================
// WORKER
// =============================================================================

struct Worker {
    store: Arc<dyn DocumentStore>,
    source: Arc<dyn SnapshotSource>,
    owner: String,
    document_id: Arc<Mutex<Option<String>>>,
    notices: broadcast::Sender<SaveNotice>,
    debounce: Duration,
}

impl Worker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<Command>) {
        let mut dirty = false;
        let mut paused = false;
        let mut deadline: Option<Instant> = None;

        loop {
            let timer = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => future::pending::<()>().await,
                }
            };

            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(Command::Trigger) => {
                        dirty = true;
                        if !paused {
                            deadline = Some(Instant::now() + self.debounce);
                        }
                    }
                    Some(Command::Pause) => {
                        paused = true;
                        deadline = None;
                    }
                    Some(Command::Resume) => {
                        paused = false;
                        if dirty {
                            deadline = Some(Instant::now() + self.debounce);
                        }
                    }
                    Some(Command::Save { name, reply }) => {
                        let result = self.save(name).await;
                        if result.is_ok() {
                            dirty = false;
                            deadline = None;
                        }
                        if reply.send(result).is_err() {
                            debug!("save requester went away");
                        }
                    }
                    Some(Command::Shutdown) | None => {
                        // The store is reachable even when the relay is not.
                        if dirty {
                            self.autosave().await;
                        }
                        break;
                    }
                },
                () = timer => {
                    deadline = None;
                    dirty = false;
                    self.autosave().await;
                }
            }
        }
    }

    async fn autosave(&self) {
        if let Err(e) = self.save(None).await {
            warn!(error = %e, "autosave failed");
        }
    }

    async fn save(&self, name: Option<String>) -> Result<String, PersistenceError> {
        let result = self.write(name).await;
        let notice = match &result {
            Ok(document_id) => SaveNotice::Saved { document_id: document_id.clone(), timestamp: frames::now_ms() },
            Err(e) => SaveNotice::Failed { message: e.to_string() },
        };
        // No subscribers is fine.
        let _ = self.notices.send(notice);
        result
    }

    async fn write(&self, name: Option<String>) -> Result<String, PersistenceError> {
        let existing = self.document_id.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let now = frames::now_ms();

        match existing {
            Some(id) => {
                let snapshot = self.source.snapshot(name, None, now)?;
                self.store.update(&id, &snapshot).await?;
                debug!(document_id = %id, "document updated");
                Ok(id)
            }
            None => {
                let name = name.unwrap_or_else(|| DEFAULT_DOCUMENT_NAME.to_owned());
                let snapshot = self.source.snapshot(Some(name), Some(self.owner.clone()), now)?;
                let doc = self.store.create(&snapshot).await?;
                info!(document_id = %doc.id, owner = %self.owner, "document created");
                *self.document_id.lock().unwrap_or_else(PoisonError::into_inner) = Some(doc.id.clone());
                Ok(doc.id)
            }
        }
    }
}
