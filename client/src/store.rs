//! Document store clients.
//!
//! DESIGN
//! ======
//! The persistence coordinator writes through the [`DocumentStore`] trait.
//! [`HttpDocumentStore`] talks to the server's `/api/documents` routes and
//! identifies the caller with the `x-user-email` header.
//! [`MemoryDocumentStore`] keeps documents in process and can be told to
//! fail writes, which is how autosave failure paths are tested.
//!
//! Role checks live on the server; the in-memory store does not enforce them.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use canvas::document::{CollaboratorRequest, DocumentSnapshot, DocumentSummary, Notes, Role, WhiteboardDocument};
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::autosave::DEFAULT_DOCUMENT_NAME;

/// Header carrying the caller's identity.
pub const USER_EMAIL_HEADER: &str = "x-user-email";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("not allowed to access document {0}")]
    Forbidden(String),
    #[error("unexpected status {status} for {path}")]
    Status { status: u16, path: String },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document under a store-assigned ID. The caller becomes its
    /// owner.
    async fn create(&self, snapshot: &DocumentSnapshot) -> Result<WhiteboardDocument, StoreError>;

    /// Save a snapshot as document `id`, creating it with the caller as
    /// owner if it does not exist yet. Later saves overwrite the canvas
    /// fields; last writer wins.
    async fn update(&self, id: &str, snapshot: &DocumentSnapshot) -> Result<WhiteboardDocument, StoreError>;

    async fn get(&self, id: &str) -> Result<WhiteboardDocument, StoreError>;

    /// Documents the caller owns or is a collaborator on.
    async fn list(&self) -> Result<Vec<DocumentSummary>, StoreError>;

    /// Share a document. `None` grants the editor role.
    async fn add_collaborator(&self, id: &str, email: &str, role: Option<Role>) -> Result<(), StoreError>;

    async fn get_notes(&self, id: &str) -> Result<Notes, StoreError>;

    async fn put_notes(&self, id: &str, notes: &Notes) -> Result<(), StoreError>;
}

// =============================================================================
// HTTP
// =============================================================================

pub struct HttpDocumentStore {
    client: reqwest::Client,
    base_url: String,
    email: String,
}

impl HttpDocumentStore {
    #[must_use]
    pub fn new(base_url: impl Into<String>, email: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client: reqwest::Client::new(), base_url, email: email.into() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder, path: &str) -> Result<T, StoreError> {
        let response = request.header(USER_EMAIL_HEADER, &self.email).send().await?;
        let response = check_status(response, path)?;
        Ok(response.json::<T>().await?)
    }

    async fn send_empty(&self, request: reqwest::RequestBuilder, path: &str) -> Result<(), StoreError> {
        let response = request.header(USER_EMAIL_HEADER, &self.email).send().await?;
        check_status(response, path)?;
        Ok(())
    }

    async fn put_json<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<reqwest::Response, StoreError> {
        let response = self
            .client
            .put(self.url(path))
            .header(USER_EMAIL_HEADER, &self.email)
            .json(body)
            .send()
            .await?;
        check_status(response, path)
    }
}

fn check_status(response: reqwest::Response, path: &str) -> Result<reqwest::Response, StoreError> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::NOT_FOUND => Err(StoreError::NotFound(path.to_owned())),
        StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => Err(StoreError::Forbidden(path.to_owned())),
        status => Err(StoreError::Status { status: status.as_u16(), path: path.to_owned() }),
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn create(&self, snapshot: &DocumentSnapshot) -> Result<WhiteboardDocument, StoreError> {
        let path = "/api/documents";
        self.send(self.client.post(self.url(path)).json(snapshot), path).await
    }

    async fn update(&self, id: &str, snapshot: &DocumentSnapshot) -> Result<WhiteboardDocument, StoreError> {
        let path = format!("/api/documents/{id}");
        Ok(self.put_json(&path, snapshot).await?.json().await?)
    }

    async fn get(&self, id: &str) -> Result<WhiteboardDocument, StoreError> {
        let path = format!("/api/documents/{id}");
        self.send(self.client.get(self.url(&path)), &path).await
    }

    async fn list(&self) -> Result<Vec<DocumentSummary>, StoreError> {
        let path = "/api/documents";
        self.send(self.client.get(self.url(path)), path).await
    }

    async fn add_collaborator(&self, id: &str, email: &str, role: Option<Role>) -> Result<(), StoreError> {
        let path = format!("/api/documents/{id}/collaborators");
        let body = CollaboratorRequest { email: email.to_owned(), role };
        self.send_empty(self.client.post(self.url(&path)).json(&body), &path).await
    }

    async fn get_notes(&self, id: &str) -> Result<Notes, StoreError> {
        let path = format!("/api/documents/{id}/notes");
        self.send(self.client.get(self.url(&path)), &path).await
    }

    async fn put_notes(&self, id: &str, notes: &Notes) -> Result<(), StoreError> {
        let path = format!("/api/documents/{id}/notes");
        self.put_json(&path, notes).await?;
        Ok(())
    }
}

// =============================================================================
// MEMORY
// =============================================================================

/// In-process store. Every created document is owned by `owner`.
pub struct MemoryDocumentStore {
    owner: String,
    docs: Mutex<HashMap<String, WhiteboardDocument>>,
    notes: Mutex<HashMap<String, Notes>>,
    next_id: AtomicUsize,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryDocumentStore {
    #[must_use]
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            docs: Mutex::new(HashMap::new()),
            notes: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(1),
            writes: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make subsequent creates and updates fail until switched off.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful creates and updates.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Seed a document as if it had been saved earlier.
    pub fn insert(&self, doc: WhiteboardDocument) {
        self.docs_lock().insert(doc.id.clone(), doc);
    }

    fn docs_lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, WhiteboardDocument>> {
        self.docs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create(&self, snapshot: &DocumentSnapshot) -> Result<WhiteboardDocument, StoreError> {
        self.check_writable()?;
        let id = format!("doc-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let doc = WhiteboardDocument::from_snapshot(id.clone(), &self.owner, snapshot.clone());
        self.docs_lock().insert(id, doc.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(doc)
    }

    async fn update(&self, id: &str, snapshot: &DocumentSnapshot) -> Result<WhiteboardDocument, StoreError> {
        self.check_writable()?;
        let mut docs = self.docs_lock();
        let doc = match docs.entry(id.to_owned()) {
            Entry::Occupied(entry) => {
                let doc = entry.into_mut();
                doc.apply_snapshot(snapshot.clone());
                doc
            }
            Entry::Vacant(entry) => {
                let mut doc = WhiteboardDocument::from_snapshot(id.to_owned(), &self.owner, snapshot.clone());
                if doc.name.trim().is_empty() {
                    DEFAULT_DOCUMENT_NAME.clone_into(&mut doc.name);
                }
                entry.insert(doc)
            }
        };
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(doc.clone())
    }

    async fn get(&self, id: &str) -> Result<WhiteboardDocument, StoreError> {
        self.docs_lock()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_owned()))
    }

    async fn list(&self) -> Result<Vec<DocumentSummary>, StoreError> {
        let docs = self.docs_lock();
        let mut out: Vec<DocumentSummary> = docs
            .values()
            .map(|doc| DocumentSummary {
                id: doc.id.clone(),
                name: doc.name.clone(),
                created_by: doc.created_by.clone(),
                timestamp: doc.timestamp,
                role: if doc.created_by == self.owner { Role::Owner } else { Role::Editor },
            })
            .collect();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn add_collaborator(&self, id: &str, email: &str, _role: Option<Role>) -> Result<(), StoreError> {
        let mut docs = self.docs_lock();
        let doc = docs.get_mut(id).ok_or_else(|| StoreError::NotFound(id.to_owned()))?;
        if !doc.shared_with.iter().any(|e| e == email) {
            doc.shared_with.push(email.to_owned());
        }
        Ok(())
    }

    async fn get_notes(&self, id: &str) -> Result<Notes, StoreError> {
        if !self.docs_lock().contains_key(id) {
            return Err(StoreError::NotFound(id.to_owned()));
        }
        let notes = self.notes.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(notes.get(id).cloned().unwrap_or_default())
    }

    async fn put_notes(&self, id: &str, notes: &Notes) -> Result<(), StoreError> {
        if !self.docs_lock().contains_key(id) {
            return Err(StoreError::NotFound(id.to_owned()));
        }
        self.notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_owned(), notes.clone());
        Ok(())
    }
}
