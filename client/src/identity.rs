//! Last-used identity, kept in a small key-value store.
//!
//! The next launch, or a session started without an identity, rejoins with
//! the remembered email instead of asking the identity provider again. A
//! live session always reconnects as itself.

#[cfg(test)]
#[path = "identity_test.rs"]
mod identity_test;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

/// Key holding the email of the last signed-in user.
pub const USER_EMAIL_KEY: &str = "userEmail";
/// Key holding the last whiteboard the user joined.
pub const LAST_WHITEBOARD_KEY: &str = "lastWhiteboardId";

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("identity store is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait KeyValueStore: Send + Sync {
    /// # Errors
    ///
    /// Returns [`IdentityError`] if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, IdentityError>;

    /// # Errors
    ///
    /// Returns [`IdentityError`] if the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), IdentityError>;

    /// # Errors
    ///
    /// Returns [`IdentityError`] if the backing storage cannot be written.
    fn remove(&self, key: &str) -> Result<(), IdentityError>;
}

/// Remember `email` (and optionally the whiteboard) for the next join.
///
/// # Errors
///
/// Propagates storage failures.
pub fn remember(store: &dyn KeyValueStore, email: &str, whiteboard_id: Option<&str>) -> Result<(), IdentityError> {
    store.set(USER_EMAIL_KEY, email)?;
    if let Some(id) = whiteboard_id {
        store.set(LAST_WHITEBOARD_KEY, id)?;
    }
    Ok(())
}

/// The remembered email, if any.
///
/// # Errors
///
/// Propagates storage failures.
pub fn last_identity(store: &dyn KeyValueStore) -> Result<Option<String>, IdentityError> {
    Ok(store.get(USER_EMAIL_KEY)?.filter(|e| !e.trim().is_empty()))
}

/// Forget the signed-in user.
///
/// # Errors
///
/// Propagates storage failures.
pub fn forget(store: &dyn KeyValueStore) -> Result<(), IdentityError> {
    store.remove(USER_EMAIL_KEY)?;
    store.remove(LAST_WHITEBOARD_KEY)
}

// =============================================================================
// JSON FILE
// =============================================================================

/// A JSON object on disk, rewritten on every change.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<BTreeMap<String, String>, IdentityError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, map: &BTreeMap<String, String>) -> Result<(), IdentityError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(map)?)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), keys = map.len(), "identity store written");
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, IdentityError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), IdentityError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.read()?;
        map.insert(key.to_owned(), value.to_owned());
        self.write(&map)
    }

    fn remove(&self, key: &str) -> Result<(), IdentityError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.read()?;
        if map.remove(key).is_some() {
            self.write(&map)?;
        }
        Ok(())
    }
}

// =============================================================================
// MEMORY
// =============================================================================

#[derive(Default)]
pub struct MemoryKeyValueStore {
    map: Mutex<BTreeMap<String, String>>,
}

impl MemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, IdentityError> {
        Ok(self.map.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), IdentityError> {
        self.map
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), IdentityError> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner).remove(key);
        Ok(())
    }
}
