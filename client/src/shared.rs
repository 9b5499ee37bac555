//! Engine handle shared between the session and the autosave worker.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use canvas::document::DocumentSnapshot;
use canvas::engine::EngineCore;
use canvas::raster::RasterError;

/// Cloneable handle to one [`EngineCore`].
///
/// The lock is held for a single apply or snapshot, never across an await.
#[derive(Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<EngineCore>>,
}

impl SharedEngine {
    #[must_use]
    pub fn new(engine: EngineCore) -> Self {
        Self { inner: Arc::new(Mutex::new(engine)) }
    }

    /// Lock the engine. A panic in another holder does not leave the engine
    /// unusable; its state is whatever the last apply left.
    pub fn lock(&self) -> MutexGuard<'_, EngineCore> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with the engine locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut EngineCore) -> R) -> R {
        f(&mut self.lock())
    }
}

/// Anything that can produce the body of a save.
pub trait SnapshotSource: Send + Sync {
    /// # Errors
    ///
    /// Returns [`RasterError`] if the raster layers cannot be encoded.
    fn snapshot(
        &self,
        name: Option<String>,
        created_by: Option<String>,
        now_ms: i64,
    ) -> Result<DocumentSnapshot, RasterError>;
}

impl SnapshotSource for SharedEngine {
    fn snapshot(
        &self,
        name: Option<String>,
        created_by: Option<String>,
        now_ms: i64,
    ) -> Result<DocumentSnapshot, RasterError> {
        self.lock().snapshot(name, created_by, now_ms)
    }
}
