//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the database pool and a map of live whiteboard rooms. A room
//! exists only while at least one connection has joined it; the persisted
//! document outlives it.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use frames::Frame;
use sqlx::PgPool;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::rate_limit::CursorLimiter;

// =============================================================================
// ROOM STATE
// =============================================================================

/// One joined connection.
#[derive(Debug, Clone)]
pub struct RoomMember {
    pub email: String,
    pub tx: mpsc::Sender<Frame>,
}

/// Per-room live state: connections keyed by client ID.
#[derive(Debug, Default)]
pub struct RoomState {
    pub clients: HashMap<Uuid, RoomMember>,
}

impl RoomState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Distinct member identities, sorted. A user with several connections
    /// appears once.
    #[must_use]
    pub fn roster(&self) -> Vec<String> {
        let emails: BTreeSet<&str> = self.clients.values().map(|m| m.email.as_str()).collect();
        emails.into_iter().map(str::to_owned).collect()
    }

    #[must_use]
    pub fn has_email(&self, email: &str) -> bool {
        self.clients.values().any(|m| m.email == email)
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state. Clone is required by Axum; all inner fields
/// are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub rooms: Arc<RwLock<HashMap<String, RoomState>>>,
    pub cursor_limiter: CursorLimiter,
    pub relay: RelayConfig,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, relay: RelayConfig) -> Self {
        Self {
            pool,
            rooms: Arc::new(RwLock::new(HashMap::new())),
            cursor_limiter: CursorLimiter::from_config(&relay),
            relay,
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    fn member(email: &str) -> RoomMember {
        let (tx, _rx) = mpsc::channel(1);
        RoomMember { email: email.to_owned(), tx }
    }

    #[test]
    fn room_state_new_is_empty() {
        let room = RoomState::new();
        assert!(room.clients.is_empty());
        assert!(room.roster().is_empty());
    }

    #[test]
    fn roster_is_sorted_and_deduplicated() {
        let mut room = RoomState::new();
        room.clients.insert(Uuid::new_v4(), member("b@x.io"));
        room.clients.insert(Uuid::new_v4(), member("a@x.io"));
        room.clients.insert(Uuid::new_v4(), member("b@x.io"));
        assert_eq!(room.roster(), vec!["a@x.io".to_owned(), "b@x.io".to_owned()]);
        assert!(room.has_email("a@x.io"));
        assert!(!room.has_email("c@x.io"));
    }

    #[tokio::test]
    async fn app_state_starts_without_rooms() {
        let state = test_helpers::test_app_state();
        assert!(state.rooms.read().await.is_empty());
        assert_eq!(state.relay, RelayConfig::default());
    }
}
