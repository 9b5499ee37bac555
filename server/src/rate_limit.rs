//! Per-connection cursor throttle.
//!
//! DESIGN
//! ======
//! Sliding-window counters backed by `HashMap<Uuid, VecDeque<Instant>>`, one
//! deque per websocket connection. A cursor frame is admitted when fewer than
//! `limit` frames were admitted in the trailing window. Rejected frames are
//! not recorded, so a client that keeps flooding regains throughput as soon
//! as its oldest admitted frame ages out.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::config::RelayConfig;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("cursor rate limit exceeded (max {limit} per {window_ms}ms)")]
pub struct CursorLimitExceeded {
    pub limit: usize,
    pub window_ms: u128,
}

#[derive(Clone)]
pub struct CursorLimiter {
    inner: Arc<Mutex<HashMap<Uuid, VecDeque<Instant>>>>,
    limit: usize,
    window: Duration,
}

impl CursorLimiter {
    #[must_use]
    pub fn new(limit: usize, window: Duration) -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())), limit, window }
    }

    #[must_use]
    pub fn from_config(relay: &RelayConfig) -> Self {
        Self::new(relay.cursor_rate_limit, relay.cursor_rate_window)
    }

    /// Admit one cursor frame from `client_id`, or report the limit.
    ///
    /// # Errors
    ///
    /// Returns [`CursorLimitExceeded`] when the window is full.
    pub fn check_and_record(&self, client_id: Uuid) -> Result<(), CursorLimitExceeded> {
        self.check_and_record_at(client_id, Instant::now())
    }

    fn check_and_record_at(&self, client_id: Uuid, now: Instant) -> Result<(), CursorLimitExceeded> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let deque = inner.entry(client_id).or_default();
        prune_window(deque, now, self.window);
        if deque.len() >= self.limit {
            return Err(CursorLimitExceeded { limit: self.limit, window_ms: self.window.as_millis() });
        }
        deque.push_back(now);
        Ok(())
    }

    /// Drop the history of a closed connection.
    pub fn forget(&self, client_id: Uuid) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).remove(&client_id);
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for CursorLimiter {
    fn default() -> Self {
        Self::from_config(&RelayConfig::default())
    }
}

fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = deque.front() {
        if now.duration_since(front) >= window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
