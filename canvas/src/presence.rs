//! Presence tracker: who is in the room and where their cursors are.
//!
//! DESIGN
//! ======
//! Per-user lifecycle is `absent → joined → active → absent`. The roster is
//! driven entirely by relay events (`userList`, `userJoined`,
//! `userDisconnected`); cursor entries are driven by `cursorMove`. A cursor
//! entry exists only while its owner is in the roster: moves from unknown
//! users are ignored and removing a user removes their cursor in the same
//! step. A transport drop clears everything, since the next join delivers a
//! fresh roster.

#[cfg(test)]
#[path = "presence_test.rs"]
mod presence_test;

use std::collections::{BTreeMap, BTreeSet};

use crate::camera::Point;
use crate::color::{Rgba, to_hex};

/// Palette cursor colors are drawn from.
const CURSOR_PALETTE: [Rgba; 8] = [
    [230, 25, 75, 255],
    [60, 180, 75, 255],
    [0, 130, 200, 255],
    [245, 130, 48, 255],
    [145, 30, 180, 255],
    [70, 240, 240, 255],
    [240, 50, 230, 255],
    [128, 128, 0, 255],
];

/// Last known cursor of one remote user.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorState {
    pub user_email: String,
    /// World coordinates.
    pub x: f64,
    pub y: f64,
    /// `#rrggbb`, derived from the email.
    pub color: String,
    /// The sender's zoom when the cursor moved.
    pub room_zoom: f64,
    /// The sender's pan when the cursor moved.
    pub room_pan: Point,
}

/// Deterministic cursor color for an identity (FNV-1a over the bytes).
#[must_use]
pub fn cursor_color(email: &str) -> String {
    let hash = email
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325_u64, |h, b| (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3));
    let len = CURSOR_PALETTE.len() as u64;
    let idx = usize::try_from(hash % len).unwrap_or(0);
    to_hex(CURSOR_PALETTE[idx])
}

/// Roster and cursors for one room.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    roster: BTreeSet<String>,
    cursors: BTreeMap<String, CursorState>,
}

impl PresenceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the roster with a full list from the relay. Cursors of users
    /// no longer present are dropped.
    pub fn apply_user_list(&mut self, users: impl IntoIterator<Item = String>) {
        self.roster = users.into_iter().collect();
        let roster = &self.roster;
        self.cursors.retain(|email, _| roster.contains(email));
    }

    /// Add one user. Returns `true` if they were not already present.
    pub fn user_joined(&mut self, email: &str) -> bool {
        self.roster.insert(email.to_owned())
    }

    /// Remove a user and their cursor. Returns `true` if anything changed.
    pub fn user_disconnected(&mut self, email: &str) -> bool {
        let was_member = self.roster.remove(email);
        let had_cursor = self.cursors.remove(email).is_some();
        was_member || had_cursor
    }

    /// Record a cursor move. Ignored (returns `false`) for non-members.
    pub fn cursor_moved(&mut self, email: &str, at: Point, zoom: f64, pan: Point) -> bool {
        if !self.roster.contains(email) {
            return false;
        }
        let entry = self.cursors.entry(email.to_owned()).or_insert_with(|| CursorState {
            user_email: email.to_owned(),
            x: at.x,
            y: at.y,
            color: cursor_color(email),
            room_zoom: zoom,
            room_pan: pan,
        });
        entry.x = at.x;
        entry.y = at.y;
        entry.room_zoom = zoom;
        entry.room_pan = pan;
        true
    }

    /// Forget everything (transport disconnected).
    pub fn clear(&mut self) {
        self.roster.clear();
        self.cursors.clear();
    }

    /// Members in identity order.
    pub fn roster(&self) -> impl Iterator<Item = &str> {
        self.roster.iter().map(String::as_str)
    }

    #[must_use]
    pub fn is_member(&self, email: &str) -> bool {
        self.roster.contains(email)
    }

    pub fn cursors(&self) -> impl Iterator<Item = &CursorState> {
        self.cursors.values()
    }

    #[must_use]
    pub fn cursor(&self, email: &str) -> Option<&CursorState> {
        self.cursors.get(email)
    }
}
