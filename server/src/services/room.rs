//! Room service: join/part, roster events, and broadcast.
//!
//! DESIGN
//! ======
//! Rooms are created on first join and evicted when their last connection
//! parts. Roster events follow the presence protocol:
//!
//! - the joiner receives the full roster (`userList`);
//! - everyone else receives `userJoined` when the identity is new to the room;
//! - `userDisconnected` goes out only when the last connection for an
//!   identity leaves.
//!
//! All sends are best-effort `try_send`; a full peer channel misses the frame.

use canvas::protocol::SyncEvent;
use frames::Frame;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::state::{AppState, RoomMember, RoomState};

/// Add `client_id` to `room` as `email`, sending the roster to the joiner and
/// announcing the identity to the others.
pub async fn join_room(state: &AppState, room: &str, client_id: Uuid, email: &str, tx: mpsc::Sender<Frame>) {
    let mut rooms = state.rooms.write().await;
    let room_state = rooms.entry(room.to_owned()).or_insert_with(RoomState::new);

    let already_present = room_state.has_email(email);
    room_state.clients.insert(client_id, RoomMember { email: email.to_owned(), tx: tx.clone() });

    let roster = SyncEvent::UserList(room_state.roster()).to_frame().with_whiteboard_id(room);
    send_best_effort(&tx, roster, client_id);

    if !already_present {
        let joined = SyncEvent::UserJoined(email.to_owned()).to_frame().with_whiteboard_id(room);
        send_to_room(room_state, &joined, Some(client_id));
    }

    info!(%room, %client_id, %email, clients = room_state.clients.len(), "client joined room");
}

/// Remove `client_id` from `room`. Evicts the room when it empties.
pub async fn part_room(state: &AppState, room: &str, client_id: Uuid) {
    let mut rooms = state.rooms.write().await;
    let Some(room_state) = rooms.get_mut(room) else {
        return;
    };
    let Some(member) = room_state.clients.remove(&client_id) else {
        return;
    };
    info!(%room, %client_id, remaining = room_state.clients.len(), "client left room");

    if !room_state.has_email(&member.email) {
        let gone = SyncEvent::UserDisconnected(member.email).to_frame().with_whiteboard_id(room);
        send_to_room(room_state, &gone, None);
    }

    if room_state.clients.is_empty() {
        rooms.remove(room);
        info!(%room, "evicted room");
    }
}

/// Current roster of `room` (empty when nobody has joined).
#[cfg(test)]
pub async fn list_members(state: &AppState, room: &str) -> Vec<String> {
    let rooms = state.rooms.read().await;
    rooms.get(room).map(RoomState::roster).unwrap_or_default()
}

// =============================================================================
// BROADCAST
// =============================================================================

/// Broadcast a frame to all clients in a room, optionally excluding one.
pub async fn broadcast(state: &AppState, room: &str, frame: &Frame, exclude: Option<Uuid>) {
    let rooms = state.rooms.read().await;
    let Some(room_state) = rooms.get(room) else {
        return;
    };
    send_to_room(room_state, frame, exclude);
}

fn send_to_room(room_state: &RoomState, frame: &Frame, exclude: Option<Uuid>) {
    for (client_id, member) in &room_state.clients {
        if exclude == Some(*client_id) {
            continue;
        }
        send_best_effort(&member.tx, frame.clone(), *client_id);
    }
}

fn send_best_effort(tx: &mpsc::Sender<Frame>, frame: Frame, client_id: Uuid) {
    if tx.try_send(frame).is_err() {
        debug!(%client_id, "room: peer channel full or closed, frame dropped");
    }
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
