//! WebSocket handler: room-scoped frame relay.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID and enters a `select!` loop:
//! - Incoming client frames → decode (protobuf binary or JSON text) → dispatch
//! - Frames from room peers → forward to the client as protobuf
//!
//! Dispatch is a plain function over the decoded frame so tests can drive it
//! without a socket. It returns frames meant only for the sender (errors);
//! everything else goes out through the room service.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → wait for `join {email, whiteboardId}`
//! 2. Joiner gets `userList`; peers get `userJoined`
//! 3. Peer events are stamped with `from` (and cursor payloads with the
//!    joined email) and fanned out to the room
//! 4. Close or `leave` → part room (`userDisconnected` on last connection)

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use canvas::protocol::{RelayErrorPayload, SyncEvent};
use frames::{Frame, events};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services::room;
use crate::state::AppState;

/// The room and identity a connection joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    pub room: String,
    pub email: String,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();

    // Per-connection channel for frames from room peers.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(state.relay.channel_capacity);
    let mut joined: Option<Joined> = None;

    info!(%client_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                let decoded = match msg {
                    Message::Binary(bytes) => frames::decode_frame(&bytes),
                    Message::Text(text) => frames::decode_json_frame(text.as_str()),
                    Message::Close(_) => break,
                    _ => continue,
                };
                let replies = match decoded {
                    Ok(frame) => process_inbound(&state, &mut joined, client_id, &client_tx, frame).await,
                    Err(e) => {
                        warn!(%client_id, error = %e, "ws: invalid inbound frame");
                        vec![relay_error(format!("invalid frame: {e}"))]
                    }
                };
                let mut send_failed = false;
                for frame in replies {
                    if send_frame(&mut socket, &frame).await.is_err() {
                        send_failed = true;
                        break;
                    }
                }
                if send_failed {
                    break;
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(Joined { room, .. }) = joined {
        room::part_room(&state, &room, client_id).await;
    }
    state.cursor_limiter.forget(client_id);
    info!(%client_id, "ws: client disconnected");
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), axum::Error> {
    if frame.event != events::CURSOR_MOVE {
        debug!(id = %frame.id, event = %frame.event, "ws: send frame");
    }
    socket.send(Message::Binary(frames::encode_frame(frame).into())).await
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Handle one decoded inbound frame and return frames for the sender only.
pub(crate) async fn process_inbound(
    state: &AppState,
    joined: &mut Option<Joined>,
    client_id: Uuid,
    client_tx: &mpsc::Sender<Frame>,
    mut frame: Frame,
) -> Vec<Frame> {
    match frame.event.as_str() {
        events::JOIN => {
            let Ok(SyncEvent::Join(payload)) = SyncEvent::from_frame(&frame) else {
                return vec![relay_error("join requires email and whiteboardId")];
            };
            let email = payload.email.trim().to_owned();
            let room_id = payload.whiteboard_id.trim().to_owned();
            if email.is_empty() || room_id.is_empty() {
                return vec![relay_error("join requires email and whiteboardId")];
            }

            if let Some(previous) = joined.take() {
                room::part_room(state, &previous.room, client_id).await;
            }
            room::join_room(state, &room_id, client_id, &email, client_tx.clone()).await;
            *joined = Some(Joined { room: room_id, email });
            Vec::new()
        }
        events::LEAVE => {
            if let Some(previous) = joined.take() {
                room::part_room(state, &previous.room, client_id).await;
            }
            Vec::new()
        }
        event if events::is_peer_event(event) => {
            let Some(Joined { room: room_id, email }) = joined.as_ref() else {
                return vec![relay_error("must join a whiteboard first")];
            };
            if frame.room() != Some(room_id.as_str()) {
                warn!(%client_id, %room_id, claimed = ?frame.room(), "ws: frame for another whiteboard");
                return vec![relay_error("whiteboardId does not match joined whiteboard")];
            }

            let is_cursor = event == events::CURSOR_MOVE;
            if is_cursor && state.cursor_limiter.check_and_record(client_id).is_err() {
                return Vec::new();
            }
            if !is_cursor {
                debug!(%client_id, %room_id, id = %frame.id, event = %frame.event, "ws: relay frame");
            }

            frame.from = Some(email.clone());
            frame.whiteboard_id = Some(room_id.clone());
            // Presence keys cursors on the payload email.
            if is_cursor && let Some(data) = frame.data.as_object_mut() {
                data.insert("email".to_owned(), email.clone().into());
            }
            room::broadcast(state, room_id, &frame, Some(client_id)).await;
            Vec::new()
        }
        other => {
            warn!(%client_id, event = %other, "ws: unknown event");
            vec![relay_error(format!("unknown event: {other}"))]
        }
    }
}

fn relay_error(message: impl Into<String>) -> Frame {
    SyncEvent::RelayError(RelayErrorPayload { message: message.into() }).to_frame()
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod ws_test;
