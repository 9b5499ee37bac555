//! Shared frame envelope and protobuf codec for the realtime relay.
//!
//! This crate owns the wire representation used by `server`, `canvas` and
//! `client`. Payloads stay flexible (`serde_json::Value`) so the relay can
//! forward events it does not interpret, while encoding over protobuf keeps
//! the hot path (strokes, cursors) compact.

use std::time::{SystemTime, UNIX_EPOCH};

use prost::Message;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Event names used on the realtime channel.
pub mod events {
    /// Client asks the relay to join a whiteboard room.
    pub const JOIN: &str = "join";
    /// Client leaves its current room without closing the connection.
    pub const LEAVE: &str = "leave";
    /// Relay sends the full member roster to a joining client.
    pub const USER_LIST: &str = "userList";
    /// Relay announces a new member to everyone else in the room.
    pub const USER_JOINED: &str = "userJoined";
    /// Relay announces that a member's last connection went away.
    pub const USER_DISCONNECTED: &str = "userDisconnected";
    /// One freehand or eraser segment.
    pub const DRAW: &str = "draw";
    pub const ADD_TEXT_BOX: &str = "addTextBox";
    pub const UPDATE_TEXT_BOX: &str = "updateTextBox";
    pub const ADD_SHAPE: &str = "addShape";
    pub const UPDATE_SHAPE: &str = "updateShape";
    /// Ephemeral cursor position; throttled by the relay.
    pub const CURSOR_MOVE: &str = "cursorMove";
    /// Relay rejected a frame (malformed, or not scoped to the joined room).
    pub const RELAY_ERROR: &str = "relay:error";

    /// Events a client may broadcast to its room peers.
    pub const PEER_EVENTS: [&str; 6] = [DRAW, ADD_TEXT_BOX, UPDATE_TEXT_BOX, ADD_SHAPE, UPDATE_SHAPE, CURSOR_MOVE];

    /// Whether `event` is relayed verbatim to the other members of a room.
    #[must_use]
    pub fn is_peer_event(event: &str) -> bool {
        PEER_EVENTS.contains(&event)
    }
}

/// Payload key carrying the room identifier inside room-scoped events.
pub const WHITEBOARD_ID_KEY: &str = "whiteboardId";

/// Error returned by [`decode_frame`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The raw bytes could not be decoded as a protobuf `WireFrame`.
    #[error("failed to decode protobuf frame: {0}")]
    Decode(#[from] prost::DecodeError),
    /// The text could not be parsed as a JSON frame.
    #[error("failed to decode json frame: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single message on the realtime wire protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    /// Unique identifier for this frame (UUID string).
    pub id: String,
    /// Milliseconds since the Unix epoch when the frame was created.
    pub ts: i64,
    /// Room this frame is scoped to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whiteboard_id: Option<String>,
    /// Sender identity, stamped by the relay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Event name, e.g. `"draw"`.
    pub event: String,
    /// Arbitrary JSON payload.
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    /// Create a frame for `event` carrying `data`.
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ts: now_ms(),
            whiteboard_id: None,
            from: None,
            event: event.into(),
            data,
        }
    }

    #[must_use]
    pub fn with_whiteboard_id(mut self, whiteboard_id: impl Into<String>) -> Self {
        self.whiteboard_id = Some(whiteboard_id.into());
        self
    }

    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Room named by the frame: the envelope field, else the payload's
    /// `whiteboardId` key.
    #[must_use]
    pub fn room(&self) -> Option<&str> {
        if let Some(id) = self.whiteboard_id.as_deref() {
            return Some(id);
        }
        self.data.get(WHITEBOARD_ID_KEY).and_then(Value::as_str)
    }
}

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

/// Encode a frame into protobuf bytes.
#[must_use]
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let wire = frame_to_wire(frame);

    let mut out = Vec::with_capacity(wire.encoded_len());
    // Encoding into a growable Vec cannot hit `BufferTooSmall`.
    wire.encode(&mut out).unwrap_or_default();
    out
}

/// Decode protobuf bytes into a frame.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed bytes.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    let wire = WireFrame::decode(bytes)?;
    Ok(wire_to_frame(wire))
}

/// Decode a JSON text frame. Text frames are accepted from lightweight
/// clients; the relay always answers in protobuf.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if the text is not a frame.
pub fn decode_json_frame(text: &str) -> Result<Frame, CodecError> {
    Ok(serde_json::from_str(text)?)
}

fn frame_to_wire(frame: &Frame) -> WireFrame {
    WireFrame {
        id: frame.id.clone(),
        ts: frame.ts,
        whiteboard_id: frame.whiteboard_id.clone(),
        from: frame.from.clone(),
        event: frame.event.clone(),
        data: Some(json_to_proto_value(&frame.data)),
    }
}

fn wire_to_frame(wire: WireFrame) -> Frame {
    Frame {
        id: wire.id,
        ts: wire.ts,
        whiteboard_id: wire.whiteboard_id,
        from: wire.from,
        event: wire.event,
        data: wire
            .data
            .map_or(Value::Object(Map::new()), |v| proto_to_json_value(&v)),
    }
}

fn json_to_proto_value(value: &Value) -> prost_types::Value {
    let kind = match value {
        Value::Null => {
            prost_types::value::Kind::NullValue(prost_types::NullValue::NullValue as i32)
        }
        Value::Bool(v) => prost_types::value::Kind::BoolValue(*v),
        Value::Number(v) => prost_types::value::Kind::NumberValue(v.as_f64().unwrap_or(0.0)),
        Value::String(v) => prost_types::value::Kind::StringValue(v.clone()),
        Value::Array(v) => prost_types::value::Kind::ListValue(prost_types::ListValue {
            values: v.iter().map(json_to_proto_value).collect(),
        }),
        Value::Object(v) => prost_types::value::Kind::StructValue(prost_types::Struct {
            fields: v
                .iter()
                .map(|(k, v)| (k.clone(), json_to_proto_value(v)))
                .collect(),
        }),
    };

    prost_types::Value { kind: Some(kind) }
}

/// Largest integer magnitude an `f64` carries exactly (2^53).
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

fn proto_to_json_value(value: &prost_types::Value) -> Value {
    let Some(kind) = &value.kind else {
        return Value::Null;
    };

    match kind {
        prost_types::value::Kind::NullValue(_) => Value::Null,
        prost_types::value::Kind::NumberValue(v) => number_to_json(*v),
        prost_types::value::Kind::StringValue(v) => Value::String(v.clone()),
        prost_types::value::Kind::BoolValue(v) => Value::Bool(*v),
        prost_types::value::Kind::StructValue(v) => Value::Object(
            v.fields
                .iter()
                .map(|(k, v)| (k.clone(), proto_to_json_value(v)))
                .collect(),
        ),
        prost_types::value::Kind::ListValue(v) => {
            Value::Array(v.values.iter().map(proto_to_json_value).collect())
        }
    }
}

/// Protobuf only has doubles. Whole numbers come back as JSON integers so
/// millisecond object IDs still deserialize into `i64` fields.
#[allow(clippy::cast_possible_truncation)]
fn number_to_json(v: f64) -> Value {
    if v.is_finite() && v.fract() == 0.0 && v.abs() <= MAX_EXACT_INTEGER {
        return Value::from(v as i64);
    }
    serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
}

#[derive(Clone, PartialEq, Message)]
struct WireFrame {
    #[prost(string, tag = "1")]
    id: String,
    #[prost(int64, tag = "2")]
    ts: i64,
    #[prost(string, optional, tag = "3")]
    whiteboard_id: Option<String>,
    #[prost(string, optional, tag = "4")]
    from: Option<String>,
    #[prost(string, tag = "5")]
    event: String,
    #[prost(message, optional, tag = "6")]
    data: Option<prost_types::Value>,
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
