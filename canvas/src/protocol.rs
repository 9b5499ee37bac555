//! Sync protocol: typed realtime events and their frame encoding.
//!
//! DESIGN
//! ======
//! The relay only sees [`Frame`]s with a free-form JSON payload. This module
//! is the single place that knows which payload shape belongs to which event
//! name. Room-scoped payloads carry `whiteboardId` alongside the object
//! fields (objects are flattened into the payload, matching the wire format
//! peers already speak), and [`SyncEvent::to_frame`] mirrors it onto the
//! envelope so the relay can check scope without parsing payloads.
//!
//! ERROR HANDLING
//! ==============
//! Decoding returns [`ProtocolError`]; the session logs and skips the frame.
//! Beyond shape, inbound payloads are not validated (peers are trusted).

#[cfg(test)]
#[path = "protocol_test.rs"]
mod protocol_test;

use frames::{Frame, events};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::camera::Point;
use crate::doc::{ShapeObject, TextBoxObject};
use crate::raster::{Paint, StrokeSegment};

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    #[error("malformed {event} payload: {source}")]
    Payload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub email: String,
    pub whiteboard_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeavePayload {
    pub whiteboard_id: String,
}

/// One stroke segment as it travels between peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawPayload {
    pub last_x: f64,
    pub last_y: f64,
    pub x: f64,
    pub y: f64,
    /// CSS color or `"eraser"`.
    pub color: String,
    pub size: f64,
    /// Sender device pixel ratio.
    #[serde(default = "default_scale")]
    pub scale: f64,
    pub whiteboard_id: String,
}

fn default_scale() -> f64 {
    1.0
}

impl DrawPayload {
    #[must_use]
    pub fn from_segment(segment: &StrokeSegment, whiteboard_id: &str) -> Self {
        Self {
            last_x: segment.from.x,
            last_y: segment.from.y,
            x: segment.to.x,
            y: segment.to.y,
            color: segment.paint.as_wire().to_owned(),
            size: segment.width,
            scale: segment.device_scale,
            whiteboard_id: whiteboard_id.to_owned(),
        }
    }

    #[must_use]
    pub fn to_segment(&self) -> StrokeSegment {
        StrokeSegment {
            from: Point::new(self.last_x, self.last_y),
            to: Point::new(self.x, self.y),
            paint: Paint::from_wire(&self.color),
            width: self.size,
            device_scale: self.scale,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBoxPayload {
    #[serde(flatten)]
    pub text_box: TextBoxObject,
    pub whiteboard_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapePayload {
    #[serde(flatten)]
    pub shape: ShapeObject,
    pub whiteboard_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorPayload {
    pub email: String,
    /// World coordinates.
    pub x: f64,
    pub y: f64,
    pub whiteboard_id: String,
    #[serde(default = "default_scale")]
    pub zoom_level: f64,
    #[serde(default)]
    pub canvas_position: Point,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayErrorPayload {
    pub message: String,
}

/// Every event on the realtime channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Join(JoinPayload),
    Leave(LeavePayload),
    UserList(Vec<String>),
    UserJoined(String),
    UserDisconnected(String),
    Draw(DrawPayload),
    AddTextBox(TextBoxPayload),
    UpdateTextBox(TextBoxPayload),
    AddShape(ShapePayload),
    UpdateShape(ShapePayload),
    CursorMove(CursorPayload),
    RelayError(RelayErrorPayload),
}

impl SyncEvent {
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Join(_) => events::JOIN,
            Self::Leave(_) => events::LEAVE,
            Self::UserList(_) => events::USER_LIST,
            Self::UserJoined(_) => events::USER_JOINED,
            Self::UserDisconnected(_) => events::USER_DISCONNECTED,
            Self::Draw(_) => events::DRAW,
            Self::AddTextBox(_) => events::ADD_TEXT_BOX,
            Self::UpdateTextBox(_) => events::UPDATE_TEXT_BOX,
            Self::AddShape(_) => events::ADD_SHAPE,
            Self::UpdateShape(_) => events::UPDATE_SHAPE,
            Self::CursorMove(_) => events::CURSOR_MOVE,
            Self::RelayError(_) => events::RELAY_ERROR,
        }
    }

    /// Room this event is scoped to, if it carries one.
    #[must_use]
    pub fn whiteboard_id(&self) -> Option<&str> {
        match self {
            Self::Join(p) => Some(&p.whiteboard_id),
            Self::Leave(p) => Some(&p.whiteboard_id),
            Self::Draw(p) => Some(&p.whiteboard_id),
            Self::AddTextBox(p) | Self::UpdateTextBox(p) => Some(&p.whiteboard_id),
            Self::AddShape(p) | Self::UpdateShape(p) => Some(&p.whiteboard_id),
            Self::CursorMove(p) => Some(&p.whiteboard_id),
            Self::UserList(_) | Self::UserJoined(_) | Self::UserDisconnected(_) | Self::RelayError(_) => None,
        }
    }

    /// Encode as a frame; room-scoped events also carry the room on the
    /// envelope.
    #[must_use]
    pub fn to_frame(&self) -> Frame {
        let data = match self {
            Self::Join(p) => to_value(p),
            Self::Leave(p) => to_value(p),
            Self::UserList(users) => to_value(users),
            Self::UserJoined(email) | Self::UserDisconnected(email) => Value::String(email.clone()),
            Self::Draw(p) => to_value(p),
            Self::AddTextBox(p) | Self::UpdateTextBox(p) => to_value(p),
            Self::AddShape(p) | Self::UpdateShape(p) => to_value(p),
            Self::CursorMove(p) => to_value(p),
            Self::RelayError(p) => to_value(p),
        };
        let frame = Frame::new(self.event_name(), data);
        match self.whiteboard_id() {
            Some(id) => frame.with_whiteboard_id(id),
            None => frame,
        }
    }

    /// Decode a frame by event name.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownEvent`] for names outside the
    /// protocol and [`ProtocolError::Payload`] when the payload does not
    /// match the event's shape.
    pub fn from_frame(frame: &Frame) -> Result<Self, ProtocolError> {
        let data = &frame.data;
        let event = frame.event.as_str();
        Ok(match event {
            events::JOIN => Self::Join(parse(event, data)?),
            events::LEAVE => Self::Leave(parse(event, data)?),
            events::USER_LIST => Self::UserList(parse(event, data)?),
            events::USER_JOINED => Self::UserJoined(parse(event, data)?),
            events::USER_DISCONNECTED => Self::UserDisconnected(parse(event, data)?),
            events::DRAW => Self::Draw(parse(event, data)?),
            events::ADD_TEXT_BOX => Self::AddTextBox(parse(event, data)?),
            events::UPDATE_TEXT_BOX => Self::UpdateTextBox(parse(event, data)?),
            events::ADD_SHAPE => Self::AddShape(parse(event, data)?),
            events::UPDATE_SHAPE => Self::UpdateShape(parse(event, data)?),
            events::CURSOR_MOVE => Self::CursorMove(parse(event, data)?),
            events::RELAY_ERROR => Self::RelayError(parse(event, data)?),
            other => return Err(ProtocolError::UnknownEvent(other.to_owned())),
        })
    }
}

fn parse<T: DeserializeOwned>(event: &str, data: &Value) -> Result<T, ProtocolError> {
    T::deserialize(data).map_err(|source| ProtocolError::Payload { event: event.to_owned(), source })
}

/// Payload structs serialize infallibly (no non-string map keys).
fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
