//! Persisted document records shared by the client store and the server.

#[cfg(test)]
#[path = "document_test.rs"]
mod document_test;

use serde::{Deserialize, Serialize};

use crate::camera::Point;
use crate::doc::{ShapeObject, TextBoxObject};

/// A whiteboard as stored by the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhiteboardDocument {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created_by: String,
    /// Flattened composite (PNG data-URI).
    #[serde(default)]
    pub image_data: String,
    /// Ink layer only (PNG data-URI); absent on documents saved before ink
    /// was stored separately.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ink_data: Option<String>,
    #[serde(default)]
    pub text_boxes: Vec<TextBoxObject>,
    #[serde(default)]
    pub shapes: Vec<ShapeObject>,
    #[serde(default)]
    pub canvas_position: Point,
    #[serde(default = "default_zoom")]
    pub zoom_level: f64,
    #[serde(default)]
    pub shared_with: Vec<String>,
    /// Milliseconds since the Unix epoch of the last write.
    #[serde(default)]
    pub timestamp: i64,
}

fn default_zoom() -> f64 {
    1.0
}

/// The body of a save: everything the engine knows at write time.
///
/// `name` and `created_by` are only sent on the first save of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub image_data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ink_data: Option<String>,
    #[serde(default)]
    pub text_boxes: Vec<TextBoxObject>,
    #[serde(default)]
    pub shapes: Vec<ShapeObject>,
    #[serde(default)]
    pub canvas_position: Point,
    #[serde(default = "default_zoom")]
    pub zoom_level: f64,
    pub timestamp: i64,
}

impl WhiteboardDocument {
    /// Overwrite the canvas fields with a snapshot (last writer wins).
    /// `name` is replaced only when the snapshot carries one; `created_by`
    /// and `shared_with` are never touched by a save.
    pub fn apply_snapshot(&mut self, snapshot: DocumentSnapshot) {
        if let Some(name) = snapshot.name {
            self.name = name;
        }
        self.image_data = snapshot.image_data;
        self.ink_data = snapshot.ink_data;
        self.text_boxes = snapshot.text_boxes;
        self.shapes = snapshot.shapes;
        self.canvas_position = snapshot.canvas_position;
        self.zoom_level = snapshot.zoom_level;
        self.timestamp = snapshot.timestamp;
    }

    /// Build a new document from its first save.
    #[must_use]
    pub fn from_snapshot(id: String, owner: &str, snapshot: DocumentSnapshot) -> Self {
        let mut doc = Self {
            id,
            name: String::new(),
            created_by: snapshot.created_by.clone().unwrap_or_else(|| owner.to_owned()),
            image_data: String::new(),
            ink_data: None,
            text_boxes: Vec::new(),
            shapes: Vec::new(),
            canvas_position: Point::default(),
            zoom_level: 1.0,
            shared_with: Vec::new(),
            timestamp: 0,
        };
        doc.apply_snapshot(snapshot);
        doc
    }
}

/// Access level a caller holds on a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Editor,
    Owner,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Editor => "editor",
            Self::Owner => "owner",
        }
    }

    /// Case-insensitive parse of a wire role name.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "viewer" => Some(Self::Viewer),
            "editor" => Some(Self::Editor),
            "owner" => Some(Self::Owner),
            _ => None,
        }
    }

    #[must_use]
    pub fn can_edit(self) -> bool {
        self >= Self::Editor
    }

    #[must_use]
    pub fn can_manage(self) -> bool {
        self == Self::Owner
    }
}

/// Body of `POST /api/documents/{id}/collaborators`. A missing role means
/// editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorRequest {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// One row of a document listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub id: String,
    pub name: String,
    pub created_by: String,
    pub timestamp: i64,
    pub role: Role,
}

/// Free-text notes attached to a whiteboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notes {
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default = "default_font_family")]
    pub font_family: String,
}

fn default_font_size() -> u32 {
    16
}

fn default_font_family() -> String {
    "Arial".to_owned()
}

impl Default for Notes {
    fn default() -> Self {
        Self { content: String::new(), font_size: default_font_size(), font_family: default_font_family() }
    }
}
