//! Vector object store: text boxes, shapes, and the local selection.
//!
//! This module defines the structured objects that sit above the ink raster
//! (`TextBoxObject`, `ShapeObject`), a reference type that addresses either
//! collection (`ObjectRef`), and the store that owns them (`ObjectStore`).
//!
//! Every mutation is a full-object replace keyed by ID. Remote creates are
//! upserts so a replayed `addTextBox` never duplicates, and remote updates are
//! last-writer-wins by arrival. Objects are held in ID-ordered maps; since IDs
//! are creation timestamps, iteration order is creation order.
//!
//! Selection is local UI state. It lives in the store's selection set rather
//! than on the objects, so it is never broadcast or persisted.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::camera::Point;

/// Object identifier: the creator's millisecond clock at creation time.
pub type ObjectId = i64;

/// An update addressed an object this store has never seen.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no {collection} with id {id}")]
pub struct ReferenceError {
    pub collection: &'static str,
    pub id: ObjectId,
}

/// The kind of a shape object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShapeKind {
    /// Circle inscribed in the smaller bounding-box dimension.
    Circle,
    /// Ellipse inscribed in the bounding box.
    Oval,
    /// Square with side equal to the smaller bounding-box dimension.
    Square,
    Rectangle,
    /// Arrow with an open V head.
    ArrowLine,
    /// Arrow with a filled triangular head.
    ArrowSolid,
    /// Arrow with an outlined triangular head.
    ArrowOutline,
    /// Arrow with a dotted shaft and an open V head.
    ArrowDotted,
}

impl ShapeKind {
    #[must_use]
    pub fn is_arrow(self) -> bool {
        matches!(self, Self::ArrowLine | Self::ArrowSolid | Self::ArrowOutline | Self::ArrowDotted)
    }
}

/// A movable, resizable, rotatable text box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBoxObject {
    pub id: ObjectId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub text: String,
    /// Clockwise rotation in degrees around the box center.
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub is_editing: bool,
}

/// A geometric shape or arrow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeObject {
    pub id: ObjectId,
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_shape_color")]
    pub color: String,
    #[serde(default)]
    pub rotation: f64,
}

fn default_shape_color() -> String {
    "black".to_owned()
}

/// Position, size and rotation shared by both object kinds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub rotation: f64,
}

impl Bounds {
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Corners in drawing order (top-left, top-right, bottom-right,
    /// bottom-left), rotated into world space.
    #[must_use]
    pub fn corners(&self) -> [Point; 4] {
        let c = self.center();
        [
            Point::new(self.x, self.y),
            Point::new(self.x + self.width, self.y),
            Point::new(self.x + self.width, self.y + self.height),
            Point::new(self.x, self.y + self.height),
        ]
        .map(|p| p.rotate_about(c, self.rotation))
    }

    /// Map a world point into the unrotated local frame of this box.
    #[must_use]
    pub fn to_local(&self, world: Point) -> Point {
        world.rotate_about(self.center(), -self.rotation)
    }
}

impl TextBoxObject {
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        Bounds { x: self.x, y: self.y, width: self.width, height: self.height, rotation: self.rotation }
    }

    pub fn set_bounds(&mut self, b: Bounds) {
        self.x = b.x;
        self.y = b.y;
        self.width = b.width;
        self.height = b.height;
        self.rotation = b.rotation;
    }
}

impl ShapeObject {
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        Bounds { x: self.x, y: self.y, width: self.width, height: self.height, rotation: self.rotation }
    }

    pub fn set_bounds(&mut self, b: Bounds) {
        self.x = b.x;
        self.y = b.y;
        self.width = b.width;
        self.height = b.height;
        self.rotation = b.rotation;
    }
}

/// Addresses one object in either collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectRef {
    TextBox(ObjectId),
    Shape(ObjectId),
}

impl ObjectRef {
    #[must_use]
    pub fn id(self) -> ObjectId {
        match self {
            Self::TextBox(id) | Self::Shape(id) => id,
        }
    }
}

/// In-memory store of text boxes and shapes for one whiteboard.
#[derive(Debug, Default)]
pub struct ObjectStore {
    text_boxes: BTreeMap<ObjectId, TextBoxObject>,
    shapes: BTreeMap<ObjectId, ShapeObject>,
    selection: BTreeSet<ObjectRef>,
    last_id: ObjectId,
}

impl ObjectStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // ID clock
    // =========================================================================

    /// Issue a fresh object ID from the local clock. IDs are strictly
    /// increasing for this store and skip any ID already present in either
    /// collection.
    pub fn next_id(&mut self, now_ms: i64) -> ObjectId {
        let mut candidate = now_ms.max(self.last_id.saturating_add(1));
        while self.text_boxes.contains_key(&candidate) || self.shapes.contains_key(&candidate) {
            candidate = candidate.saturating_add(1);
        }
        self.last_id = candidate;
        candidate
    }

    // =========================================================================
    // Local creation
    // =========================================================================

    /// Insert a locally created text box and select it.
    pub fn create_text_box(&mut self, text_box: TextBoxObject) {
        let r = ObjectRef::TextBox(text_box.id);
        self.text_boxes.insert(text_box.id, text_box);
        self.select(r);
    }

    /// Insert a locally created shape and select it.
    pub fn create_shape(&mut self, shape: ShapeObject) {
        let r = ObjectRef::Shape(shape.id);
        self.shapes.insert(shape.id, shape);
        self.select(r);
    }

    // =========================================================================
    // Remote replay
    // =========================================================================

    /// Insert or replace a text box. Returns `true` if it was new.
    pub fn upsert_text_box(&mut self, text_box: TextBoxObject) -> bool {
        self.observe_id(text_box.id);
        self.text_boxes.insert(text_box.id, text_box).is_none()
    }

    /// Insert or replace a shape. Returns `true` if it was new.
    pub fn upsert_shape(&mut self, shape: ShapeObject) -> bool {
        self.observe_id(shape.id);
        self.shapes.insert(shape.id, shape).is_none()
    }

    /// Replace an existing text box with the incoming snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError`] if no text box has that ID; the store is
    /// left unchanged.
    pub fn update_text_box(&mut self, text_box: TextBoxObject) -> Result<(), ReferenceError> {
        let Some(slot) = self.text_boxes.get_mut(&text_box.id) else {
            return Err(ReferenceError { collection: "text box", id: text_box.id });
        };
        *slot = text_box;
        Ok(())
    }

    /// Replace an existing shape with the incoming snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError`] if no shape has that ID.
    pub fn update_shape(&mut self, shape: ShapeObject) -> Result<(), ReferenceError> {
        let Some(slot) = self.shapes.get_mut(&shape.id) else {
            return Err(ReferenceError { collection: "shape", id: shape.id });
        };
        *slot = shape;
        Ok(())
    }

    /// Replace all objects with a persisted snapshot and clear selection.
    pub fn load(&mut self, text_boxes: Vec<TextBoxObject>, shapes: Vec<ShapeObject>) {
        self.text_boxes.clear();
        self.shapes.clear();
        self.selection.clear();
        for tb in text_boxes {
            self.observe_id(tb.id);
            self.text_boxes.insert(tb.id, tb);
        }
        for shape in shapes {
            self.observe_id(shape.id);
            self.shapes.insert(shape.id, shape);
        }
    }

    fn observe_id(&mut self, id: ObjectId) {
        self.last_id = self.last_id.max(id);
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Make `r` the only selected object. Unknown refs clear the selection.
    pub fn select(&mut self, r: ObjectRef) {
        self.selection.clear();
        if self.contains(r) {
            self.selection.insert(r);
        }
    }

    pub fn deselect_all(&mut self) {
        self.selection.clear();
    }

    #[must_use]
    pub fn is_selected(&self, r: ObjectRef) -> bool {
        self.selection.contains(&r)
    }

    /// The selected object, if any.
    #[must_use]
    pub fn selected(&self) -> Option<ObjectRef> {
        self.selection.iter().next().copied()
    }

    // =========================================================================
    // Access
    // =========================================================================

    #[must_use]
    pub fn contains(&self, r: ObjectRef) -> bool {
        match r {
            ObjectRef::TextBox(id) => self.text_boxes.contains_key(&id),
            ObjectRef::Shape(id) => self.shapes.contains_key(&id),
        }
    }

    #[must_use]
    pub fn text_box(&self, id: ObjectId) -> Option<&TextBoxObject> {
        self.text_boxes.get(&id)
    }

    pub fn text_box_mut(&mut self, id: ObjectId) -> Option<&mut TextBoxObject> {
        self.text_boxes.get_mut(&id)
    }

    #[must_use]
    pub fn shape(&self, id: ObjectId) -> Option<&ShapeObject> {
        self.shapes.get(&id)
    }

    pub fn shape_mut(&mut self, id: ObjectId) -> Option<&mut ShapeObject> {
        self.shapes.get_mut(&id)
    }

    /// Text boxes in creation (ID) order.
    pub fn text_boxes(&self) -> impl DoubleEndedIterator<Item = &TextBoxObject> {
        self.text_boxes.values()
    }

    /// Shapes in creation (ID) order.
    pub fn shapes(&self) -> impl DoubleEndedIterator<Item = &ShapeObject> {
        self.shapes.values()
    }

    #[must_use]
    pub fn bounds(&self, r: ObjectRef) -> Option<Bounds> {
        match r {
            ObjectRef::TextBox(id) => self.text_boxes.get(&id).map(TextBoxObject::bounds),
            ObjectRef::Shape(id) => self.shapes.get(&id).map(ShapeObject::bounds),
        }
    }

    /// Overwrite position, size and rotation. Returns `false` for unknown refs.
    pub fn set_bounds(&mut self, r: ObjectRef, b: Bounds) -> bool {
        match r {
            ObjectRef::TextBox(id) => self.text_boxes.get_mut(&id).map(|tb| tb.set_bounds(b)).is_some(),
            ObjectRef::Shape(id) => self.shapes.get_mut(&id).map(|s| s.set_bounds(b)).is_some(),
        }
    }

    /// Total number of objects across both collections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text_boxes.len() + self.shapes.len()
    }

    /// Returns `true` if the store contains no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text_boxes.is_empty() && self.shapes.is_empty()
    }
}
