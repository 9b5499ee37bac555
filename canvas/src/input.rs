//! Input model: tools, brush settings, and the gesture state machine.
//!
//! `Tool` and `Brush` capture the user's intent at the time of a pointer
//! event. `InputState` is the active gesture being tracked between
//! pointer-down and pointer-up, carrying the context needed to apply
//! incremental changes locally and emit one final update on release.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::camera::Point;
use crate::consts::{DEFAULT_BRUSH_SIZE, MAX_BRUSH_SIZE, MIN_BRUSH_SIZE};
use crate::doc::{Bounds, ObjectRef, ShapeKind};

/// Which tool is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Pointer / selection tool (default).
    #[default]
    Select,
    /// Freehand ink.
    Pen,
    /// Freehand erase to transparent.
    Eraser,
    /// Place a text box.
    Text,
    /// Place a shape of the given kind.
    Shape(ShapeKind),
}

impl Tool {
    /// Whether this tool produces raster strokes.
    #[must_use]
    pub fn is_freehand(self) -> bool {
        matches!(self, Self::Pen | Self::Eraser)
    }
}

/// Pen color and size chosen in the toolbar.
#[derive(Debug, Clone, PartialEq)]
pub struct Brush {
    /// CSS color name or hex.
    pub color: String,
    /// Line width in CSS pixels.
    pub size: f64,
}

impl Default for Brush {
    fn default() -> Self {
        Self { color: "black".to_owned(), size: DEFAULT_BRUSH_SIZE }
    }
}

impl Brush {
    /// Set the size, clamped to the toolbar range.
    pub fn set_size(&mut self, size: f64) {
        self.size = if size.is_finite() { size.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE) } else { DEFAULT_BRUSH_SIZE };
    }
}

/// Persistent UI state visible to the host.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    /// Currently active tool.
    pub tool: Tool,
    pub brush: Brush,
    /// Text box whose text is being edited in place, if any.
    pub editing: Option<ObjectRef>,
}

/// Internal state for the input state machine.
#[derive(Debug, Clone, Default)]
pub enum InputState {
    /// No gesture in progress; waiting for the next pointer-down.
    #[default]
    Idle,
    /// Laying down freehand segments.
    Drawing {
        /// World position of the previous pointer event; the next segment
        /// starts here.
        last_world: Point,
    },
    /// Moving an object.
    Dragging {
        target: ObjectRef,
        /// World-space position of the pointer at the previous event.
        last_world: Point,
        /// Bounds at gesture start; release emits only if they changed.
        orig: Bounds,
    },
    /// Resizing from the bottom-right handle.
    Resizing {
        target: ObjectRef,
        /// World-space pointer position at the start of the resize.
        start_world: Point,
        orig: Bounds,
    },
    /// Rotating around the object center.
    Rotating {
        target: ObjectRef,
        center: Point,
        /// Pointer angle (degrees) at gesture start.
        start_angle: f64,
        orig: Bounds,
    },
}

impl InputState {
    /// The object a gesture is manipulating, if any.
    #[must_use]
    pub fn target(&self) -> Option<ObjectRef> {
        match self {
            Self::Dragging { target, .. } | Self::Resizing { target, .. } | Self::Rotating { target, .. } => {
                Some(*target)
            }
            Self::Idle | Self::Drawing { .. } => None,
        }
    }
}
