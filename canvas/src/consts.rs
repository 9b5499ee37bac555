//! Shared numeric constants for the canvas crate.

// ── Hit-testing ─────────────────────────────────────────────────

/// Screen-space hit slop in pixels for handles.
pub const HANDLE_RADIUS_PX: f64 = 8.0;

/// Distance from the top edge to the rotate handle, in screen pixels.
pub const ROTATE_HANDLE_OFFSET_PX: f64 = 24.0;

// ── Objects ─────────────────────────────────────────────────────

/// Size of a freshly placed text box, in world units.
pub const TEXT_BOX_WIDTH: f64 = 200.0;
pub const TEXT_BOX_HEIGHT: f64 = 40.0;

/// Placeholder text for a new text box.
pub const TEXT_BOX_DEFAULT_TEXT: &str = "Textbox";

/// Size of a freshly placed closed shape, in world units.
pub const SHAPE_SIZE: f64 = 100.0;

/// Size of a freshly placed arrow, in world units.
pub const ARROW_WIDTH: f64 = 150.0;
pub const ARROW_HEIGHT: f64 = 40.0;

/// Degrees added by one press of the rotate button.
pub const ROTATE_STEP_DEG: f64 = 14.0;

/// Smallest width or height a resize gesture may produce.
pub const MIN_OBJECT_SIZE: f64 = 10.0;

// ── Drawing ─────────────────────────────────────────────────────

/// Brush size bounds offered by the toolbar.
pub const MIN_BRUSH_SIZE: f64 = 1.0;
pub const MAX_BRUSH_SIZE: f64 = 20.0;
pub const DEFAULT_BRUSH_SIZE: f64 = 5.0;

/// Outline width used when flattening shapes into the composite.
pub const SHAPE_STROKE_WIDTH: f64 = 2.0;

/// Segments used to approximate an ellipse outline.
pub const ELLIPSE_SEGMENTS: usize = 64;

/// Dash length and gap for dotted arrows, in world units.
pub const DOT_LENGTH: f64 = 4.0;
pub const DOT_GAP: f64 = 6.0;

// ── Camera ──────────────────────────────────────────────────────

pub const ZOOM_MIN: f64 = 0.1;
pub const ZOOM_MAX: f64 = 10.0;
