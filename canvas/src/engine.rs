use tracing::{debug, warn};

use crate::camera::{Camera, Point};
use crate::composite::render_composite;
use crate::consts::{
    ARROW_HEIGHT, ARROW_WIDTH, MIN_OBJECT_SIZE, ROTATE_STEP_DEG, SHAPE_SIZE, TEXT_BOX_DEFAULT_TEXT, TEXT_BOX_HEIGHT,
    TEXT_BOX_WIDTH,
};
use crate::doc::{Bounds, ObjectId, ObjectRef, ObjectStore, ReferenceError, ShapeObject, TextBoxObject};
use crate::document::{DocumentSnapshot, WhiteboardDocument};
use crate::hit::{HitPart, hit_test};
use crate::input::{InputState, Tool, UiState};
use crate::presence::PresenceTracker;
use crate::protocol::{CursorPayload, DrawPayload, ShapePayload, SyncEvent, TextBoxPayload};
use crate::raster::{Paint, RasterBuffer, RasterError, StrokeSegment};

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// A segment was rasterized locally and should be broadcast.
    Stroke(StrokeSegment),
    TextBoxCreated(TextBoxObject),
    TextBoxUpdated(TextBoxObject),
    ShapeCreated(ShapeObject),
    ShapeUpdated(ShapeObject),
    RenderNeeded,
}

impl Action {
    /// Whether this action changed shared state (and so needs a save).
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::RenderNeeded)
    }

    /// The outbound event for this action, scoped to `whiteboard_id`.
    #[must_use]
    pub fn to_event(&self, whiteboard_id: &str) -> Option<SyncEvent> {
        let wb = whiteboard_id.to_owned();
        match self {
            Self::Stroke(seg) => Some(SyncEvent::Draw(DrawPayload::from_segment(seg, whiteboard_id))),
            Self::TextBoxCreated(tb) => {
                Some(SyncEvent::AddTextBox(TextBoxPayload { text_box: tb.clone(), whiteboard_id: wb }))
            }
            Self::TextBoxUpdated(tb) => {
                Some(SyncEvent::UpdateTextBox(TextBoxPayload { text_box: tb.clone(), whiteboard_id: wb }))
            }
            Self::ShapeCreated(s) => Some(SyncEvent::AddShape(ShapePayload { shape: s.clone(), whiteboard_id: wb })),
            Self::ShapeUpdated(s) => Some(SyncEvent::UpdateShape(ShapePayload { shape: s.clone(), whiteboard_id: wb })),
            Self::RenderNeeded => None,
        }
    }
}

/// Core engine state: all canvas logic, free of any UI toolkit.
pub struct EngineCore {
    pub store: ObjectStore,
    pub ink: RasterBuffer,
    pub presence: PresenceTracker,
    pub camera: Camera,
    pub ui: UiState,
    pub input: InputState,
    pub dpr: f64,
}

impl EngineCore {
    /// Engine with a transparent ink buffer of `width × height` world units.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            store: ObjectStore::new(),
            ink: RasterBuffer::new(width, height),
            presence: PresenceTracker::new(),
            camera: Camera::default(),
            ui: UiState::default(),
            input: InputState::default(),
            dpr: 1.0,
        }
    }

    // --- Data inputs ---

    /// Apply an inbound event. Returns `true` if the scene changed.
    pub fn apply_event(&mut self, event: &SyncEvent) -> bool {
        match event {
            SyncEvent::Draw(p) => {
                self.ink.apply_stroke(&p.to_segment());
                true
            }
            SyncEvent::AddTextBox(p) => {
                self.store.upsert_text_box(p.text_box.clone());
                true
            }
            SyncEvent::AddShape(p) => {
                self.store.upsert_shape(p.shape.clone());
                true
            }
            SyncEvent::UpdateTextBox(p) => log_reference(self.store.update_text_box(p.text_box.clone())),
            SyncEvent::UpdateShape(p) => log_reference(self.store.update_shape(p.shape.clone())),
            SyncEvent::UserList(users) => {
                self.presence.apply_user_list(users.iter().cloned());
                true
            }
            SyncEvent::UserJoined(email) => self.presence.user_joined(email),
            SyncEvent::UserDisconnected(email) => self.presence.user_disconnected(email),
            SyncEvent::CursorMove(p) => {
                self.presence
                    .cursor_moved(&p.email, Point::new(p.x, p.y), p.zoom_level, p.canvas_position)
            }
            SyncEvent::RelayError(p) => {
                warn!(message = %p.message, "relay rejected frame");
                false
            }
            SyncEvent::Join(_) | SyncEvent::Leave(_) => {
                debug!(event = event.event_name(), "ignoring relay control event");
                false
            }
        }
    }

    /// Replace objects, ink and camera with a persisted document.
    ///
    /// Ink comes from `inkData`; documents saved without it fall back to
    /// `imageData`. Nothing changes if the image cannot be decoded.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError`] if the stored image is not a PNG data-URI.
    pub fn load_document(&mut self, doc: &WhiteboardDocument) -> Result<(), RasterError> {
        let source = doc.ink_data.as_deref().unwrap_or(&doc.image_data);
        let ink = if source.is_empty() {
            RasterBuffer::new(self.ink.width(), self.ink.height())
        } else {
            RasterBuffer::from_data_uri(source)?
        };
        self.ink = ink;
        self.store.load(doc.text_boxes.clone(), doc.shapes.clone());
        self.camera = Camera::from_persisted(doc.canvas_position, doc.zoom_level);
        self.input = InputState::Idle;
        self.ui.editing = None;
        Ok(())
    }

    /// Capture everything a save writes. The composite is rendered now.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError`] if PNG encoding fails.
    pub fn snapshot(&self, name: Option<String>, created_by: Option<String>, now_ms: i64) -> Result<DocumentSnapshot, RasterError> {
        let composite = render_composite(&self.store, &self.ink);
        Ok(DocumentSnapshot {
            name,
            created_by,
            image_data: composite.to_data_uri()?,
            ink_data: Some(self.ink.to_data_uri()?),
            text_boxes: self.store.text_boxes().cloned().collect(),
            shapes: self.store.shapes().cloned().collect(),
            canvas_position: self.camera.position(),
            zoom_level: self.camera.zoom,
            timestamp: now_ms,
        })
    }

    // --- Tool / brush ---

    pub fn set_tool(&mut self, tool: Tool) {
        self.ui.tool = tool;
        self.input = InputState::Idle;
    }

    pub fn set_brush_color(&mut self, color: impl Into<String>) {
        self.ui.brush.color = color.into();
    }

    pub fn set_brush_size(&mut self, size: f64) {
        self.ui.brush.set_size(size);
    }

    /// Device pixel ratio of the local display.
    pub fn set_dpr(&mut self, dpr: f64) {
        self.dpr = if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 };
    }

    // --- Pointer input (screen points are CSS pixels) ---

    pub fn on_pointer_down(&mut self, screen_pt: Point, now_ms: i64) -> Vec<Action> {
        let world = self.camera.screen_to_world(screen_pt);
        match self.ui.tool {
            Tool::Pen | Tool::Eraser => {
                self.input = InputState::Drawing { last_world: world };
                Vec::new()
            }
            Tool::Text => {
                let text_box = TextBoxObject {
                    id: self.store.next_id(now_ms),
                    x: world.x,
                    y: world.y,
                    width: TEXT_BOX_WIDTH,
                    height: TEXT_BOX_HEIGHT,
                    text: TEXT_BOX_DEFAULT_TEXT.to_owned(),
                    rotation: 0.0,
                    is_editing: false,
                };
                self.store.create_text_box(text_box.clone());
                vec![Action::TextBoxCreated(text_box), Action::RenderNeeded]
            }
            Tool::Shape(kind) => {
                let (width, height) = if kind.is_arrow() { (ARROW_WIDTH, ARROW_HEIGHT) } else { (SHAPE_SIZE, SHAPE_SIZE) };
                let shape = ShapeObject {
                    id: self.store.next_id(now_ms),
                    kind,
                    x: world.x,
                    y: world.y,
                    width,
                    height,
                    color: self.ui.brush.color.clone(),
                    rotation: 0.0,
                };
                self.store.create_shape(shape.clone());
                vec![Action::ShapeCreated(shape), Action::RenderNeeded]
            }
            Tool::Select => self.begin_select_gesture(world),
        }
    }

    fn begin_select_gesture(&mut self, world: Point) -> Vec<Action> {
        let Some(hit) = hit_test(world, &self.store, &self.camera) else {
            self.store.deselect_all();
            self.input = InputState::Idle;
            return vec![Action::RenderNeeded];
        };
        let Some(orig) = self.store.bounds(hit.target) else {
            return Vec::new();
        };
        self.input = match hit.part {
            HitPart::Body => {
                self.store.select(hit.target);
                InputState::Dragging { target: hit.target, last_world: world, orig }
            }
            HitPart::ResizeHandle => InputState::Resizing { target: hit.target, start_world: world, orig },
            HitPart::RotateHandle => {
                let center = orig.center();
                InputState::Rotating { target: hit.target, center, start_angle: angle_deg(center, world), orig }
            }
        };
        vec![Action::RenderNeeded]
    }

    pub fn on_pointer_move(&mut self, screen_pt: Point) -> Vec<Action> {
        let world = self.camera.screen_to_world(screen_pt);
        match self.input.clone() {
            InputState::Idle => Vec::new(),
            InputState::Drawing { last_world } => {
                let segment = self.local_segment(last_world, world);
                self.ink.apply_stroke(&segment);
                self.input = InputState::Drawing { last_world: world };
                vec![Action::Stroke(segment), Action::RenderNeeded]
            }
            InputState::Dragging { target, last_world, orig } => {
                if let Some(mut b) = self.store.bounds(target) {
                    b.x += world.x - last_world.x;
                    b.y += world.y - last_world.y;
                    self.store.set_bounds(target, b);
                }
                self.input = InputState::Dragging { target, last_world: world, orig };
                vec![Action::RenderNeeded]
            }
            InputState::Resizing { target, start_world, orig } => {
                // Project the pointer delta onto the object's own axes.
                let delta = Point::new(world.x - start_world.x, world.y - start_world.y)
                    .rotate_about(Point::default(), -orig.rotation);
                let b = Bounds {
                    width: (orig.width + delta.x).max(MIN_OBJECT_SIZE),
                    height: (orig.height + delta.y).max(MIN_OBJECT_SIZE),
                    ..orig
                };
                self.store.set_bounds(target, b);
                vec![Action::RenderNeeded]
            }
            InputState::Rotating { target, center, start_angle, orig } => {
                let rotation = (orig.rotation + angle_deg(center, world) - start_angle).rem_euclid(360.0);
                self.store.set_bounds(target, Bounds { rotation, ..orig });
                vec![Action::RenderNeeded]
            }
        }
    }

    pub fn on_pointer_up(&mut self, screen_pt: Point) -> Vec<Action> {
        let mut actions = self.on_pointer_move(screen_pt);
        actions.retain(|a| !matches!(a, Action::RenderNeeded));
        let state = std::mem::take(&mut self.input);
        let orig = match state {
            InputState::Dragging { orig, .. } | InputState::Resizing { orig, .. } | InputState::Rotating { orig, .. } => orig,
            InputState::Idle | InputState::Drawing { .. } => return actions,
        };
        if let Some(target) = state.target() {
            if self.store.bounds(target) != Some(orig) {
                actions.extend(self.updated_action(target));
            }
        }
        actions.push(Action::RenderNeeded);
        actions
    }

    /// Segment from `from` to `to` (world) in local device pixels, using the
    /// current brush.
    fn local_segment(&self, from: Point, to: Point) -> StrokeSegment {
        let paint = match self.ui.tool {
            Tool::Eraser => Paint::Eraser,
            _ => Paint::Color(self.ui.brush.color.clone()),
        };
        StrokeSegment {
            from: Point::new(from.x * self.dpr, from.y * self.dpr),
            to: Point::new(to.x * self.dpr, to.y * self.dpr),
            paint,
            width: self.ui.brush.size * self.dpr,
            device_scale: self.dpr,
        }
    }

    // --- Object commands ---

    /// Enter in-place text editing (local only).
    pub fn begin_text_edit(&mut self, id: ObjectId) -> Vec<Action> {
        let Some(tb) = self.store.text_box_mut(id) else {
            return Vec::new();
        };
        tb.is_editing = true;
        self.ui.editing = Some(ObjectRef::TextBox(id));
        self.store.select(ObjectRef::TextBox(id));
        vec![Action::RenderNeeded]
    }

    /// Commit edited text and leave editing mode.
    pub fn commit_text(&mut self, id: ObjectId, text: impl Into<String>) -> Option<Action> {
        let Some(tb) = self.store.text_box_mut(id) else {
            warn!(id, "commit_text for unknown text box");
            return None;
        };
        tb.text = text.into();
        tb.is_editing = false;
        let updated = tb.clone();
        if self.ui.editing == Some(ObjectRef::TextBox(id)) {
            self.ui.editing = None;
        }
        Some(Action::TextBoxUpdated(updated))
    }

    /// Rotate an object by one button step (14°).
    pub fn rotate_step(&mut self, target: ObjectRef) -> Option<Action> {
        let mut b = self.store.bounds(target)?;
        b.rotation += ROTATE_STEP_DEG;
        self.store.set_bounds(target, b);
        self.updated_action(target)
    }

    pub fn select(&mut self, target: ObjectRef) -> Action {
        self.store.select(target);
        Action::RenderNeeded
    }

    pub fn deselect_all(&mut self) -> Action {
        self.store.deselect_all();
        Action::RenderNeeded
    }

    fn updated_action(&self, target: ObjectRef) -> Option<Action> {
        match target {
            ObjectRef::TextBox(id) => self.store.text_box(id).cloned().map(Action::TextBoxUpdated),
            ObjectRef::Shape(id) => self.store.shape(id).cloned().map(Action::ShapeUpdated),
        }
    }

    // --- Camera ---

    pub fn pan_by(&mut self, dx: f64, dy: f64) -> Action {
        self.camera.pan_by(dx, dy);
        Action::RenderNeeded
    }

    pub fn zoom_at(&mut self, screen_pt: Point, factor: f64) -> Action {
        self.camera.zoom_at(screen_pt, factor);
        Action::RenderNeeded
    }

    // --- Presence ---

    /// Cursor event for the local pointer at `screen_pt`.
    #[must_use]
    pub fn cursor_payload(&self, screen_pt: Point, email: &str, whiteboard_id: &str) -> CursorPayload {
        let world = self.camera.screen_to_world(screen_pt);
        CursorPayload {
            email: email.to_owned(),
            x: world.x,
            y: world.y,
            whiteboard_id: whiteboard_id.to_owned(),
            zoom_level: self.camera.zoom,
            canvas_position: self.camera.position(),
        }
    }

    // --- Queries ---

    #[must_use]
    pub fn selection(&self) -> Option<ObjectRef> {
        self.store.selected()
    }

    #[must_use]
    pub fn camera(&self) -> Camera {
        self.camera
    }

    #[must_use]
    pub fn text_box(&self, id: ObjectId) -> Option<&TextBoxObject> {
        self.store.text_box(id)
    }

    #[must_use]
    pub fn shape(&self, id: ObjectId) -> Option<&ShapeObject> {
        self.store.shape(id)
    }
}

fn log_reference(result: Result<(), ReferenceError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "ignoring update for unknown object");
            false
        }
    }
}

fn angle_deg(center: Point, p: Point) -> f64 {
    (p.y - center.y).atan2(p.x - center.x).to_degrees()
}
