#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::camera::{Camera, Point};
use crate::consts::{HANDLE_RADIUS_PX, ROTATE_HANDLE_OFFSET_PX};
use crate::doc::{Bounds, ObjectRef, ObjectStore};

/// Which part of an object was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitPart {
    Body,
    /// Bottom-right resize handle.
    ResizeHandle,
    /// Handle above the top-center edge.
    RotateHandle,
}

/// Result of a hit test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub target: ObjectRef,
    pub part: HitPart,
}

/// World position of the resize handle.
#[must_use]
pub fn resize_handle(b: &Bounds) -> Point {
    b.corners()[2]
}

/// World position of the rotate handle, offset above the top edge by a
/// constant screen distance.
#[must_use]
pub fn rotate_handle(b: &Bounds, camera: &Camera) -> Point {
    let offset = camera.screen_dist_to_world(ROTATE_HANDLE_OFFSET_PX);
    Point::new(b.x + b.width / 2.0, b.y - offset).rotate_about(b.center(), b.rotation)
}

/// Whether `world_pt` lies inside the rotated box.
#[must_use]
pub fn contains(b: &Bounds, world_pt: Point) -> bool {
    let local = b.to_local(world_pt);
    local.x >= b.x && local.x <= b.x + b.width && local.y >= b.y && local.y <= b.y + b.height
}

/// Find the object under `world_pt`.
///
/// Handles of the selected object win, then bodies from the top of the
/// stacking order down: text boxes above shapes, newer above older.
#[must_use]
pub fn hit_test(world_pt: Point, store: &ObjectStore, camera: &Camera) -> Option<Hit> {
    let slop = camera.screen_dist_to_world(HANDLE_RADIUS_PX);

    if let Some(target) = store.selected() {
        if let Some(b) = store.bounds(target) {
            if world_pt.distance(resize_handle(&b)) <= slop {
                return Some(Hit { target, part: HitPart::ResizeHandle });
            }
            if world_pt.distance(rotate_handle(&b, camera)) <= slop {
                return Some(Hit { target, part: HitPart::RotateHandle });
            }
        }
    }

    let text_boxes = store
        .text_boxes()
        .rev()
        .map(|tb| (ObjectRef::TextBox(tb.id), tb.bounds()));
    let shapes = store
        .shapes()
        .rev()
        .map(|s| (ObjectRef::Shape(s.id), s.bounds()));

    text_boxes
        .chain(shapes)
        .find(|(_, b)| contains(b, world_pt))
        .map(|(target, _)| Hit { target, part: HitPart::Body })
}
