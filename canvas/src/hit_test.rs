use super::*;
use crate::doc::{ShapeKind, ShapeObject, TextBoxObject};

fn store_with(text_boxes: Vec<TextBoxObject>, shapes: Vec<ShapeObject>) -> ObjectStore {
    let mut store = ObjectStore::new();
    store.load(text_boxes, shapes);
    store
}

fn text_box_at(id: i64, x: f64, y: f64, w: f64, h: f64) -> TextBoxObject {
    TextBoxObject { id, x, y, width: w, height: h, text: String::new(), rotation: 0.0, is_editing: false }
}

fn shape_at(id: i64, x: f64, y: f64, w: f64, h: f64) -> ShapeObject {
    ShapeObject { id, kind: ShapeKind::Rectangle, x, y, width: w, height: h, color: "black".into(), rotation: 0.0 }
}

// =============================================================
// contains
// =============================================================

#[test]
fn contains_axis_aligned() {
    let b = Bounds { x: 0.0, y: 0.0, width: 10.0, height: 10.0, rotation: 0.0 };
    assert!(contains(&b, Point::new(5.0, 5.0)));
    assert!(contains(&b, Point::new(10.0, 10.0)));
    assert!(!contains(&b, Point::new(11.0, 5.0)));
}

#[test]
fn contains_respects_rotation() {
    // 100x10 bar rotated 90° stands vertically around its center (50, 5).
    let b = Bounds { x: 0.0, y: 0.0, width: 100.0, height: 10.0, rotation: 90.0 };
    assert!(contains(&b, Point::new(50.0, 40.0)));
    assert!(!contains(&b, Point::new(90.0, 5.0)));
}

// =============================================================
// hit_test
// =============================================================

#[test]
fn miss_returns_none() {
    let store = store_with(vec![text_box_at(1, 0.0, 0.0, 10.0, 10.0)], vec![]);
    assert_eq!(hit_test(Point::new(500.0, 500.0), &store, &Camera::default()), None);
}

#[test]
fn text_boxes_sit_above_shapes() {
    let store = store_with(
        vec![text_box_at(1, 0.0, 0.0, 50.0, 50.0)],
        vec![shape_at(2, 0.0, 0.0, 50.0, 50.0)],
    );
    let hit = hit_test(Point::new(25.0, 25.0), &store, &Camera::default()).expect("hit");
    assert_eq!(hit.target, ObjectRef::TextBox(1));
    assert_eq!(hit.part, HitPart::Body);
}

#[test]
fn newer_shape_wins_overlap() {
    let store = store_with(
        vec![],
        vec![shape_at(1, 0.0, 0.0, 50.0, 50.0), shape_at(2, 20.0, 20.0, 50.0, 50.0)],
    );
    let hit = hit_test(Point::new(30.0, 30.0), &store, &Camera::default()).expect("hit");
    assert_eq!(hit.target, ObjectRef::Shape(2));
}

#[test]
fn handles_only_for_selected_object() {
    let mut store = store_with(vec![], vec![shape_at(1, 0.0, 0.0, 50.0, 50.0)]);
    let corner = Point::new(51.0, 51.0);
    let cam = Camera::default();

    assert_eq!(hit_test(corner, &store, &cam), None);

    store.select(ObjectRef::Shape(1));
    let hit = hit_test(corner, &store, &cam).expect("hit");
    assert_eq!(hit.part, HitPart::ResizeHandle);
}

#[test]
fn rotate_handle_sits_above_top_center() {
    let mut store = store_with(vec![], vec![shape_at(1, 0.0, 100.0, 50.0, 50.0)]);
    store.select(ObjectRef::Shape(1));
    let cam = Camera::default();
    let handle = Point::new(25.0, 100.0 - ROTATE_HANDLE_OFFSET_PX);
    let hit = hit_test(handle, &store, &cam).expect("hit");
    assert_eq!(hit, Hit { target: ObjectRef::Shape(1), part: HitPart::RotateHandle });
}

#[test]
fn handle_slop_shrinks_in_world_units_when_zoomed_in() {
    let mut store = store_with(vec![], vec![shape_at(1, 0.0, 0.0, 50.0, 50.0)]);
    store.select(ObjectRef::Shape(1));
    let cam = Camera { pan_x: 0.0, pan_y: 0.0, zoom: 4.0 };
    // 6 world units away is 24 screen px at 4x: outside the 8px slop.
    assert_eq!(hit_test(Point::new(56.0, 56.0), &store, &cam), None);
}
