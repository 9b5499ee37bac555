#![allow(clippy::float_cmp)]

use super::*;
use crate::consts::{DEFAULT_BRUSH_SIZE, ROTATE_HANDLE_OFFSET_PX};
use crate::doc::ShapeKind;
use crate::protocol::JoinPayload;

// =============================================================
// Helpers
// =============================================================

const WB: &str = "wb-1";

fn engine() -> EngineCore {
    EngineCore::new(320, 240)
}

fn pt(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn place_text_box(core: &mut EngineCore, at: Point, now_ms: i64) -> TextBoxObject {
    core.set_tool(Tool::Text);
    let actions = core.on_pointer_down(at, now_ms);
    core.on_pointer_up(at);
    core.set_tool(Tool::Select);
    match actions.first() {
        Some(Action::TextBoxCreated(tb)) => tb.clone(),
        other => panic!("expected TextBoxCreated, got {other:?}"),
    }
}

fn place_shape(core: &mut EngineCore, kind: ShapeKind, at: Point, now_ms: i64) -> ShapeObject {
    core.set_tool(Tool::Shape(kind));
    let actions = core.on_pointer_down(at, now_ms);
    core.on_pointer_up(at);
    core.set_tool(Tool::Select);
    match actions.first() {
        Some(Action::ShapeCreated(s)) => s.clone(),
        other => panic!("expected ShapeCreated, got {other:?}"),
    }
}

/// Feed every outbound action of `from` into `to` as a remote peer would.
fn relay(actions: &[Action], to: &mut EngineCore) {
    for action in actions {
        if let Some(event) = action.to_event(WB) {
            let frame = frames::decode_frame(&frames::encode_frame(&event.to_frame())).expect("codec");
            let event = SyncEvent::from_frame(&frame).expect("protocol");
            to.apply_event(&event);
        }
    }
}

fn updates(actions: &[Action]) -> usize {
    actions
        .iter()
        .filter(|a| matches!(a, Action::TextBoxUpdated(_) | Action::ShapeUpdated(_)))
        .count()
}

// =============================================================
// Creation
// =============================================================

#[test]
fn text_tool_places_default_text_box_selected() {
    let mut core = engine();
    core.camera = Camera { pan_x: 10.0, pan_y: 0.0, zoom: 2.0 };
    let tb = place_text_box(&mut core, pt(30.0, 40.0), 1000);

    assert_eq!(tb.id, 1000);
    assert_eq!((tb.x, tb.y), (10.0, 20.0));
    assert_eq!((tb.width, tb.height), (200.0, 40.0));
    assert_eq!(tb.text, "Textbox");
    assert_eq!(core.selection(), Some(ObjectRef::TextBox(1000)));
}

#[test]
fn two_creations_in_one_millisecond_get_distinct_ids() {
    let mut core = engine();
    let a = place_text_box(&mut core, pt(0.0, 0.0), 1000);
    let b = place_shape(&mut core, ShapeKind::Oval, pt(0.0, 0.0), 1000);
    assert_ne!(a.id, b.id);
}

#[test]
fn shape_tool_uses_brush_color_and_kind_size() {
    let mut core = engine();
    core.set_brush_color("blue");
    let oval = place_shape(&mut core, ShapeKind::Oval, pt(5.0, 5.0), 1);
    assert_eq!(oval.color, "blue");
    assert_eq!((oval.width, oval.height), (SHAPE_SIZE, SHAPE_SIZE));

    let arrow = place_shape(&mut core, ShapeKind::ArrowSolid, pt(5.0, 5.0), 2);
    assert_eq!((arrow.width, arrow.height), (ARROW_WIDTH, ARROW_HEIGHT));
}

// =============================================================
// Freehand
// =============================================================

#[test]
fn pen_emits_device_scaled_segments() {
    let mut core = engine();
    core.set_dpr(2.0);
    core.set_tool(Tool::Pen);
    assert!(core.on_pointer_down(pt(10.0, 10.0), 0).is_empty());

    let actions = core.on_pointer_move(pt(20.0, 10.0));
    let Some(Action::Stroke(seg)) = actions.first() else {
        panic!("expected stroke, got {actions:?}");
    };
    assert_eq!(seg.from, pt(20.0, 20.0));
    assert_eq!(seg.to, pt(40.0, 20.0));
    assert_eq!(seg.width, DEFAULT_BRUSH_SIZE * 2.0);
    assert_eq!(seg.device_scale, 2.0);
    assert_eq!(seg.paint, Paint::Color("black".into()));
    assert!(!core.ink.is_blank());
}

#[test]
fn eraser_segments_carry_erase_paint() {
    let mut core = engine();
    core.set_tool(Tool::Eraser);
    core.on_pointer_down(pt(0.0, 0.0), 0);
    let actions = core.on_pointer_move(pt(5.0, 5.0));
    assert!(matches!(actions.first(), Some(Action::Stroke(seg)) if seg.paint == Paint::Eraser));
}

#[test]
fn pointer_move_without_press_does_nothing() {
    let mut core = engine();
    core.set_tool(Tool::Pen);
    assert!(core.on_pointer_move(pt(5.0, 5.0)).is_empty());
    assert!(core.ink.is_blank());
}

#[test]
fn remote_strokes_reproduce_local_ink_across_device_ratios() {
    let mut a = engine();
    a.set_dpr(2.0);
    a.set_tool(Tool::Pen);
    a.set_brush_color("red");

    let mut b = engine();
    let mut outbound = a.on_pointer_down(pt(10.0, 10.0), 0);
    for (x, y) in [(40.0, 12.0), (70.0, 50.0), (90.0, 90.0)] {
        outbound.extend(a.on_pointer_move(pt(x, y)));
    }
    outbound.extend(a.on_pointer_up(pt(90.0, 90.0)));
    relay(&outbound, &mut b);

    assert_eq!(a.ink.pixels(), b.ink.pixels());
}

// =============================================================
// Gestures
// =============================================================

#[test]
fn drag_emits_single_update_on_release() {
    let mut core = engine();
    let shape = place_shape(&mut core, ShapeKind::Rectangle, pt(10.0, 10.0), 1);

    let down = core.on_pointer_down(pt(50.0, 50.0), 2);
    assert_eq!(updates(&down), 0);
    let mut moves = Vec::new();
    for x in [55.0, 60.0, 70.0] {
        moves.extend(core.on_pointer_move(pt(x, 50.0)));
    }
    assert_eq!(updates(&moves), 0);

    let up = core.on_pointer_up(pt(70.0, 60.0));
    assert_eq!(updates(&up), 1);
    let moved = core.shape(shape.id).expect("shape");
    assert_eq!((moved.x, moved.y), (30.0, 20.0));
    assert!(matches!(&up[0], Action::ShapeUpdated(s) if s == moved));
}

#[test]
fn click_without_move_emits_no_update() {
    let mut core = engine();
    let tb = place_text_box(&mut core, pt(10.0, 10.0), 1);
    core.on_pointer_down(pt(20.0, 20.0), 2);
    let up = core.on_pointer_up(pt(20.0, 20.0));
    assert_eq!(updates(&up), 0);
    assert_eq!(core.selection(), Some(ObjectRef::TextBox(tb.id)));
}

#[test]
fn click_on_empty_space_deselects() {
    let mut core = engine();
    place_text_box(&mut core, pt(10.0, 10.0), 1);
    core.on_pointer_down(pt(300.0, 200.0), 2);
    core.on_pointer_up(pt(300.0, 200.0));
    assert_eq!(core.selection(), None);
}

#[test]
fn resize_handle_grows_box_and_clamps_minimum() {
    let mut core = engine();
    let shape = place_shape(&mut core, ShapeKind::Square, pt(10.0, 10.0), 1);
    // Selected after creation: the handle sits at the bottom-right corner.
    core.on_pointer_down(pt(110.0, 110.0), 2);
    core.on_pointer_move(pt(130.0, 150.0));
    let up = core.on_pointer_up(pt(130.0, 150.0));
    assert_eq!(updates(&up), 1);
    let s = core.shape(shape.id).expect("shape");
    assert_eq!((s.width, s.height), (120.0, 140.0));

    core.on_pointer_down(pt(130.0, 150.0), 3);
    let up = core.on_pointer_up(pt(-500.0, -500.0));
    assert_eq!(updates(&up), 1);
    let s = core.shape(shape.id).expect("shape");
    assert_eq!((s.width, s.height), (MIN_OBJECT_SIZE, MIN_OBJECT_SIZE));
}

#[test]
fn rotate_handle_rotates_about_center() {
    let mut core = engine();
    let shape = place_shape(&mut core, ShapeKind::Rectangle, pt(50.0, 50.0), 1);
    let handle = pt(100.0, 50.0 - ROTATE_HANDLE_OFFSET_PX);
    core.on_pointer_down(handle, 2);
    // Swing from straight up to straight right of center (100, 100).
    let up = core.on_pointer_up(pt(200.0, 100.0));
    assert_eq!(updates(&up), 1);
    let rotation = core.shape(shape.id).expect("shape").rotation;
    assert!((rotation - 90.0).abs() < 1e-9, "rotation {rotation}");
}

#[test]
fn rotate_step_adds_fourteen_degrees() {
    let mut core = engine();
    let tb = place_text_box(&mut core, pt(0.0, 0.0), 1);
    let action = core.rotate_step(ObjectRef::TextBox(tb.id)).expect("action");
    core.rotate_step(ObjectRef::TextBox(tb.id));
    assert!(matches!(action, Action::TextBoxUpdated(ref t) if t.rotation == 14.0));
    assert_eq!(core.text_box(tb.id).expect("tb").rotation, 28.0);
    assert!(core.rotate_step(ObjectRef::Shape(999)).is_none());
}

// =============================================================
// Text editing
// =============================================================

#[test]
fn edit_then_commit_emits_update_and_leaves_editing() {
    let mut core = engine();
    let tb = place_text_box(&mut core, pt(0.0, 0.0), 1);

    let actions = core.begin_text_edit(tb.id);
    assert_eq!(actions, vec![Action::RenderNeeded]);
    assert!(core.text_box(tb.id).expect("tb").is_editing);
    assert_eq!(core.ui.editing, Some(ObjectRef::TextBox(tb.id)));

    let action = core.commit_text(tb.id, "hello").expect("action");
    let Action::TextBoxUpdated(updated) = action else {
        panic!("expected update");
    };
    assert_eq!(updated.text, "hello");
    assert!(!updated.is_editing);
    assert_eq!(core.ui.editing, None);
}

#[test]
fn commit_text_for_unknown_box_is_none() {
    let mut core = engine();
    assert!(core.commit_text(42, "x").is_none());
    assert!(core.begin_text_edit(42).is_empty());
}

// =============================================================
// Remote replay
// =============================================================

#[test]
fn create_and_update_converge_between_peers() {
    let mut a = engine();
    let mut b = engine();

    // A creates {id: 1000, x: 10, y: 10, text: "hi"}.
    a.set_tool(Tool::Text);
    let mut out = a.on_pointer_down(pt(10.0, 10.0), 1000);
    a.set_tool(Tool::Select);
    out.extend(a.commit_text(1000, "hi"));
    relay(&out, &mut b);

    assert_eq!(b.store.len(), 1);
    assert_eq!(b.text_box(1000).expect("tb").text, "hi");

    // B edits the text; A receives it.
    let back: Vec<Action> = b.commit_text(1000, "bye").into_iter().collect();
    relay(&back, &mut a);

    assert_eq!(a.text_box(1000).expect("tb").text, "bye");
    assert_eq!(b.text_box(1000).expect("tb").text, "bye");
    assert_eq!(a.store.len(), 1);
}

#[test]
fn replayed_add_does_not_duplicate() {
    let mut a = engine();
    let mut b = engine();
    let shape = place_shape(&mut a, ShapeKind::Circle, pt(0.0, 0.0), 5);
    let add = vec![Action::ShapeCreated(shape)];
    relay(&add, &mut b);
    relay(&add, &mut b);
    assert_eq!(b.store.len(), 1);
}

#[test]
fn update_for_unknown_object_is_ignored() {
    let mut core = engine();
    let event = SyncEvent::UpdateShape(ShapePayload {
        shape: ShapeObject {
            id: 77,
            kind: ShapeKind::Oval,
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
            color: "red".into(),
            rotation: 0.0,
        },
        whiteboard_id: WB.into(),
    });
    assert!(!core.apply_event(&event));
    assert!(core.store.is_empty());
}

#[test]
fn remote_create_does_not_change_local_selection() {
    let mut a = engine();
    let mut b = engine();
    let mine = place_text_box(&mut b, pt(0.0, 0.0), 1);
    let theirs = place_shape(&mut a, ShapeKind::Oval, pt(0.0, 0.0), 2);
    relay(&[Action::ShapeCreated(theirs)], &mut b);
    assert_eq!(b.selection(), Some(ObjectRef::TextBox(mine.id)));
}

#[test]
fn relay_control_events_are_ignored() {
    let mut core = engine();
    let join = SyncEvent::Join(JoinPayload { email: "a@x.io".into(), whiteboard_id: WB.into() });
    assert!(!core.apply_event(&join));
}

// =============================================================
// Presence
// =============================================================

#[test]
fn presence_follows_roster_events() {
    let mut core = engine();
    core.apply_event(&SyncEvent::UserList(vec!["a@x.io".into(), "b@x.io".into()]));

    let payload = core.cursor_payload(pt(15.0, 25.0), "a@x.io", WB);
    assert!(core.apply_event(&SyncEvent::CursorMove(payload)));
    assert!(core.presence.cursor("a@x.io").is_some());

    core.apply_event(&SyncEvent::UserDisconnected("a@x.io".into()));
    assert!(core.presence.cursor("a@x.io").is_none());
    assert!(core.presence.is_member("b@x.io"));
}

#[test]
fn cursor_payload_reports_world_coordinates_and_camera() {
    let mut core = engine();
    core.camera = Camera { pan_x: 10.0, pan_y: 20.0, zoom: 2.0 };
    let p = core.cursor_payload(pt(30.0, 40.0), "a@x.io", WB);
    assert_eq!((p.x, p.y), (10.0, 10.0));
    assert_eq!(p.zoom_level, 2.0);
    assert_eq!(p.canvas_position, pt(10.0, 20.0));
    assert_eq!(p.whiteboard_id, WB);
}

// =============================================================
// Persistence
// =============================================================

#[test]
fn snapshot_then_load_reproduces_objects_and_composite() {
    let mut a = engine();
    a.set_tool(Tool::Pen);
    a.on_pointer_down(pt(5.0, 5.0), 0);
    a.on_pointer_move(pt(100.0, 80.0));
    a.on_pointer_up(pt(100.0, 80.0));
    place_text_box(&mut a, pt(20.0, 20.0), 10);
    place_shape(&mut a, ShapeKind::ArrowOutline, pt(50.0, 120.0), 11);
    a.camera = Camera { pan_x: 3.0, pan_y: 4.0, zoom: 1.25 };

    let snap = a.snapshot(Some("Plan".into()), Some("a@x.io".into()), 99).expect("snapshot");
    let doc = WhiteboardDocument::from_snapshot("doc-1".into(), "a@x.io", snap.clone());

    let mut b = engine();
    b.load_document(&doc).expect("load");

    assert_eq!(b.store.text_boxes().cloned().collect::<Vec<_>>(), snap.text_boxes);
    assert_eq!(b.store.shapes().cloned().collect::<Vec<_>>(), snap.shapes);
    assert_eq!(b.camera, a.camera);
    assert_eq!(b.ink, a.ink);

    let again = b.snapshot(None, None, 100).expect("snapshot");
    assert_eq!(again.image_data, snap.image_data);
}

#[test]
fn legacy_document_loads_ink_from_image_data() {
    let mut a = engine();
    a.set_tool(Tool::Pen);
    a.on_pointer_down(pt(5.0, 5.0), 0);
    a.on_pointer_move(pt(50.0, 5.0));
    let mut snap = a.snapshot(None, None, 1).expect("snapshot");
    snap.image_data = snap.ink_data.take().expect("ink");
    let doc = WhiteboardDocument::from_snapshot("d".into(), "a@x.io", snap);

    let mut b = engine();
    b.load_document(&doc).expect("load");
    assert_eq!(b.ink, a.ink);
}

#[test]
fn bad_document_image_leaves_engine_untouched() {
    let mut core = engine();
    let tb = place_text_box(&mut core, pt(0.0, 0.0), 1);
    let snap = core.snapshot(None, None, 1).expect("snapshot");
    let mut doc = WhiteboardDocument::from_snapshot("d".into(), "a@x.io", snap);
    doc.ink_data = Some("data:image/gif;base64,R0lG".into());
    doc.text_boxes.clear();

    assert!(core.load_document(&doc).is_err());
    assert!(core.text_box(tb.id).is_some());
}

#[test]
fn empty_document_loads_blank_ink_at_current_size() {
    let mut core = engine();
    core.set_tool(Tool::Pen);
    core.on_pointer_down(pt(5.0, 5.0), 0);
    core.on_pointer_move(pt(50.0, 5.0));
    let doc: WhiteboardDocument = serde_json::from_value(serde_json::json!({"id": "d"})).expect("doc");
    core.load_document(&doc).expect("load");
    assert!(core.ink.is_blank());
    assert_eq!((core.ink.width(), core.ink.height()), (320, 240));
}

// =============================================================
// Actions
// =============================================================

#[test]
fn actions_map_to_outbound_events() {
    let mut core = engine();
    let tb = place_text_box(&mut core, pt(0.0, 0.0), 1);
    let ev = Action::TextBoxCreated(tb).to_event(WB).expect("event");
    assert_eq!(ev.event_name(), "addTextBox");
    assert_eq!(ev.whiteboard_id(), Some(WB));
    assert!(Action::RenderNeeded.to_event(WB).is_none());
    assert!(!Action::RenderNeeded.is_mutation());
}
