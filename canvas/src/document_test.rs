#![allow(clippy::float_cmp)]

use serde_json::json;

use super::*;

fn snapshot(name: Option<&str>) -> DocumentSnapshot {
    DocumentSnapshot {
        name: name.map(str::to_owned),
        created_by: None,
        image_data: "data:image/png;base64,AAAA".to_owned(),
        ink_data: Some("data:image/png;base64,BBBB".to_owned()),
        text_boxes: Vec::new(),
        shapes: Vec::new(),
        canvas_position: Point::new(4.0, 5.0),
        zoom_level: 1.5,
        timestamp: 99,
    }
}

#[test]
fn document_uses_camel_case_keys() {
    let doc = WhiteboardDocument::from_snapshot("d1".into(), "a@x.io", snapshot(Some("Plan")));
    let value = serde_json::to_value(&doc).unwrap();
    assert_eq!(value["createdBy"], "a@x.io");
    assert_eq!(value["canvasPosition"], json!({"x": 4.0, "y": 5.0}));
    assert_eq!(value["zoomLevel"], 1.5);
    assert_eq!(value["sharedWith"], json!([]));
    assert_eq!(value["inkData"], "data:image/png;base64,BBBB");
}

#[test]
fn legacy_document_without_ink_or_camera_parses() {
    let doc: WhiteboardDocument = serde_json::from_value(json!({
        "id": "d1",
        "name": "Old",
        "createdBy": "a@x.io",
        "imageData": "data:image/png;base64,AAAA",
        "textBoxes": [{"id": 1, "x": 0, "y": 0, "width": 200, "height": 40, "text": "t", "isSelected": false}],
        "timestamp": 5
    }))
    .unwrap();
    assert!(doc.ink_data.is_none());
    assert_eq!(doc.zoom_level, 1.0);
    assert_eq!(doc.text_boxes.len(), 1);
    assert!(doc.shapes.is_empty());
}

#[test]
fn apply_snapshot_keeps_name_when_absent() {
    let mut doc = WhiteboardDocument::from_snapshot("d1".into(), "a@x.io", snapshot(Some("Plan")));
    doc.shared_with.push("b@x.io".into());

    let mut next = snapshot(None);
    next.timestamp = 200;
    doc.apply_snapshot(next);

    assert_eq!(doc.name, "Plan");
    assert_eq!(doc.timestamp, 200);
    assert_eq!(doc.shared_with, vec!["b@x.io".to_owned()]);
    assert_eq!(doc.created_by, "a@x.io");
}

#[test]
fn from_snapshot_prefers_declared_creator() {
    let mut snap = snapshot(None);
    snap.created_by = Some("owner@x.io".into());
    let doc = WhiteboardDocument::from_snapshot("d1".into(), "caller@x.io", snap);
    assert_eq!(doc.created_by, "owner@x.io");
}

#[test]
fn notes_defaults() {
    let notes: Notes = serde_json::from_value(json!({"content": "todo"})).unwrap();
    assert_eq!(notes.font_size, 16);
    assert_eq!(notes.font_family, "Arial");
    assert_eq!(Notes::default().content, "");
}

#[test]
fn roles_order_by_privilege() {
    assert!(Role::Owner.can_manage());
    assert!(!Role::Editor.can_manage());
    assert!(Role::Editor.can_edit());
    assert!(!Role::Viewer.can_edit());
    assert_eq!(Role::parse(" Viewer "), Some(Role::Viewer));
    assert_eq!(Role::parse("admin"), None);
    assert_eq!(Role::Editor.as_str(), "editor");
}

#[test]
fn collaborator_request_role_is_optional() {
    let req: CollaboratorRequest = serde_json::from_value(json!({"email": "b@x.io"})).unwrap();
    assert_eq!(req.role, None);
    let req: CollaboratorRequest = serde_json::from_value(json!({"email": "b@x.io", "role": "viewer"})).unwrap();
    assert_eq!(req.role, Some(Role::Viewer));
}
