use std::time::Duration;

use canvas::doc::TextBoxObject;
use canvas::protocol::TextBoxPayload;
use serde_json::json;

use super::*;

async fn next_frame(transport: &impl Transport) -> Frame {
    match tokio::time::timeout(Duration::from_secs(2), transport.recv()).await {
        Ok(Some(TransportEvent::Frame(frame))) => frame,
        other => panic!("expected frame, got {other:?}"),
    }
}

async fn assert_silent(transport: &impl Transport) {
    let got = tokio::time::timeout(Duration::from_millis(50), transport.recv()).await;
    assert!(got.is_err(), "expected no event, got {got:?}");
}

fn add_text_box(whiteboard_id: &str) -> SyncEvent {
    SyncEvent::AddTextBox(TextBoxPayload {
        text_box: TextBoxObject {
            id: 1000,
            x: 10.0,
            y: 10.0,
            width: 200.0,
            height: 40.0,
            text: "hi".to_owned(),
            rotation: 0.0,
            is_editing: false,
        },
        whiteboard_id: whiteboard_id.to_owned(),
    })
}

async fn joined_pair(relay: &LocalRelay) -> (LocalTransport, LocalTransport) {
    let a = relay.connect();
    let b = relay.connect();
    a.join("wb-1", "a@x.io").await.unwrap();
    next_frame(&a).await;
    b.join("wb-1", "b@x.io").await.unwrap();
    next_frame(&b).await;
    next_frame(&a).await;
    (a, b)
}

// =============================================================================
// LOCAL RELAY
// =============================================================================

#[tokio::test]
async fn join_sends_roster_to_joiner_and_notice_to_others() {
    let relay = LocalRelay::new();
    let a = relay.connect();
    let b = relay.connect();

    a.join("wb-1", "a@x.io").await.unwrap();
    let roster = next_frame(&a).await;
    assert_eq!(roster.event, events::USER_LIST);
    assert_eq!(roster.data, json!(["a@x.io"]));

    b.join("wb-1", "b@x.io").await.unwrap();
    assert_eq!(next_frame(&b).await.data, json!(["a@x.io", "b@x.io"]));
    let joined = next_frame(&a).await;
    assert_eq!(joined.event, events::USER_JOINED);
    assert_eq!(joined.data, json!("b@x.io"));
}

#[tokio::test]
async fn room_events_reach_peers_but_not_sender() {
    let relay = LocalRelay::new();
    let (a, b) = joined_pair(&relay).await;

    a.broadcast(&add_text_box("wb-1")).await.unwrap();

    let frame = next_frame(&b).await;
    assert_eq!(frame.event, events::ADD_TEXT_BOX);
    assert_eq!(frame.from.as_deref(), Some("a@x.io"));
    assert_eq!(SyncEvent::from_frame(&frame).unwrap(), add_text_box("wb-1"));
    assert_silent(&a).await;
}

#[tokio::test]
async fn mismatched_whiteboard_id_is_rejected() {
    let relay = LocalRelay::new();
    let (a, b) = joined_pair(&relay).await;

    a.broadcast(&add_text_box("wb-2")).await.unwrap();

    let err = next_frame(&a).await;
    assert_eq!(err.event, events::RELAY_ERROR);
    assert_silent(&b).await;
}

#[tokio::test]
async fn room_events_before_join_are_rejected() {
    let relay = LocalRelay::new();
    let a = relay.connect();
    a.broadcast(&add_text_box("wb-1")).await.unwrap();
    let err = next_frame(&a).await;
    assert_eq!(err.event, events::RELAY_ERROR);
    assert_eq!(err.data["message"], "must join a whiteboard first");
}

#[tokio::test]
async fn rooms_are_isolated() {
    let relay = LocalRelay::new();
    let a = relay.connect();
    let c = relay.connect();
    a.join("wb-1", "a@x.io").await.unwrap();
    c.join("wb-2", "c@x.io").await.unwrap();
    next_frame(&a).await;
    next_frame(&c).await;

    a.broadcast(&add_text_box("wb-1")).await.unwrap();
    assert_silent(&c).await;
    assert_eq!(relay.roster("wb-2"), vec!["c@x.io".to_owned()]);
}

#[tokio::test]
async fn second_connection_of_same_user_keeps_roster_stable() {
    let relay = LocalRelay::new();
    let (a, b) = joined_pair(&relay).await;

    let a2 = relay.connect();
    a2.join("wb-1", "a@x.io").await.unwrap();
    assert_eq!(next_frame(&a2).await.data, json!(["a@x.io", "b@x.io"]));
    assert_silent(&b).await;

    drop(a2);
    assert_silent(&b).await;
    assert_eq!(relay.roster("wb-1"), vec!["a@x.io".to_owned(), "b@x.io".to_owned()]);
    drop(a);
    let gone = next_frame(&b).await;
    assert_eq!(gone.event, events::USER_DISCONNECTED);
    assert_eq!(gone.data, json!("a@x.io"));
}

#[tokio::test]
async fn dropped_connection_signals_and_recovers() {
    let relay = LocalRelay::new();
    let (a, b) = joined_pair(&relay).await;

    a.drop_connection();
    assert_eq!(a.recv().await, Some(TransportEvent::Disconnected));
    assert_eq!(next_frame(&b).await.event, events::USER_DISCONNECTED);
    assert!(matches!(a.broadcast(&add_text_box("wb-1")).await, Err(TransportError::Closed)));

    a.reconnect().await.unwrap();
    a.join("wb-1", "a@x.io").await.unwrap();
    assert_eq!(next_frame(&a).await.data, json!(["a@x.io", "b@x.io"]));
    assert_eq!(next_frame(&b).await.event, events::USER_JOINED);
}

#[tokio::test]
async fn leave_notifies_remaining_members() {
    let relay = LocalRelay::new();
    let (a, b) = joined_pair(&relay).await;

    b.leave("wb-1").await.unwrap();
    assert_eq!(next_frame(&a).await.data, json!("b@x.io"));
    assert_eq!(relay.roster("wb-1"), vec!["a@x.io".to_owned()]);
}

#[tokio::test]
async fn cursor_payload_carries_the_sender_identity() {
    let relay = LocalRelay::new();
    let (a, b) = joined_pair(&relay).await;

    let forged = json!({"email": "a@x.io", "x": 3, "y": 4, "whiteboardId": "wb-1"});
    b.send(Frame::new(events::CURSOR_MOVE, forged).with_whiteboard_id("wb-1")).await.unwrap();
    let frame = next_frame(&a).await;
    assert_eq!(frame.from.as_deref(), Some("b@x.io"));
    assert_eq!(frame.data["email"], "b@x.io");
}

#[tokio::test]
async fn unknown_event_is_rejected() {
    let relay = LocalRelay::new();
    let a = relay.connect();
    a.send(Frame::new("teleport", json!({}))).await.unwrap();
    assert_eq!(next_frame(&a).await.data["message"], "unknown event: teleport");
}

// =============================================================================
// WEBSOCKET
// =============================================================================

#[tokio::test]
async fn ws_transport_speaks_protobuf_and_reports_close() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let Some(Ok(Message::Binary(bytes))) = ws.next().await else {
            panic!("expected binary frame");
        };
        let inbound = decode_frame(&bytes).unwrap();
        let roster = SyncEvent::UserList(vec!["a@x.io".into()]).to_frame();
        ws.send(Message::binary(encode_frame(&roster))).await.unwrap();
        ws.close(None).await.unwrap();
        inbound
    });

    let transport = WsTransport::connect(format!("ws://{addr}")).await.unwrap();
    transport.join("wb-1", "a@x.io").await.unwrap();

    let inbound = server.await.unwrap();
    assert_eq!(inbound.event, events::JOIN);
    assert_eq!(inbound.whiteboard_id.as_deref(), Some("wb-1"));

    let roster = next_frame(&transport).await;
    assert_eq!(roster.data, json!(["a@x.io"]));
    let signal = tokio::time::timeout(Duration::from_secs(2), transport.recv()).await.unwrap();
    assert_eq!(signal, Some(TransportEvent::Disconnected));
}

#[tokio::test]
async fn ws_transport_accepts_json_text_frames() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let text = serde_json::to_string(&Frame::new(events::USER_JOINED, json!("b@x.io"))).unwrap();
        ws.send(Message::text(text)).await.unwrap();
        // Hold the socket open until the client goes away.
        while ws.next().await.is_some() {}
    });

    let transport = WsTransport::connect(format!("ws://{addr}")).await.unwrap();
    let frame = next_frame(&transport).await;
    assert_eq!(frame.event, events::USER_JOINED);
    assert_eq!(frame.data, json!("b@x.io"));
}

#[tokio::test]
async fn ws_connect_failure_is_a_socket_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let err = WsTransport::connect(format!("ws://{addr}")).await.err().unwrap();
    assert!(matches!(err, TransportError::Socket(_)));
}
