use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use polyvox_relay::{app, AppState, ProviderConfig, RoomRegistry};
use polyvox_token::TokenIssuer;

const SECRET: &[u8] = b"test-secret";

type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

struct Relay {
    addr: SocketAddr,
    state: AppState,
    issuer: TokenIssuer,
}

impl Relay {
    async fn spawn() -> Self {
        let state = AppState {
            registry: RoomRegistry::new(),
            issuer: Some(Arc::new(TokenIssuer::new(SECRET.to_vec()).unwrap())),
            mirror: None,
            http: reqwest::Client::new(),
            provider: ProviderConfig::default(),
        };

        let app = app(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            issuer: TokenIssuer::new(SECRET.to_vec()).unwrap(),
        }
    }

    async fn connect(&self, room_id: &str, peer_id: &str, name: &str) -> WsClient {
        let minted = self.issuer.mint(room_id, peer_id, Some(name)).unwrap();
        let url = format!("ws://{}/ws?token={}", self.addr, minted.token);
        let (stream, _) = connect_async(url).await.expect("failed to connect");
        stream
    }
}

async fn recv_json(ws: &mut WsClient) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for message")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("failed to parse json");
        }
    }
}

async fn send_json(ws: &mut WsClient, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("failed to send");
}

#[tokio::test]
async fn join_is_broadcast_to_the_whole_room() {
    let relay = Relay::spawn().await;

    let mut alice = relay.connect("room-1", "alice", "Alice").await;

    // The newcomer sees its own join echo.
    let own_join = recv_json(&mut alice).await;
    assert_eq!(own_join["type"], "peer-join");
    assert_eq!(own_join["peerId"], "alice");
    assert_eq!(own_join["name"], "Alice");
    assert_eq!(own_join["roomId"], "room-1");
    assert!(own_join["ts"].as_u64().unwrap() > 0);

    // Existing members see the next join.
    let mut bob = relay.connect("room-1", "bob", "Bob").await;
    let seen_by_alice = recv_json(&mut alice).await;
    assert_eq!(seen_by_alice["type"], "peer-join");
    assert_eq!(seen_by_alice["peerId"], "bob");

    let seen_by_bob = recv_json(&mut bob).await;
    assert_eq!(seen_by_bob["peerId"], "bob");
}

#[tokio::test]
async fn relay_stamps_identity_and_timestamp() {
    let relay = Relay::spawn().await;
    let mut alice = relay.connect("room-1", "alice", "Alice").await;
    recv_json(&mut alice).await; // own join
    let mut bob = relay.connect("room-1", "bob", "Bob").await;
    recv_json(&mut alice).await; // bob's join
    recv_json(&mut bob).await; // own join

    // Bob tries to forge both the sender identity and the timestamp.
    send_json(
        &mut bob,
        json!({
            "type": "offer",
            "target": "alice",
            "sdp": "v=0\r\n",
            "peerId": "mallory",
            "ts": 1
        }),
    )
    .await;

    let received = recv_json(&mut alice).await;
    assert_eq!(received["type"], "offer");
    assert_eq!(received["target"], "alice");
    assert_eq!(received["sdp"], "v=0\r\n");
    // The relay's stamp wins over anything the client sent.
    assert_eq!(received["peerId"], "bob");
    assert!(received["ts"].as_u64().unwrap() > 1_000_000_000_000);
}

#[tokio::test]
async fn malformed_payloads_are_dropped_silently() {
    let relay = Relay::spawn().await;
    let mut alice = relay.connect("room-1", "alice", "Alice").await;
    recv_json(&mut alice).await;
    let mut bob = relay.connect("room-1", "bob", "Bob").await;
    recv_json(&mut alice).await;
    recv_json(&mut bob).await;

    // Garbage, a relay-only tag, and an unknown tag: none may close the
    // socket or produce an error frame.
    send_json(&mut bob, json!({ "type": "peer-join", "peerId": "x" })).await;
    ws_send_raw(&mut bob, "not json at all").await;
    send_json(&mut bob, json!({ "type": "mystery" })).await;
    send_json(&mut bob, json!({ "type": "chat", "text": "still here" })).await;

    // The only thing that arrives is the valid chat.
    let received = recv_json(&mut alice).await;
    assert_eq!(received["type"], "chat");
    assert_eq!(received["text"], "still here");
    assert_eq!(received["peerId"], "bob");
}

async fn ws_send_raw(ws: &mut WsClient, text: &str) {
    ws.send(Message::Text(text.to_string().into()))
        .await
        .expect("failed to send");
}

#[tokio::test]
async fn fanout_is_scoped_to_the_room() {
    let relay = Relay::spawn().await;
    let mut alice = relay.connect("room-1", "alice", "Alice").await;
    recv_json(&mut alice).await;
    let mut carol = relay.connect("room-2", "carol", "Carol").await;
    recv_json(&mut carol).await;

    send_json(&mut alice, json!({ "type": "chat", "text": "room 1 only" })).await;
    // Alice gets her own broadcast back; Carol hears nothing.
    let received = recv_json(&mut alice).await;
    assert_eq!(received["text"], "room 1 only");

    let nothing = timeout(Duration::from_millis(300), carol.next()).await;
    assert!(nothing.is_err(), "message leaked across rooms");
}

#[tokio::test]
async fn leave_is_broadcast_and_empty_rooms_are_deleted() {
    let relay = Relay::spawn().await;
    let mut alice = relay.connect("room-1", "alice", "Alice").await;
    recv_json(&mut alice).await;
    let mut bob = relay.connect("room-1", "bob", "Bob").await;
    recv_json(&mut alice).await;
    recv_json(&mut bob).await;

    bob.close(None).await.unwrap();

    let leave = recv_json(&mut alice).await;
    assert_eq!(leave["type"], "peer-leave");
    assert_eq!(leave["peerId"], "bob");
    assert_eq!(leave["roomId"], "room-1");

    alice.close(None).await.unwrap();

    // Cleanup races the close; poll until the registry drains.
    for _ in 0..50 {
        if relay.state.registry.room_count().await == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("room was not deleted after the last peer left");
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let relay = Relay::spawn().await;
    let url = format!("ws://{}/ws", relay.addr);

    let err = connect_async(url).await.expect_err("handshake should fail");
    match err {
        tokio_tungstenite::tungstenite::Error::Http(response) => {
            assert_eq!(response.status(), 401);
        }
        other => panic!("expected HTTP error, got {:?}", other),
    }
}

#[tokio::test]
async fn invalid_token_is_unauthorized() {
    let relay = Relay::spawn().await;

    // Signed by a different secret.
    let other = TokenIssuer::new(b"other-secret".to_vec()).unwrap();
    let minted = other.mint("room-1", "alice", None).unwrap();
    let url = format!("ws://{}/ws?token={}", relay.addr, minted.token);

    let err = connect_async(url).await.expect_err("handshake should fail");
    match err {
        tokio_tungstenite::tungstenite::Error::Http(response) => {
            assert_eq!(response.status(), 401);
        }
        other => panic!("expected HTTP error, got {:?}", other),
    }
}
