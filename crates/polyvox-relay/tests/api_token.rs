use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use polyvox_relay::{app, AppState, ProviderConfig, RoomRegistry};
use polyvox_token::{TokenIssuer, TOKEN_TTL_SECS};

fn test_state(secret: Option<&str>) -> AppState {
    AppState {
        registry: RoomRegistry::new(),
        issuer: secret
            .map(|s| Arc::new(TokenIssuer::new(s.as_bytes().to_vec()).unwrap())),
        mirror: None,
        http: reqwest::Client::new(),
        provider: ProviderConfig::default(),
    }
}

async fn post_token(state: AppState, body: Value) -> (StatusCode, Value) {
    let response = app(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/token")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn mints_a_verifiable_token() {
    let state = test_state(Some("test-secret"));
    let (status, body) = post_token(
        state,
        json!({ "roomId": "room-1", "peerId": "alice", "name": "Alice" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ttlSecs"], TOKEN_TTL_SECS);

    // The token round-trips through an issuer with the same secret.
    let issuer = TokenIssuer::new(b"test-secret".to_vec()).unwrap();
    let claims = issuer.verify(body["token"].as_str().unwrap()).unwrap();
    assert_eq!(claims.room_id, "room-1");
    assert_eq!(claims.peer_id, "alice");
    assert_eq!(claims.name, "Alice");
    assert_eq!(claims.exp, body["exp"].as_u64().unwrap());
}

#[tokio::test]
async fn name_defaults_to_guest() {
    let state = test_state(Some("test-secret"));
    let (status, body) = post_token(state, json!({ "roomId": "room-1", "peerId": "alice" })).await;

    assert_eq!(status, StatusCode::OK);
    let issuer = TokenIssuer::new(b"test-secret".to_vec()).unwrap();
    let claims = issuer.verify(body["token"].as_str().unwrap()).unwrap();
    assert_eq!(claims.name, "Guest");
}

#[tokio::test]
async fn missing_room_id_is_a_bad_request() {
    let state = test_state(Some("test-secret"));
    let (status, body) = post_token(state, json!({ "peerId": "alice" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("roomId"));
}

#[tokio::test]
async fn missing_peer_id_is_a_bad_request() {
    let state = test_state(Some("test-secret"));
    let (status, body) = post_token(state, json!({ "roomId": "room-1" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("peerId"));
}

#[tokio::test]
async fn unconfigured_secret_is_a_server_error() {
    let state = test_state(None);
    let (status, body) = post_token(
        state,
        json!({ "roomId": "room-1", "peerId": "alice" }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn unconfigured_provider_is_a_server_error() {
    let state = test_state(Some("test-secret"));
    let response = app(state)
        .oneshot(
            Request::builder()
                .uri("/api/realtime/session")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn plain_http_request_to_ws_requires_upgrade() {
    let state = test_state(Some("test-secret"));
    let issuer = TokenIssuer::new(b"test-secret".to_vec()).unwrap();
    let minted = issuer.mint("room-1", "alice", None).unwrap();

    let response = app(state)
        .oneshot(
            Request::builder()
                .uri(format!("/ws?token={}", minted.token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UPGRADE_REQUIRED);
}

#[tokio::test]
async fn health_check_returns_ok() {
    let state = test_state(Some("test-secret"));
    let response = app(state)
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
}
