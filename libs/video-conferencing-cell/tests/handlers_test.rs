use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};
use video_conferencing_cell::testing::local_participant;
use video_conferencing_cell::*;

struct Harness {
    app: Router,
    state: Arc<MediaCellState>,
    token: String,
}

fn harness() -> Harness {
    let config = TestConfig::default();
    let token = JwtTestUtils::create_test_token(&TestUser::doctor("doc@example.com"), &config.jwt_secret, Some(1));
    let bridge = MediaBridge::new(MediaBridgeConfig { join_timeout: Duration::from_secs(5), command_buffer: 16 });
    let state = Arc::new(MediaCellState::bridged(config.to_arc(), bridge));
    Harness { app: media_routes(Arc::clone(&state)), state, token }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn authorized(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token));
    match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn connect(harness: &Harness) -> tokio::sync::broadcast::Receiver<MediaCommand> {
    let mut commands = harness.state.bridge.commands();
    let controller = Arc::clone(&harness.state.controller);
    let join = tokio::spawn(async move {
        controller
            .join(&RoomDescriptor { room_url: "https://media.example.com/r".to_string(), token: None })
            .await
    });
    commands.recv().await.unwrap();

    let (status, _) = send(
        harness.app.clone(),
        authorized(
            "POST",
            "/events",
            &harness.token,
            Some(json!({ "type": "joined", "local": local_participant() })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    join.await.unwrap().unwrap();
    commands
}

#[tokio::test]
async fn test_media_routes_require_authentication() {
    let harness = harness();
    let request = Request::builder().uri("/state").body(Body::empty()).unwrap();

    let (status, _) = send(harness.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_state_starts_idle() {
    let harness = harness();

    let (status, json) = send(harness.app, authorized("GET", "/state", &harness.token, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["media"]["phase"], "idle");
    assert_eq!(json["media"]["isConnected"], false);
    assert_eq!(json["clientAttached"], false);
}

#[tokio::test]
async fn test_toggle_without_call_is_conflict() {
    let harness = harness();

    let (status, json) = send(harness.app, authorized("POST", "/mic", &harness.token, None)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], MediaError::NotConnected.user_message());
}

#[tokio::test]
async fn test_client_events_drive_connection_and_toggles() {
    let harness = harness();
    let mut commands = connect(&harness).await;

    let (status, json) = send(harness.app.clone(), authorized("GET", "/state", &harness.token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["media"]["isConnected"], true);
    assert_eq!(json["media"]["isMicOn"], true);

    let (status, json) = send(harness.app.clone(), authorized("POST", "/mic", &harness.token, None)).await;
    assert_eq!(status, StatusCode::OK);
    // Still on until the client reports the change.
    assert_eq!(json["media"]["isMicOn"], true);
    assert_eq!(commands.recv().await.unwrap(), MediaCommand::SetLocalAudio { enabled: false });

    // Already on: nothing to send.
    let (status, _) = send(
        harness.app.clone(),
        authorized("POST", "/camera", &harness.token, Some(json!({ "enabled": true }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(commands.try_recv().is_err());
}

#[tokio::test]
async fn test_clear_error() {
    let harness = harness();
    let _commands = connect(&harness).await;

    let (status, _) = send(
        harness.app.clone(),
        authorized("POST", "/events", &harness.token, Some(json!({ "type": "error", "message": "device lost" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let mut watch = harness.state.controller.watch();
    tokio::time::timeout(Duration::from_secs(2), watch.wait_for(|s| s.error.is_some()))
        .await
        .unwrap()
        .unwrap();

    let (status, _) = send(harness.app.clone(), authorized("POST", "/error/clear", &harness.token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(harness.state.controller.state().error.is_none());
}

#[tokio::test]
async fn test_unknown_event_is_rejected() {
    let harness = harness();

    let (status, _) = send(
        harness.app,
        authorized("POST", "/events", &harness.token, Some(json!({ "type": "teleported" }))),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
