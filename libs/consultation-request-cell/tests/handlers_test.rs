use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use consultation_request_cell::*;
use realtime_channel_cell::testing::ScriptedChannel;
use realtime_channel_cell::RealtimeChannel;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

struct Harness {
    app: Router,
    center: Arc<NotificationCenter>,
    channel: Arc<ScriptedChannel>,
    token: String,
}

fn harness_for(user: TestUser) -> Harness {
    let config = TestConfig::default();
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));
    let center = Arc::new(NotificationCenter::new(Duration::seconds(60)));
    let channel = Arc::new(ScriptedChannel::new());
    let state = Arc::new(RequestCellState::new(
        config.to_arc(),
        Arc::clone(&center),
        channel.clone() as Arc<dyn RealtimeChannel>,
    ));
    Harness { app: consultation_request_routes(state), center, channel, token }
}

fn offer(request_id: &str) -> OfferUpdate {
    let created_at = Utc::now();
    OfferUpdate::Offer(ConsultationRequest {
        request_id: request_id.to_string(),
        patient_name: "Ada Obi".to_string(),
        patient_avatar: None,
        patient_id: None,
        reason: Some("Headache".to_string()),
        symptoms: None,
        created_at,
        expires_at: created_at + Duration::seconds(60),
    })
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

#[tokio::test]
async fn test_requests_require_authentication() {
    let harness = harness_for(TestUser::doctor("doc@example.com"));
    let request = Request::builder().uri("/notifications").body(Body::empty()).unwrap();

    let (status, json) = send(harness.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Missing authorization header");
}

#[tokio::test]
async fn test_list_notifications_shows_countdown() {
    let harness = harness_for(TestUser::doctor("doc@example.com"));
    harness.center.ingest(offer("req-1")).await;

    let (status, json) = send(harness.app, authorized("GET", "/notifications", &harness.token, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["unreadCount"], 1);
    assert_eq!(json["notifications"][0]["type"], "consultation_request");
    assert_eq!(json["notifications"][0]["request"]["requestId"], "req-1");
    let remaining = json["notifications"][0]["remainingSeconds"].as_i64().unwrap();
    assert!((59..=60).contains(&remaining));
    assert_eq!(json["mostRecentUnread"]["request"]["requestId"], "req-1");
}

#[tokio::test]
async fn test_accept_returns_appointment() {
    let harness = harness_for(TestUser::doctor("doc@example.com"));
    harness.center.ingest(offer("req-1")).await;
    harness.channel.ack_with(json!({ "success": true, "appointmentId": "appt-3" }));

    let (status, json) = send(
        harness.app,
        authorized("POST", "/requests/req-1/respond", &harness.token, Some(json!({ "accept": true }))),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["appointmentId"], "appt-3");
    assert!(!harness.center.contains_request("req-1").await);
}

#[tokio::test]
async fn test_lost_race_maps_to_conflict() {
    let harness = harness_for(TestUser::doctor("doc@example.com"));
    harness.center.ingest(offer("req-1")).await;
    harness.channel.ack_with(json!({ "success": false, "error": "Request already accepted" }));

    let (status, json) = send(
        harness.app,
        authorized("POST", "/requests/req-1/respond", &harness.token, Some(json!({ "accept": true }))),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], OfferError::LostRace.user_message());
}

#[tokio::test]
async fn test_patients_cannot_respond() {
    let harness = harness_for(TestUser::patient("patient@example.com"));
    harness.center.ingest(offer("req-1")).await;

    let (status, _) = send(
        harness.app,
        authorized("POST", "/requests/req-1/respond", &harness.token, Some(json!({ "accept": true }))),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(harness.channel.emitted().is_empty());
}

#[tokio::test]
async fn test_mark_read_and_dismiss() {
    let harness = harness_for(TestUser::doctor("doc@example.com"));
    harness.center.ingest(offer("req-1")).await;
    harness.center.ingest(offer("req-2")).await;
    let first = harness.center.snapshot().await.into_iter().find(|n| n.request_id() == Some("req-1")).unwrap();

    let uri = format!("/notifications/{}/read", first.id);
    let (status, _) = send(harness.app.clone(), authorized("POST", &uri, &harness.token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(harness.center.unread_count().await, 1);

    let uri = format!("/notifications/{}", first.id);
    let (status, _) = send(harness.app.clone(), authorized("DELETE", &uri, &harness.token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!harness.center.contains_request("req-1").await);
    assert!(harness.center.contains_request("req-2").await);

    let (status, _) = send(harness.app, authorized("DELETE", &uri, &harness.token, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_status_reports_offline_indicator() {
    let harness = harness_for(TestUser::doctor("doc@example.com"));
    harness.channel.set_status(realtime_channel_cell::ConnectionStatus::Offline);

    let (status, json) = send(harness.app, authorized("GET", "/status", &harness.token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["offline"], true);
}
