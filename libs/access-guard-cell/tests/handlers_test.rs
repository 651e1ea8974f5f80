use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use access_guard_cell::*;
use shared_utils::test_utils::{JwtTestUtils, MockApiResponses, TestConfig, TestUser};

async fn evaluate(server: &MockServer, user: &TestUser, route: &str) -> (StatusCode, Value) {
    let config = TestConfig::default().with_api_url(server.uri());
    let token = JwtTestUtils::create_test_token(user, &config.jwt_secret, Some(1));
    let app_config = config.to_arc();
    let guard = Arc::new(AccessGuardService::new(Arc::new(RestOnboardingStatusSource::new(&app_config))));
    let app = access_guard_routes(Arc::new(GuardCellState { config: app_config, guard }));

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/evaluate?path={}", route))
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn profile_server(user: &TestUser, status: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([MockApiResponses::doctor_profile_response(&user.id, status)])),
        )
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_pending_doctor_is_redirected_to_application_status() {
    let doctor = TestUser::doctor("doc@example.com");
    let server = profile_server(&doctor, "PENDING").await;

    let (status, json) = evaluate(&server, &doctor, "/schedule").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["decision"], "redirect");
    assert_eq!(json["redirectTo"], "/application-status");
    assert_eq!(json["error"], Value::Null);
}

#[tokio::test]
async fn test_verified_doctor_may_enter_consultation() {
    let doctor = TestUser::doctor("doc@example.com");
    let server = profile_server(&doctor, "VERIFIED").await;

    let (status, json) = evaluate(&server, &doctor, "/consultation/c-1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["decision"], "allow");
}

#[tokio::test]
async fn test_patient_gets_authorization_error() {
    let server = MockServer::start().await;
    let patient = TestUser::patient("p@example.com");

    let (_, json) = evaluate(&server, &patient, "/dashboard").await;

    assert_eq!(json["redirectTo"], "/login");
    assert_eq!(json["error"], GuardError::Unauthorized.user_message());
}

#[tokio::test]
async fn test_status_outage_maps_to_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let doctor = TestUser::doctor("doc@example.com");

    let (status, _) = evaluate(&server, &doctor, "/dashboard").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}
