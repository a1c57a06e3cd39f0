use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use lilead_backend::{app, AppState};
use lilead_config::AppConfig;
use lilead_db::{DbClient, DeviceTokenRepository};
use lilead_firebase::FcmPushGateway;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn test_state() -> AppState {
    let db = DbClient::from_url("sqlite::memory:").await.unwrap();
    AppState::new(
        Arc::new(AppConfig::default()),
        db,
        FcmPushGateway::disabled("not configured in tests"),
    )
    .await
    .unwrap()
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_status_starts_scheduler_idempotently() {
    let state = test_state().await;
    assert!(!state.scheduler.is_running().await);

    for _ in 0..2 {
        let request = Request::builder()
            .uri("/api/notifications/status")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(state.clone()), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["scheduler"], "running");
        assert_eq!(body["data"]["push_enabled"], false);
        assert_eq!(body["data"]["tick_interval_secs"], 60);
    }
    assert!(state.scheduler.is_running().await);

    state.scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_register_token() {
    let state = test_state().await;

    let (status, body) = send(
        app(state.clone()),
        json_request(
            Method::POST,
            "/api/notifications/register",
            json!({ "user_id": "alice", "token": "tok-1", "platform": "ios" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["registered"], true);
    assert_eq!(body["data"]["platform"], "ios");

    let tokens = state.devices.tokens_for_user("alice").await.unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].token, "tok-1");
}

#[tokio::test]
async fn test_register_same_token_for_other_user_reassigns_it() {
    let state = test_state().await;

    for user in ["alice", "bob"] {
        let (status, _) = send(
            app(state.clone()),
            json_request(
                Method::POST,
                "/api/notifications/register",
                json!({ "user_id": user, "token": "tok-shared", "platform": "android" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    assert!(state.devices.tokens_for_user("alice").await.unwrap().is_empty());
    assert_eq!(state.devices.tokens_for_user("bob").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_register_rejects_invalid_input() {
    let state = test_state().await;

    let cases = [
        json!({ "user_id": "alice", "token": "tok-1", "platform": "windows" }),
        json!({ "user_id": "alice", "token": "  ", "platform": "web" }),
        json!({ "user_id": "", "token": "tok-1", "platform": "web" }),
        json!({ "user_id": "alice", "platform": "web" }),
    ];

    for case in cases {
        let (status, body) = send(
            app(state.clone()),
            json_request(Method::POST, "/api/notifications/register", case.clone()),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{case}");
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());
    }

    assert!(state.devices.tokens_for_user("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unregister_token() {
    let state = test_state().await;
    state
        .devices
        .register("alice", "tok-1", lilead_common::Platform::Web)
        .await
        .unwrap();

    let (status, body) = send(
        app(state.clone()),
        json_request(
            Method::DELETE,
            "/api/notifications/register",
            json!({ "token": "tok-1" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["unregistered"], true);
    assert!(state.devices.find_by_token("tok-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_unregister_unknown_token_is_not_an_error() {
    let state = test_state().await;

    let (status, body) = send(
        app(state),
        json_request(
            Method::DELETE,
            "/api/notifications/register",
            json!({ "token": "never-registered" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["unregistered"], false);
}
