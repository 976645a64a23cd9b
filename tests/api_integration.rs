//! HTTP surface integration tests
//!
//! Drive the axum router with `tower::ServiceExt::oneshot`; no socket is bound.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use school_notification_service::config::Settings;
use school_notification_service::provider::{LogPushProvider, PushProvider, UnconfiguredPushProvider};
use school_notification_service::registry::{MemoryClassRoster, MemoryTokenRegistry};
use school_notification_service::server::{create_app, AppState};

const API_KEY: &str = "test-api-key";

fn app_with(provider: Arc<dyn PushProvider>) -> Router {
    let mut settings = Settings::default();
    settings.api.key = Some(API_KEY.to_string());

    let state = AppState::from_parts(
        settings,
        Arc::new(MemoryTokenRegistry::new()),
        Arc::new(MemoryClassRoster::new()),
        provider,
    );
    create_app(state)
}

fn app() -> Router {
    app_with(Arc::new(LogPushProvider::new()))
}

fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("X-API-Key", API_KEY)
        .header("content-type", "application/json");
    match body {
        Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn direct_notification(owner_id: &str) -> Value {
    json!({
        "tenant_id": "s1",
        "target": {"kind": "direct", "owner_id": owner_id},
        "message": {"title": "Attendance", "body": "Your child was marked absent today"},
        "data": {"attendance_id": "att-3"},
        "created_by": "teacher-1"
    })
}

#[tokio::test]
async fn test_register_dispatch_and_revoke() {
    let app = app();

    let (status, token) = send(
        &app,
        request(
            "POST",
            "/api/v1/device-tokens",
            Some(json!({
                "token": "fcm-token-abcdefghijklmnop",
                "owner_id": "parent-1",
                "tenant_id": "s1",
                "role": "parent",
                "device_kind": "android"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(token["is_active"], true);
    assert_eq!(token["device_kind"], "android");
    // Raw token is never echoed
    assert_ne!(token["token"], "fcm-token-abcdefghijklmnop");
    let id = token["id"].as_str().unwrap().to_string();

    // Same token again updates the record
    let (status, again) = send(
        &app,
        request(
            "POST",
            "/api/v1/device-tokens",
            Some(json!({
                "token": "fcm-token-abcdefghijklmnop",
                "owner_id": "parent-1",
                "tenant_id": "s1",
                "role": "parent"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["id"], id.as_str());
    assert_eq!(again["device_kind"], "android");

    let (status, report) = send(
        &app,
        request(
            "POST",
            "/api/v1/notifications/dispatch",
            Some(direct_notification("parent-1")),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["success"], true);
    assert_eq!(report["success_count"], 1);
    assert_eq!(report["channel_attempted"], "token_list");
    assert!(report["issued_at"].is_string());

    let (status, _) = send(
        &app,
        request(
            "PUT",
            &format!("/api/v1/device-tokens/{}/active", id),
            Some(json!({"is_active": false})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, record) = send(&app, request("GET", &format!("/api/v1/device-tokens/{}", id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["is_active"], false);

    let (status, report) = send(
        &app,
        request(
            "POST",
            "/api/v1/notifications/dispatch",
            Some(direct_notification("parent-1")),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["success"], false);
    assert_eq!(report["errors"], json!(["EMPTY_AUDIENCE"]));
}

#[tokio::test]
async fn test_announcement_fallback_over_http() {
    let app = app();

    let (status, report) = send(
        &app,
        request(
            "POST",
            "/api/v1/notifications/dispatch",
            Some(json!({
                "tenant_id": "s1",
                "target": {"kind": "announcement", "tenant_id": "s1"},
                "message": {"title": "Sports day", "body": "Sports day moved to Friday"},
                "created_by": "admin-1"
            })),
        ),
    )
    .await;

    // The dry-run provider accepts every topic
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["fallback_used"], true);
    assert_eq!(report["channel_attempted"], "topic");
    assert_eq!(report["success_count"], 1);
}

#[tokio::test]
async fn test_invalid_selector_is_bad_request() {
    let app = app();

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/v1/notifications/dispatch",
            Some(direct_notification("")),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_SELECTOR");
}

#[tokio::test]
async fn test_unavailable_provider_is_service_unavailable() {
    let app = app_with(Arc::new(UnconfiguredPushProvider));

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/v1/notifications/dispatch",
            Some(direct_notification("parent-1")),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "PROVIDER_UNAVAILABLE");
}

#[tokio::test]
async fn test_incomplete_registration_is_rejected() {
    let app = app();

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/v1/device-tokens",
            Some(json!({
                "token": "",
                "owner_id": "parent-1",
                "tenant_id": "s1",
                "role": "parent"
            })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unknown_token_is_not_found() {
    let app = app();
    let id = uuid::Uuid::new_v4();

    let (status, _) = send(
        &app,
        request(
            "PUT",
            &format!("/api/v1/device-tokens/{}/active", id),
            Some(json!({"is_active": true})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, request("GET", &format!("/api/v1/device-tokens/{}", id), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_api_key_is_required() {
    let app = app();

    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/notifications/dispatch")
        .header("content-type", "application/json")
        .body(Body::from(direct_notification("parent-1").to_string()))
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    assert_eq!(body["error"]["message"], "Missing API key");

    let req = Request::builder()
        .method("GET")
        .uri("/api/v1/device-tokens/00000000-0000-0000-0000-000000000000")
        .header("X-API-Key", "wrong")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_health_stats_and_metrics_are_public() {
    let app = app();

    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, health) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["provider"]["name"], "log");
    assert_eq!(health["registry"]["backend"], "memory");

    let req = Request::builder().uri("/stats").body(Body::empty()).unwrap();
    let (status, stats) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["registry"]["total_tokens"], 0);

    let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("school_notify_device_tokens_active"));
}
