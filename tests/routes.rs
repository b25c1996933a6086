//! Integration tests for the surrounding HTTP surface.
//!
//! Covers health endpoints, the JSON 404 fallback, request id tagging and
//! CORS preflight handling.

use axum::body::Body;
use http::Request;
use serde_json::Value;
use tower::ServiceExt;

use relaygate::config::Config;
use relaygate::proxy::{create_router, AppState, AVAILABLE_ROUTES, REQUEST_ID_HEADER};

fn setup_app() -> axum::Router {
    create_router(AppState::from_config(Config::default()).expect("app state"))
}

/// Parse the response body as JSON and return (status_code, json_value).
async fn parse_body(response: axum::response::Response) -> (http::StatusCode, Value) {
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
        .await
        .expect("read body");
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or_default();
    (status, json)
}

#[tokio::test]
async fn health_reports_ok_with_timestamp() {
    let request = Request::get("/health").body(Body::empty()).unwrap();
    let response = setup_app().oneshot(request).await.unwrap();
    let (status, json) = parse_body(response).await;

    assert_eq!(status, http::StatusCode::OK);
    assert_eq!(json["status"], "ok");
    let timestamp = json["timestamp"].as_str().expect("timestamp string");
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
}

#[tokio::test]
async fn root_doubles_as_health() {
    let request = Request::get("/").body(Body::empty()).unwrap();
    let response = setup_app().oneshot(request).await.unwrap();
    let (status, json) = parse_body(response).await;

    assert_eq!(status, http::StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn unknown_route_returns_json_404() {
    let request = Request::delete("/nope/here").body(Body::empty()).unwrap();
    let response = setup_app().oneshot(request).await.unwrap();
    let (status, json) = parse_body(response).await;

    assert_eq!(status, http::StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);
    assert_eq!(json["path"], "/nope/here");
    assert_eq!(json["method"], "DELETE");
    let routes: Vec<&str> = json["availableRoutes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r.as_str().unwrap())
        .collect();
    assert_eq!(routes, AVAILABLE_ROUTES.to_vec());
}

#[tokio::test]
async fn wrong_method_on_relay_returns_json_404() {
    let request = Request::get("/api/relay").body(Body::empty()).unwrap();
    let response = setup_app().oneshot(request).await.unwrap();
    let (status, json) = parse_body(response).await;

    assert_eq!(status, http::StatusCode::NOT_FOUND);
    assert_eq!(json["path"], "/api/relay");
    assert_eq!(json["method"], "GET");
}

#[tokio::test]
async fn every_response_carries_a_request_id() {
    let first = setup_app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let second = setup_app()
        .oneshot(Request::get("/missing").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let a = first.headers().get(REQUEST_ID_HEADER).expect("request id on 200");
    let b = second.headers().get(REQUEST_ID_HEADER).expect("request id on 404");
    assert!(uuid::Uuid::parse_str(a.to_str().unwrap()).is_ok());
    assert_ne!(a, b);
}

#[tokio::test]
async fn cors_preflight_allows_any_origin_by_default() {
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/relay")
        .header("origin", "https://app.example")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .body(Body::empty())
        .unwrap();
    let response = setup_app().oneshot(request).await.unwrap();

    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn cors_restricted_origin_list() {
    let mut config = Config::default();
    config.cors.allowed_origins = vec!["https://allowed.example".to_string()];
    let app = create_router(AppState::from_config(config).unwrap());

    let request = Request::get("/health")
        .header("origin", "https://allowed.example")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "https://allowed.example"
    );

    let request = Request::get("/health")
        .header("origin", "https://other.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(response.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let mut config = Config::default();
    config.server.body_limit_bytes = 64;
    let app = create_router(AppState::from_config(config).unwrap());

    let body = serde_json::json!({
        "destinationId": "p",
        "credential": "t",
        "payload": "x".repeat(1024),
    });
    let request = Request::post("/api/relay")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let (status, json) = parse_body(response).await;

    assert_eq!(status, http::StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}
