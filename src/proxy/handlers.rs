//! HTTP request handlers.

use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};

use super::server::{AppState, RequestId};
use super::types::ForwardRequest;
use crate::error::Error;

/// Path of the forwarding endpoint.
pub const RELAY_PATH: &str = "/api/relay";

/// Routes listed in 404 responses.
pub const AVAILABLE_ROUTES: [&str; 3] = ["GET /", "GET /health", "POST /api/relay"];

/// Handle POST /api/relay
pub async fn relay(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<ForwardRequest>, JsonRejection>,
) -> Response {
    let start = std::time::Instant::now();

    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!(
                request_id = %request_id.0,
                error = %rejection.body_text(),
                "Rejected relay request body"
            );
            return Error::InvalidRequestBody(rejection.body_text()).into_response();
        }
    };

    let destination = request.destination_label().to_string();
    tracing::info!(
        request_id = %request_id.0,
        method = %Method::POST,
        path = RELAY_PATH,
        destination = %destination,
        "Received relay request"
    );

    let result = state.relay.forward(request).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(outcome) => {
            tracing::info!(
                request_id = %request_id.0,
                destination = %destination,
                upstream_status = outcome.status().as_u16(),
                streaming = outcome.is_streaming(),
                latency_ms,
                "Relay request completed"
            );
            outcome.into_response()
        }
        Err(e) => {
            tracing::warn!(
                request_id = %request_id.0,
                destination = %destination,
                status = e.status_code().as_u16(),
                error = %e,
                latency_ms,
                "Relay request failed"
            );
            e.into_response()
        }
    }
}

/// Handle GET /health and GET /
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Fallback for unknown routes.
pub async fn not_found(method: Method, uri: Uri) -> impl IntoResponse {
    tracing::debug!(method = %method, path = %uri.path(), "No route matched");
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "success": false,
            "error": "Route not found",
            "path": uri.path(),
            "method": method.as_str(),
            "availableRoutes": AVAILABLE_ROUTES,
        })),
    )
}
