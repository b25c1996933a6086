//! Error types for relaygate.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Result type alias for relaygate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for relaygate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Invalid request body: {0}")]
    InvalidRequestBody(String),

    #[error("Upstream request timed out after {timeout_ms}ms")]
    UpstreamTimeout { timeout_ms: u64 },

    #[error("Failed to reach upstream: {0}")]
    UpstreamConnection(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status reported to the client for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::MissingField(_) => StatusCode::BAD_REQUEST,
            Error::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Error::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::UpstreamConnection(_) => StatusCode::BAD_GATEWAY,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = serde_json::json!({
            "success": false,
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_missing_field_renders_400() {
        let response = Error::MissingField("destinationId").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "destinationId is required");
        assert_eq!(json["status"], 400);
    }

    #[tokio::test]
    async fn test_timeout_renders_504() {
        let response = Error::UpstreamTimeout { timeout_ms: 30_000 }.into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

        let json = body_json(response).await;
        assert_eq!(json["error"], "Upstream request timed out after 30000ms");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::UpstreamConnection("refused".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            Error::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::InvalidRequestBody("eof".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
