//! The forwarding core: one inbound request, one upstream call, one reply.

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use reqwest::Client;
use tokio::time::Instant;

use super::stream::RelayStream;
use super::types::ForwardRequest;
use super::upstream::UpstreamCall;
use crate::config::{RelayPolicy, UpstreamConfig};
use crate::error::{Error, Result};

/// Result of a relayed call.
pub enum RelayOutcome {
    /// Fully read upstream body, parsed as JSON or carried as raw text.
    Buffered {
        status: StatusCode,
        data: serde_json::Value,
    },
    /// Live upstream body, piped through as it arrives.
    Streaming {
        status: StatusCode,
        content_type: HeaderValue,
        body: RelayStream,
    },
}

impl RelayOutcome {
    /// Upstream status code, whichever form the outcome took.
    pub fn status(&self) -> StatusCode {
        match self {
            RelayOutcome::Buffered { status, .. } => *status,
            RelayOutcome::Streaming { status, .. } => *status,
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, RelayOutcome::Streaming { .. })
    }
}

impl std::fmt::Debug for RelayOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayOutcome::Buffered { status, data } => f
                .debug_struct("Buffered")
                .field("status", status)
                .field("data", data)
                .finish(),
            RelayOutcome::Streaming {
                status,
                content_type,
                ..
            } => f
                .debug_struct("Streaming")
                .field("status", status)
                .field("content_type", content_type)
                .finish_non_exhaustive(),
        }
    }
}

impl IntoResponse for RelayOutcome {
    fn into_response(self) -> Response {
        match self {
            // Transport status is always 200; the upstream status travels in the body.
            RelayOutcome::Buffered { status, data } => Json(serde_json::json!({
                "success": status.as_u16() < 300,
                "status": status.as_u16(),
                "data": data,
            }))
            .into_response(),
            RelayOutcome::Streaming {
                status,
                content_type,
                body,
            } => (
                status,
                [
                    (header::CONTENT_TYPE, content_type),
                    (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
                    (header::CONNECTION, HeaderValue::from_static("keep-alive")),
                ],
                Body::from_stream(body),
            )
                .into_response(),
        }
    }
}

/// Whether a content type should be piped through instead of buffered.
pub fn is_streaming_content_type(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.contains("text/event-stream") || content_type.contains("text/plain")
}

/// Parse `text` as JSON, falling back to the raw text as a JSON string.
pub fn parse_body(text: String) -> serde_json::Value {
    match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(_) => serde_json::Value::String(text),
    }
}

/// Forwards requests to the configured upstream.
pub struct Relay {
    client: Client,
    upstream: UpstreamConfig,
    policy: RelayPolicy,
}

impl Relay {
    pub fn new(client: Client, upstream: UpstreamConfig, policy: RelayPolicy) -> Self {
        Self {
            client,
            upstream,
            policy,
        }
    }

    /// Build a relay with its own HTTP client.
    ///
    /// The client carries a connect timeout only; the response timeout is
    /// applied per call so long-lived streams are not cut off.
    pub fn from_config(upstream: UpstreamConfig, policy: RelayPolicy) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(upstream.connect_timeout())
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::new(client, upstream, policy))
    }

    pub fn upstream(&self) -> &UpstreamConfig {
        &self.upstream
    }

    /// Validate, dispatch and classify a single forwarding request.
    pub async fn forward(&self, request: ForwardRequest) -> Result<RelayOutcome> {
        let call = UpstreamCall::build(request, &self.upstream, self.policy)?;
        let headers = call.headers(&self.upstream)?;
        let timeout_ms = self.upstream.timeout_ms;
        let deadline = Instant::now() + self.upstream.timeout();

        tracing::info!(
            destination = %call.destination_id,
            url = %call.url,
            body_bytes = call.body.len(),
            "Forwarding request upstream"
        );
        tracing::debug!(
            destination = %call.destination_id,
            body = %preview(&call.body),
            "Upstream request body"
        );

        let destination_id = call.destination_id;
        let send = self
            .client
            .post(call.url)
            .headers(headers)
            .body(call.body)
            .send();

        let upstream_response = match tokio::time::timeout_at(deadline, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_timeout() => {
                tracing::error!(destination = %destination_id, error = %e, "Upstream timed out");
                return Err(Error::UpstreamTimeout { timeout_ms });
            }
            Ok(Err(e)) => {
                tracing::error!(destination = %destination_id, error = %e, "Failed to reach upstream");
                return Err(Error::UpstreamConnection(e.to_string()));
            }
            Err(_) => {
                tracing::error!(
                    destination = %destination_id,
                    timeout_ms,
                    "Upstream did not respond in time"
                );
                return Err(Error::UpstreamTimeout { timeout_ms });
            }
        };

        let status = upstream_response.status();
        let content_type = upstream_response.headers().get(header::CONTENT_TYPE).cloned();
        let content_type_str = content_type
            .as_ref()
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        tracing::info!(
            destination = %destination_id,
            status = %status,
            content_type = %content_type_str,
            "Upstream responded"
        );

        if is_streaming_content_type(content_type_str) {
            let content_type =
                content_type.unwrap_or_else(|| HeaderValue::from_static("text/event-stream"));
            let start = RelayStream::start(upstream_response.bytes_stream(), destination_id.clone());
            let body = match tokio::time::timeout_at(deadline, start).await {
                Ok(started) => started?,
                Err(_) => {
                    tracing::error!(
                        destination = %destination_id,
                        timeout_ms,
                        "Upstream stream produced no data in time"
                    );
                    return Err(Error::UpstreamTimeout { timeout_ms });
                }
            };
            return Ok(RelayOutcome::Streaming {
                status,
                content_type,
                body,
            });
        }

        let text = match tokio::time::timeout_at(deadline, upstream_response.text()).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::error!(destination = %destination_id, error = %e, "Failed to read upstream body");
                return Err(Error::UpstreamConnection(format!(
                    "Failed to read upstream body: {}",
                    e
                )));
            }
            Err(_) => {
                tracing::error!(
                    destination = %destination_id,
                    timeout_ms,
                    "Upstream body not received in time"
                );
                return Err(Error::UpstreamTimeout { timeout_ms });
            }
        };

        Ok(RelayOutcome::Buffered {
            status,
            data: parse_body(text),
        })
    }
}

/// First 200 characters of a body for debug logging.
fn preview(body: &[u8]) -> String {
    String::from_utf8_lossy(body).chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_streaming_content_types() {
        assert!(is_streaming_content_type("text/event-stream"));
        assert!(is_streaming_content_type("text/event-stream; charset=utf-8"));
        assert!(is_streaming_content_type("Text/Plain"));
        assert!(!is_streaming_content_type("application/json"));
        assert!(!is_streaming_content_type("text/html"));
        assert!(!is_streaming_content_type(""));
    }

    #[test]
    fn test_parse_body_json() {
        assert_eq!(parse_body(r#"{"a":1}"#.to_string()), json!({"a": 1}));
    }

    #[test]
    fn test_parse_body_raw_fallback() {
        assert_eq!(
            parse_body("plain text".to_string()),
            serde_json::Value::String("plain text".to_string())
        );
        assert_eq!(parse_body(String::new()), serde_json::Value::String(String::new()));
    }

    #[test]
    fn test_preview_truncates() {
        let body = "x".repeat(500);
        assert_eq!(preview(body.as_bytes()).len(), 200);
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_buffered_outcome_wraps_with_transport_200() {
        let outcome = RelayOutcome::Buffered {
            status: StatusCode::NOT_FOUND,
            data: json!({"error": "no such project"}),
        };
        let response = outcome.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["status"], 404);
        assert_eq!(json["data"]["error"], "no such project");
    }

    #[tokio::test]
    async fn test_buffered_success_flag() {
        let outcome = RelayOutcome::Buffered {
            status: StatusCode::CREATED,
            data: json!(null),
        };
        let json = body_json(outcome.into_response()).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["status"], 201);
    }

    #[tokio::test]
    async fn test_streaming_outcome_headers() {
        let upstream = futures::stream::iter(vec![Ok(bytes::Bytes::from_static(b"data: 1\n\n"))]);
        let body = RelayStream::start(upstream, "proj").await.unwrap();
        let outcome = RelayOutcome::Streaming {
            status: StatusCode::ACCEPTED,
            content_type: HeaderValue::from_static("text/event-stream"),
            body,
        };
        assert!(outcome.is_streaming());

        let response = outcome.into_response();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let headers = response.headers();
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "text/event-stream");
        assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-cache");
        assert_eq!(headers.get(header::CONNECTION).unwrap(), "keep-alive");

        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&bytes[..], b"data: 1\n\n");
    }
}
