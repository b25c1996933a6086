//! HTTP server setup and configuration.

use std::any::Any;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{HeaderName, HeaderValue},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::cors::build_cors_layer;
use super::handlers;
use super::relay::Relay;
use crate::config::Config;
use crate::error::Error;

/// Response header: correlation ID (UUID v4).
pub const REQUEST_ID_HEADER: &str = "x-relay-request-id";

/// Correlation id assigned to every inbound request.
#[derive(Debug, Clone, Copy)]
pub struct RequestId(pub Uuid);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn from_config(config: Config) -> crate::Result<Self> {
        let relay = Relay::from_config(config.upstream.clone(), config.relay)?;
        Ok(Self {
            relay: Arc::new(relay),
            config: Arc::new(config),
        })
    }
}

/// Create the axum router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    Router::new()
        .route(
            "/",
            get(handlers::health).fallback(handlers::not_found),
        )
        .route(
            "/health",
            get(handlers::health).fallback(handlers::not_found),
        )
        .route(
            handlers::RELAY_PATH,
            post(handlers::relay).fallback(handlers::not_found),
        )
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.server.body_limit_bytes))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn(assign_request_id))
        .layer(build_cors_layer(&config.cors))
        .layer(TraceLayer::new_for_http())
}

/// Tag the request with a fresh [`RequestId`] and echo it in the response.
async fn assign_request_id(mut request: Request, next: Next) -> Response {
    let request_id = RequestId(Uuid::new_v4());
    request.extensions_mut().insert(request_id);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id.0.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

/// Convert a handler panic into the standard JSON 500.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "Request handler panicked");
    Error::Internal("unexpected failure while handling request".to_string()).into_response()
}

/// Run the HTTP server until a shutdown signal arrives.
pub async fn run_server(config: Config, listen_override: Option<String>) -> anyhow::Result<()> {
    let listen_addr = listen_override.unwrap_or_else(|| config.server.listen_addr());

    tracing::info!(
        upstream = %config.upstream.url_template,
        timeout_ms = config.upstream.timeout_ms,
        require_payload = config.relay.require_payload,
        "Relay configured"
    );

    let state = AppState::from_config(config)?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", listen_addr))?;
    tracing::info!(address = %listen_addr, "Starting relaygate server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("relaygate server stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        _ = terminate => tracing::info!("Received SIGTERM signal"),
    }
    tracing::info!("Shutdown signal received, draining in-flight requests");
}
