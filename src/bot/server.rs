//! HTTP status surface.
//!
//! Two endpoints: `/health` for load-balancer style liveness and
//! `/status` with a JSON snapshot of the runtime. Both answer 503 while
//! the connection is down so external monitors see reconnect storms.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde_json::json;
use tracing::info;

use super::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/health", get(health))
        .with_state(state)
}

/// Bind and serve until the shutdown future resolves.
pub async fn serve(
    state: AppState,
    port: u16,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Status server listening on port {}", listener.local_addr()?.port());
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn health(State(state): State<AppState>) -> StatusCode {
    if state.connection.is_open() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn status(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let code = if state.connection.is_open() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let stats = state.tracker.stats();
    let body = json!({
        "name": state.config.bot_name,
        "connection": state.connection.status().as_str(),
        "connected_secs": state.connection.connected_secs(),
        "reconnect_attempts": state.connection.attempts(),
        "last_error": state.connection.last_error(),
        "uptime_secs": (chrono::Utc::now() - state.started_at).num_seconds(),
        "cached_messages": state.tracker.cached_count(),
        "deleted_stored": state.tracker.deleted_count(),
        "commands_loaded": state.registry.command_count(),
        "caches": state.caches.cache_names(),
        "auto_react": {
            "mode": state.auto_react.mode().as_str(),
            "reactions_sent": state.auto_react.reactions_sent(),
        },
        "stats": {
            "messages_seen": stats.messages_seen,
            "edits_detected": stats.edits_detected,
            "deletes_detected": stats.deletes_detected,
        },
    });

    (code, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::MemoryTransport;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn get_status(state: AppState, path: &str) -> (StatusCode, serde_json::Value) {
        let app = router(state);
        let response = app
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let code = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (code, body)
    }

    #[tokio::test]
    async fn health_reflects_connection_state() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MemoryTransport::new());
        let state = AppState::for_tests(transport, dir.path());

        let (code, _) = get_status(state.clone(), "/health").await;
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn status_reports_runtime_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MemoryTransport::new());
        let state = AppState::for_tests(transport, dir.path());
        state.registry.load(crate::plugins::built_in());

        let (code, body) = get_status(state, "/status").await;
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["connection"], "disconnected");
        assert_eq!(body["commands_loaded"], 6);
        assert_eq!(body["auto_react"]["mode"], "off");
    }
}
