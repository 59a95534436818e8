//! Push API HTTP server: validates push requests and hands them to the relay queue.

use crate::gateway::protocol::SendParams;
use crate::relay::QueueProducer;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;

/// Shared state for the push API handlers.
#[derive(Clone)]
pub struct ApiState {
    /// Callers must present this token (Bearer or X-Api-Token).
    pub token: Arc<str>,
    pub queue: QueueProducer,
}

/// Build the API router (`GET /`, `POST /send`).
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/send", post(send_push))
        .with_state(state)
}

/// Serve the push API on an already-bound listener until `shutdown` completes.
pub async fn serve_api(
    listener: tokio::net::TcpListener,
    state: ApiState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = listener.local_addr().context("reading listener address")?;
    log::info!("push api listening on {}", addr);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("push api server exited")?;
    log::info!("push api stopped");
    Ok(())
}

fn provided_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(auth) = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(t) = auth.strip_prefix("Bearer ") {
            return Some(t.trim());
        }
    }
    headers
        .get("X-Api-Token")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
}

fn api_error(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<serde_json::Value>) {
    let error: String = error.into();
    (status, Json(json!({ "error": error })))
}

/// POST /send: checks the token, validates the body, enqueues a push request.
async fn send_push(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<serde_json::Value>) {
    if provided_token(&headers) != Some(&*state.token) {
        return api_error(StatusCode::UNAUTHORIZED, "invalid or missing api token");
    }
    let params: SendParams = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, format!("invalid json: {}", e)),
    };
    let request = match params.validate() {
        Ok(r) => r,
        Err(reason) => return api_error(StatusCode::BAD_REQUEST, reason),
    };
    let message_id = request.message_id.clone();
    if let Err(e) = state.queue.push(request) {
        log::warn!("message {}: rejected, {}", message_id, e);
        return api_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string());
    }
    log::info!("message {}: queued", message_id);
    (
        StatusCode::OK,
        Json(json!({ "status": "queued", "message_id": message_id })),
    )
}

/// GET / returns a simple health JSON for liveness checks.
async fn health_http(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let queue = if state.queue.is_closed() { "closed" } else { "open" };
    Json(json!({
        "runtime": "running",
        "queue": queue,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::queue;

    #[test]
    fn token_from_bearer_or_header() {
        let mut h = HeaderMap::new();
        assert_eq!(provided_token(&h), None);
        h.insert("X-Api-Token", "abc".parse().unwrap());
        assert_eq!(provided_token(&h), Some("abc"));
        h.insert(axum::http::header::AUTHORIZATION, "Bearer xyz".parse().unwrap());
        assert_eq!(provided_token(&h), Some("xyz"));
    }

    #[tokio::test]
    async fn send_push_queues_valid_request() {
        let (tx, mut rx) = queue::channel();
        let state = ApiState {
            token: Arc::from("secret"),
            queue: tx,
        };
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, "Bearer secret".parse().unwrap());
        let body = Bytes::from_static(br#"{"message_id":"m1","content":"hello"}"#);
        let (status, Json(reply)) = send_push(State(state), headers, body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["message_id"], "m1");
        assert_eq!(rx.recv().await.unwrap().content.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn send_push_rejects_wrong_token_and_bad_body() {
        let (tx, rx) = queue::channel();
        let state = ApiState {
            token: Arc::from("secret"),
            queue: tx,
        };
        let mut bad = HeaderMap::new();
        bad.insert("X-Api-Token", "nope".parse().unwrap());
        let (status, _) = send_push(State(state.clone()), bad, Bytes::from_static(b"{}")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let mut good = HeaderMap::new();
        good.insert("X-Api-Token", "secret".parse().unwrap());
        let (status, _) =
            send_push(State(state.clone()), good.clone(), Bytes::from_static(b"not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, Json(reply)) =
            send_push(State(state), good, Bytes::from_static(b"{}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(reply["error"], "content or image is required");
        assert!(rx.is_empty());
    }

    #[tokio::test]
    async fn send_push_reports_closed_queue() {
        let (tx, rx) = queue::channel();
        drop(rx);
        let state = ApiState {
            token: Arc::from("secret"),
            queue: tx,
        };
        let mut headers = HeaderMap::new();
        headers.insert("X-Api-Token", "secret".parse().unwrap());
        let body = Bytes::from_static(br#"{"content":"hello"}"#);
        let (status, _) = send_push(State(state), headers, body).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
