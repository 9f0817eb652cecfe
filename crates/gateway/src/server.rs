//! HTTP long-poll transport over [`DispatchService`].

use std::future::Future;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use proto::{CallbackId, GatewayError, SessionId};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use crate::dispatch::DispatchService;

#[derive(Debug, Deserialize)]
struct StartTaskRequest {
    kind: String,
    instruction: String,
}

#[derive(Debug, Serialize)]
struct StartTaskResponse {
    session_id: SessionId,
}

#[derive(Debug, Deserialize)]
struct AnswerRequest {
    callback_id: CallbackId,
    answer: String,
}

#[derive(Debug, Serialize)]
struct ScreenshotResponse {
    mime: &'static str,
    data_b64: String,
}

/// Wraps a dispatch error so handlers can return it directly.
struct ApiError(GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

fn status_for(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::SessionNotFound(_) | GatewayError::CallbackNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        GatewayError::UnsupportedTaskKind(_) | GatewayError::BadRequest(_) => {
            StatusCode::BAD_REQUEST
        }
        GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        GatewayError::AlreadyResolved(_) => StatusCode::CONFLICT,
        GatewayError::Connection(_) => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        debug!(status = status.as_u16(), error = %self.0, "Request rejected");
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Builds the routes with permissive CORS.
pub fn router(service: Arc<DispatchService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tasks", post(start_task))
        .route("/tasks/{id}/next", get(next_notification))
        .route("/tasks/{id}/answers", post(submit_answer))
        .route("/tasks/{id}/screenshot", get(screenshot))
        .route("/health", get(health))
        .with_state(service)
        .layer(cors)
}

async fn start_task(
    State(service): State<Arc<DispatchService>>,
    Json(req): Json<StartTaskRequest>,
) -> Result<Json<StartTaskResponse>, ApiError> {
    let session_id = service.start_task(&req.kind, &req.instruction)?;
    Ok(Json(StartTaskResponse { session_id }))
}

async fn next_notification(
    State(service): State<Arc<DispatchService>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let notification = service.fetch(&SessionId::from(id)).await?;
    Ok(Json(notification).into_response())
}

async fn submit_answer(
    State(service): State<Arc<DispatchService>>,
    Path(id): Path<String>,
    Json(req): Json<AnswerRequest>,
) -> Result<StatusCode, ApiError> {
    service.submit_answer(&SessionId::from(id), &req.callback_id, &req.answer)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn screenshot(
    State(service): State<Arc<DispatchService>>,
    Path(id): Path<String>,
) -> Result<Json<ScreenshotResponse>, ApiError> {
    let png = service.screenshot(&SessionId::from(id)).await?;
    Ok(Json(ScreenshotResponse {
        mime: "image/png",
        data_b64: BASE64.encode(png),
    }))
}

async fn health(State(service): State<Arc<DispatchService>>) -> impl IntoResponse {
    Json(service.ping())
}

/// Binds the transport and serves until `shutdown` completes.
pub struct HttpServer {
    host: String,
    port: u16,
}

impl HttpServer {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub async fn run<F>(self, service: Arc<DispatchService>, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| GatewayError::Connection(format!("bind {addr} failed: {e}")))?;

        info!(addr = %addr, "Dispatch server listening");

        axum::serve(listener, router(service))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| GatewayError::Connection(format!("server error: {e}")))?;

        info!("Dispatch server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_errors_onto_status_codes() {
        let cases = [
            (GatewayError::SessionNotFound("s".into()), StatusCode::NOT_FOUND),
            (GatewayError::CallbackNotFound("c".into()), StatusCode::NOT_FOUND),
            (GatewayError::UnsupportedTaskKind("k".into()), StatusCode::BAD_REQUEST),
            (GatewayError::BadRequest("b".into()), StatusCode::BAD_REQUEST),
            (GatewayError::Unauthorized("t".into()), StatusCode::UNAUTHORIZED),
            (GatewayError::AlreadyResolved("c".into()), StatusCode::CONFLICT),
            (GatewayError::Connection("x".into()), StatusCode::BAD_GATEWAY),
        ];
        for (err, expected) in cases {
            assert_eq!(status_for(&err), expected, "{err}");
        }
    }
}
