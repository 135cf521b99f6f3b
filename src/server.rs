//! HTTP server exposing the proctoring API.
//!
//! This module provides the service layer consumed by an exam frontend:
//! - Session lifecycle: POST /api/proctoring/start, /stop, GET /status
//! - Live stream: GET /api/proctoring/stream/:username (multipart MJPEG)
//! - Reporting: GET /api/proctoring/audit/:username, /statistics/:username
//! - Evidence: GET/DELETE /api/proctoring/recordings
//! - Settings: GET/POST /api/proctoring/settings

use crate::clips::ClipError;
use crate::session::{SessionController, SessionError, SessionStatus};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};

/// Boundary string for the multipart frame stream.
const STREAM_BOUNDARY: &str = "frame";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
}

impl ServerConfig {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

/// Request body for starting a session.
#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub username: String,
    /// Exam duration in seconds; falls back to the configured default
    pub exam_duration: Option<u64>,
}

/// Generic lifecycle response.
#[derive(Debug, Serialize)]
pub struct LifecycleResponse {
    pub status: String,
    pub message: String,
}

/// Per-user audit payload.
#[derive(Debug, Serialize)]
pub struct AuditResponse {
    pub username: String,
    pub data: Vec<(f64, bool)>,
    pub total_cheating_instances: usize,
    pub total_duration: f64,
}

/// Per-user statistics payload.
#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    pub username: String,
    pub total_entries: usize,
    pub cheating_instances: usize,
    pub clean_instances: usize,
    pub cheating_percentage: f64,
    pub total_duration_secs: f64,
    pub exam_completed: bool,
}

/// Recordings listing payload.
#[derive(Debug, Serialize)]
pub struct RecordingsResponse {
    pub recordings: Vec<RecordingEntry>,
    pub total: usize,
    pub directory: String,
}

#[derive(Debug, Serialize)]
pub struct RecordingEntry {
    pub filename: String,
    pub size_mb: f64,
    pub created_at: String,
}

/// Settings update body.
#[derive(Debug, Deserialize)]
pub struct SettingsUpdate {
    pub total_duration: Option<u64>,
    pub minimum_cheating_duration: Option<u64>,
}

/// Settings payload.
#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub total_duration_secs: u64,
    pub minimum_cheating_duration_secs: u64,
    pub smoothing_window_secs: u64,
    pub output_fps: f64,
    pub recordings_dir: String,
    pub active: bool,
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl std::fmt::Display) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            code: code.to_string(),
        }),
    )
}

fn session_error(e: SessionError) -> ApiError {
    match e {
        SessionError::AlreadyActive => api_error(StatusCode::CONFLICT, "ALREADY_ACTIVE", e),
        SessionError::NotActive => api_error(StatusCode::BAD_REQUEST, "NOT_ACTIVE", e),
        SessionError::AudioUnavailable(_) => {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "AUDIO_UNAVAILABLE", e)
        }
        SessionError::CaptureUnavailable(_) => {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "CAPTURE_UNAVAILABLE", e)
        }
    }
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /api/proctoring/start
async fn start_session(
    State(controller): State<Arc<SessionController>>,
    Json(req): Json<StartRequest>,
) -> Result<Json<LifecycleResponse>, ApiError> {
    controller
        .start(&req.username, req.exam_duration)
        .map_err(session_error)?;

    let duration = req
        .exam_duration
        .unwrap_or_else(|| controller.settings().total_duration.as_secs());
    tracing::info!(username = %req.username, duration, "session started");

    Ok(Json(LifecycleResponse {
        status: "active".to_string(),
        message: format!(
            "Proctoring started for {} (Duration: {}s)",
            req.username, duration
        ),
    }))
}

/// POST /api/proctoring/stop
///
/// Idempotent: stopping an already-inactive monitor reports inactive.
async fn stop_session(
    State(controller): State<Arc<SessionController>>,
) -> Json<LifecycleResponse> {
    match controller.stop() {
        Ok(()) => {
            tracing::info!("session stopped");
            Json(LifecycleResponse {
                status: "inactive".to_string(),
                message: "Proctoring stopped successfully".to_string(),
            })
        }
        Err(SessionError::NotActive) => Json(LifecycleResponse {
            status: "inactive".to_string(),
            message: "No active session".to_string(),
        }),
        Err(e) => Json(LifecycleResponse {
            status: "error".to_string(),
            message: e.to_string(),
        }),
    }
}

/// GET /api/proctoring/status
async fn session_status(
    State(controller): State<Arc<SessionController>>,
) -> Json<SessionStatus> {
    Json(controller.status())
}

/// GET /api/proctoring/stream/:username
///
/// Multipart MJPEG stream of the live feed. Infinite while the session is
/// active; terminates on stop or capture exhaustion. Not restartable; a new
/// request re-opens the capture device.
async fn stream_feed(
    State(controller): State<Arc<SessionController>>,
    Path(username): Path<String>,
) -> Result<Response, ApiError> {
    let stream = controller.stream_frames(&username).map_err(session_error)?;

    let (tx, rx) = tokio::sync::mpsc::channel::<Result<Vec<u8>, std::convert::Infallible>>(4);

    // The frame loop is blocking; drive it off the async runtime and feed
    // the response body through a channel.
    tokio::task::spawn_blocking(move || {
        for update in stream {
            let mut part = Vec::with_capacity(update.frame.len() + 128);
            part.extend_from_slice(
                format!("--{STREAM_BOUNDARY}\r\nContent-Type: image/jpeg\r\n\r\n").as_bytes(),
            );
            part.extend_from_slice(&update.frame);
            part.extend_from_slice(b"\r\n");

            if tx.blocking_send(Ok(part)).is_err() {
                // Client went away; dropping the stream flushes the recorder.
                break;
            }
        }
    });

    let body = Body::from_stream(ReceiverStream::new(rx));
    Response::builder()
        .status(StatusCode::OK)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={STREAM_BOUNDARY}"),
        )
        .body(body)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, "STREAM_ERROR", e))
}

/// GET /api/proctoring/audit/:username
async fn user_audit(
    State(controller): State<Arc<SessionController>>,
    Path(username): Path<String>,
) -> Json<AuditResponse> {
    let entries = controller.audit().entries_for(&username);
    let total_cheating_instances = entries.iter().filter(|e| e.cheating).count();
    let total_duration = entries.last().map(|e| e.elapsed_secs).unwrap_or(0.0);

    Json(AuditResponse {
        username,
        data: entries.iter().map(|e| (e.elapsed_secs, e.cheating)).collect(),
        total_cheating_instances,
        total_duration,
    })
}

/// GET /api/proctoring/statistics/:username
async fn user_statistics(
    State(controller): State<Arc<SessionController>>,
    Path(username): Path<String>,
) -> Json<StatisticsResponse> {
    let stats = controller.audit().stats(&username);

    Json(StatisticsResponse {
        username,
        total_entries: stats.total_entries,
        cheating_instances: stats.cheating_instances,
        clean_instances: stats.clean_instances,
        cheating_percentage: (stats.cheating_percentage * 100.0).round() / 100.0,
        total_duration_secs: (stats.total_duration_secs * 100.0).round() / 100.0,
        exam_completed: !controller.is_active(),
    })
}

/// GET /api/proctoring/recordings
async fn list_recordings(
    State(controller): State<Arc<SessionController>>,
) -> Result<Json<RecordingsResponse>, ApiError> {
    let clips = controller
        .clips()
        .list()
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, "CLIP_ERROR", e))?;

    let recordings: Vec<RecordingEntry> = clips
        .iter()
        .map(|c| RecordingEntry {
            filename: c.filename.clone(),
            size_mb: (c.size_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0,
            created_at: c.created_at.to_rfc3339(),
        })
        .collect();

    Ok(Json(RecordingsResponse {
        total: recordings.len(),
        directory: controller.clips().directory().display().to_string(),
        recordings,
    }))
}

/// DELETE /api/proctoring/recordings/:filename
async fn delete_recording(
    State(controller): State<Arc<SessionController>>,
    Path(filename): Path<String>,
) -> Result<Json<LifecycleResponse>, ApiError> {
    controller.clips().delete(&filename).map_err(|e| match e {
        ClipError::NotFound(_) => api_error(StatusCode::NOT_FOUND, "CLIP_NOT_FOUND", e),
        ClipError::InvalidName(_) => api_error(StatusCode::BAD_REQUEST, "INVALID_NAME", e),
        ClipError::Io(_) => api_error(StatusCode::INTERNAL_SERVER_ERROR, "CLIP_ERROR", e),
    })?;

    Ok(Json(LifecycleResponse {
        status: "success".to_string(),
        message: format!("Recording {filename} deleted successfully"),
    }))
}

/// GET /api/proctoring/settings
async fn get_settings(
    State(controller): State<Arc<SessionController>>,
) -> Json<SettingsResponse> {
    Json(settings_response(&controller))
}

/// POST /api/proctoring/settings
async fn update_settings(
    State(controller): State<Arc<SessionController>>,
    Json(update): Json<SettingsUpdate>,
) -> Json<SettingsResponse> {
    controller.update_settings(update.total_duration, update.minimum_cheating_duration);
    Json(settings_response(&controller))
}

fn settings_response(controller: &SessionController) -> SettingsResponse {
    let config = controller.settings();
    SettingsResponse {
        total_duration_secs: config.total_duration.as_secs(),
        minimum_cheating_duration_secs: config.minimum_cheating_duration.as_secs(),
        smoothing_window_secs: config.smoothing_window.as_secs(),
        output_fps: config.output_fps,
        recordings_dir: config.recordings_dir.display().to_string(),
        active: controller.is_active(),
    }
}

/// Build the router over a controller.
pub fn router(controller: Arc<SessionController>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/proctoring/start", post(start_session))
        .route("/api/proctoring/stop", post(stop_session))
        .route("/api/proctoring/status", get(session_status))
        .route("/api/proctoring/stream/:username", get(stream_feed))
        .route("/api/proctoring/audit/:username", get(user_audit))
        .route("/api/proctoring/statistics/:username", get(user_statistics))
        .route("/api/proctoring/recordings", get(list_recordings))
        .route("/api/proctoring/recordings/:filename", delete(delete_recording))
        .route(
            "/api/proctoring/settings",
            get(get_settings).post(update_settings),
        )
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(controller)
}

/// Run the HTTP server.
pub async fn run(
    config: ServerConfig,
    controller: Arc<SessionController>,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let app = router(controller);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Proctoring server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
