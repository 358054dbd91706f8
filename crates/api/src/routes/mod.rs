pub mod health;
pub mod jobs;
pub mod transcripts;
pub mod ws;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /jobs                              list
/// /jobs/{id}                         get
/// /jobs/{id}/cancel                  cancel a live stream (POST)
///
/// /models                           list local model weights
///
/// /transcripts/{session}             get
/// /transcribe/upload                 audio upload (POST, multipart)
///
/// /ws/flash                          device imaging stream
/// /ws/model                          model inference stream
/// /ws/transcribe                     transcription stream
/// /ws/logs                           log hub
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/jobs", jobs::router())
        .route("/models", get(handlers::models::get_models))
        .merge(transcripts::router())
        .nest("/ws", ws::router())
}

/// Routes bounded by their own timeout rather than the global request
/// timeout. Mounted with full paths.
///
/// ```text
/// POST /api/v1/jobs/run              run a remote command to completion
/// POST /api/v1/run                   alias of /jobs/run
/// POST /api/v1/models/run            one-shot generation
/// POST /api/v1/transcribe            one-shot transcription (multipart)
/// ```
pub fn long_running_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/jobs/run", post(handlers::jobs::run_job))
        .route("/api/v1/run", post(handlers::jobs::run_job))
        .route("/api/v1/models/run", post(handlers::models::run_model))
        .route(
            "/api/v1/transcribe",
            post(handlers::transcripts::transcribe_audio)
                .layer(DefaultBodyLimit::max(handlers::uploads::MAX_UPLOAD_BYTES)),
        )
}
