use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// WebSocket endpoints mounted at `/ws`.
///
/// ```text
/// GET /flash          -> flash_ws
/// GET /model          -> model_ws
/// GET /transcribe     -> transcribe_ws
/// GET /logs           -> logs_ws
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/flash", get(ws::flash_ws))
        .route("/model", get(ws::model_ws))
        .route("/transcribe", get(ws::transcribe_ws))
        .route("/logs", get(ws::logs_ws))
}
