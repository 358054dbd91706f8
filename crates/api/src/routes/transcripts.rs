use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{transcripts, uploads};
use crate::state::AppState;

/// ```text
/// GET    /transcripts/{session}   -> get_transcript
/// POST   /transcribe/upload       -> upload_audio
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/transcripts/{session}", get(transcripts::get_transcript))
        .route(
            "/transcribe/upload",
            post(uploads::upload_audio).layer(DefaultBodyLimit::max(uploads::MAX_UPLOAD_BYTES)),
        )
}
