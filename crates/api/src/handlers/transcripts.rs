use axum::extract::{Multipart, Path, State};
use axum::response::IntoResponse;
use axum::Json;
use blackroad_core::error::CoreError;
use blackroad_core::types::DbId;
use blackroad_pipeline::adapters::{WhisperRequest, WhisperSource};
use serde::Serialize;

use super::jobs::{run_recorded, OneShot};
use super::uploads::store_upload;
use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TranscribeResult {
    /// Transcript session holding the text; the upload token.
    pub session: String,
    pub job_id: DbId,
    pub outcome: &'static str,
    pub text: String,
}

/// GET /api/v1/transcripts/{session}
pub async fn get_transcript(
    State(state): State<AppState>,
    Path(session): Path<String>,
) -> AppResult<impl IntoResponse> {
    let transcript = state
        .ledgers
        .transcripts
        .get(&session)
        .await?
        .ok_or_else(|| CoreError::not_found("Transcript", &session))?;
    Ok(Json(DataResponse { data: transcript }))
}

/// POST /api/v1/transcribe
///
/// Transcribe the multipart `file` field to completion and return the text.
/// The upload is deleted afterwards; the transcript stays under the upload
/// token as its session.
pub async fn transcribe_audio(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let dir = &state.config.transcribe_tmp;
    let token = store_upload(dir, multipart).await?;
    let audio = dir.join(&token);

    let ran = run_recorded(
        &state,
        OneShot {
            thread_name: "whisper-run",
            stream: "transcribe",
            command: format!("whisper {token}"),
            source: Box::new(WhisperSource::new(WhisperRequest {
                audio: audio.clone(),
                model: None,
                language: None,
            })),
            session: Some(token.clone()),
        },
    )
    .await;

    if let Err(err) = tokio::fs::remove_file(&audio).await {
        tracing::warn!(token = %token, error = %err, "Could not remove transcribed upload");
    }
    let (job_id, outcome) = ran?;

    let transcript = state
        .ledgers
        .transcripts
        .get(&token)
        .await?
        .ok_or_else(|| CoreError::not_found("Transcript", &token))?;
    Ok(Json(DataResponse {
        data: TranscribeResult {
            session: token,
            job_id,
            outcome: outcome.label(),
            text: transcript.text,
        },
    }))
}
