//! Local model weights and one-shot inference.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use blackroad_core::error::CoreError;
use blackroad_pipeline::adapters::{list_models, LlamaRequest, LlamaSource};
use blackroad_pipeline::SourceError;
use serde::{Deserialize, Serialize};

use super::jobs::{run_recorded, OneShot};
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ModelList {
    /// File names inside the models directory.
    pub models: Vec<String>,
}

/// Body of `POST /api/v1/models/run`.
#[derive(Debug, Deserialize)]
pub struct RunModelRequest {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub prompt: String,
    /// Tokens to predict. Defaults to 128, floor of 1.
    pub n: Option<u32>,
}

/// GET /api/v1/models
pub async fn get_models(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let dir = state.config.models_dir.clone();
    let models = tokio::task::spawn_blocking(move || list_models(&dir))
        .await
        .map_err(|e| AppError::InternalError(format!("model listing task failed: {e}")))?
        .map_err(|e| AppError::InternalError(format!("failed to read models dir: {e}")))?;
    Ok(Json(DataResponse {
        data: ModelList { models },
    }))
}

/// POST /api/v1/models/run
///
/// Generate from a local model to completion and return the finished job,
/// whose output holds the generated text. The model must live under the
/// models directory.
pub async fn run_model(
    State(state): State<AppState>,
    Json(input): Json<RunModelRequest>,
) -> AppResult<impl IntoResponse> {
    if input.model.trim().is_empty() || input.prompt.trim().is_empty() {
        return Err(AppError::BadRequest("model and prompt required".into()));
    }

    let model = input.model.clone();
    let source = LlamaSource::new(
        LlamaRequest {
            model: input.model,
            prompt: input.prompt,
            n_predict: input.n,
        },
        &state.config.models_dir,
    )
    .map_err(|err| match err {
        SourceError::NotFound(_) => CoreError::not_found("Model", &model),
        other => CoreError::InvalidArgument(other.to_string()),
    })?;

    let (job_id, _) = run_recorded(
        &state,
        OneShot {
            thread_name: "model-run",
            stream: "model",
            command: format!("llama {} -n {}", source.model().display(), source.n_predict()),
            source: Box::new(source),
            session: None,
        },
    )
    .await?;

    let job = state
        .ledgers
        .operations
        .get(job_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Job", job_id))?;
    Ok(Json(DataResponse { data: job }))
}
