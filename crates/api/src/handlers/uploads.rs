//! Audio uploads awaiting transcription.
//!
//! Each upload is stored under the transcription tmp dir with a random name;
//! that file name is the token a client later passes to `/ws/transcribe`.

use std::path::{Component, Path, PathBuf};

use axum::extract::{Multipart, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Largest accepted audio upload.
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

const DEFAULT_SUFFIX: &str = ".wav";

#[derive(Debug, Serialize)]
pub struct UploadToken {
    pub token: String,
}

/// POST /api/v1/transcribe/upload
///
/// Expects a multipart body with a `file` field.
pub async fn upload_audio(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let token = store_upload(&state.config.transcribe_tmp, multipart).await?;
    Ok(Json(DataResponse {
        data: UploadToken { token },
    }))
}

/// Save the multipart `file` field under `dir` and return its token.
pub(crate) async fn store_upload(dir: &Path, mut multipart: Multipart) -> AppResult<String> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let suffix = upload_suffix(field.file_name());
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("failed to read upload: {e}")))?;

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| AppError::InternalError(format!("failed to create upload dir: {e}")))?;

        let token = format!("{}{suffix}", uuid::Uuid::new_v4().simple());
        tokio::fs::write(dir.join(&token), &data)
            .await
            .map_err(|e| AppError::InternalError(format!("failed to store upload: {e}")))?;

        tracing::info!(token = %token, bytes = data.len(), "Audio uploaded");
        return Ok(token);
    }

    Err(AppError::BadRequest("multipart field 'file' is required".into()))
}

/// Extension of the client's file name, kept only when it is short and
/// alphanumeric.
fn upload_suffix(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{ext}"))
        .unwrap_or_else(|| DEFAULT_SUFFIX.to_string())
}

/// Resolve an upload token to a file inside `dir`.
///
/// The token must be a single plain file name, and the resolved path (after
/// following symlinks) must stay inside `dir`.
pub fn resolve_upload(dir: &Path, token: &str) -> Result<PathBuf, &'static str> {
    let mut components = Path::new(token).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => {}
        _ => return Err("bad token"),
    }

    let root = dir.canonicalize().map_err(|_| "audio not found")?;
    let candidate = dir.join(token).canonicalize().map_err(|_| "audio not found")?;
    if !candidate.starts_with(&root) {
        return Err("bad token");
    }
    if !candidate.is_file() {
        return Err("audio not found");
    }
    Ok(candidate)
}
