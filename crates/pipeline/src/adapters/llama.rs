//! Local text generation through the llama.cpp command line tool.

use std::io;
use std::path::{Path, PathBuf};

use super::{locate_program, ProcessSource};
use crate::emitter::LineEmitter;
use crate::source::{LineSource, SourceError, SourceExit};

pub const LLAMA_BINARIES: [&str; 2] = ["llama-cli", "llama"];

pub const DEFAULT_N_PREDICT: u32 = 128;

/// File extensions recognised as local model weights.
pub const MODEL_EXTENSIONS: [&str; 2] = ["gguf", "bin"];

#[derive(Debug, Clone)]
pub struct LlamaRequest {
    /// Absolute path, or a path relative to the models directory.
    pub model: String,
    pub prompt: String,
    pub n_predict: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct LlamaSource {
    model: PathBuf,
    prompt: String,
    n_predict: u32,
}

impl LlamaSource {
    /// Validate the request against `models_dir`.
    ///
    /// The model must exist and resolve (after following symlinks) to a file
    /// inside `models_dir`.
    pub fn new(request: LlamaRequest, models_dir: &Path) -> Result<Self, SourceError> {
        if request.model.trim().is_empty() {
            return Err(SourceError::Invalid("model path missing".into()));
        }
        let model = resolve_model(&request.model, models_dir)?;
        Ok(Self {
            model,
            prompt: request.prompt,
            n_predict: request.n_predict.unwrap_or(DEFAULT_N_PREDICT).max(1),
        })
    }

    pub fn model(&self) -> &Path {
        &self.model
    }

    pub fn n_predict(&self) -> u32 {
        self.n_predict
    }

    fn command(&self, binary: PathBuf) -> ProcessSource {
        ProcessSource::new(binary)
            .arg("-m")
            .arg(&self.model)
            .arg("-p")
            .arg(&self.prompt)
            .arg("-n")
            .arg(self.n_predict.to_string())
    }
}

impl LineSource for LlamaSource {
    fn run(self: Box<Self>, emitter: &mut LineEmitter) -> Result<SourceExit, SourceError> {
        let binary = locate_program(&LLAMA_BINARIES)
            .ok_or_else(|| SourceError::NotFound("llama.cpp binary not found".into()))?;
        Box::new(self.command(binary)).run(emitter)
    }
}

/// File names of the model weights directly inside `models_dir`, sorted.
///
/// A missing directory holds no models.
pub fn list_models(models_dir: &Path) -> io::Result<Vec<String>> {
    let entries = match std::fs::read_dir(models_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let mut models = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let is_model = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| MODEL_EXTENSIONS.iter().any(|m| ext.eq_ignore_ascii_case(m)));
        if let (true, Some(name)) = (is_model, path.file_name().and_then(|n| n.to_str())) {
            models.push(name.to_string());
        }
    }
    models.sort();
    Ok(models)
}

fn resolve_model(model: &str, models_dir: &Path) -> Result<PathBuf, SourceError> {
    let direct = PathBuf::from(model);
    let candidate = if direct.exists() {
        direct
    } else {
        models_dir.join(model)
    };

    let resolved = candidate
        .canonicalize()
        .map_err(|_| SourceError::NotFound(format!("model not found: {model}")))?;
    let root = models_dir
        .canonicalize()
        .map_err(|_| SourceError::NotFound("models directory not found".into()))?;

    if !resolved.starts_with(&root) {
        return Err(SourceError::Invalid(
            "model must live under the models directory".into(),
        ));
    }
    Ok(resolved)
}
