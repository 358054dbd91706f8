//! Local speech-to-text through the whisper.cpp command line tool.

use std::path::PathBuf;

use super::{locate_program, ProcessSource};
use crate::emitter::LineEmitter;
use crate::source::{LineSource, SourceError, SourceExit};

/// Binary names tried in order. Older whisper.cpp builds ship as `main`.
pub const WHISPER_BINARIES: [&str; 2] = ["whisper", "main"];

pub const DEFAULT_WHISPER_MODEL: &str = "/var/lib/blackroad/models/ggml-base.en.bin";

pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Clone)]
pub struct WhisperRequest {
    pub audio: PathBuf,
    pub model: Option<PathBuf>,
    pub language: Option<String>,
}

/// Transcribes one audio file, one output line per relayed line.
///
/// The binary is located when the stream starts, so a missing install is
/// reported in-band as a diagnostic line.
#[derive(Debug, Clone)]
pub struct WhisperSource {
    request: WhisperRequest,
}

impl WhisperSource {
    pub fn new(request: WhisperRequest) -> Self {
        Self { request }
    }

    fn command(&self, binary: PathBuf) -> ProcessSource {
        let model = self
            .request
            .model
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WHISPER_MODEL));
        let language = self
            .request
            .language
            .as_deref()
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_LANGUAGE);

        ProcessSource::new(binary)
            .arg("-m")
            .arg(model)
            .arg("-l")
            .arg(language)
            .arg(&self.request.audio)
    }
}

impl LineSource for WhisperSource {
    fn run(self: Box<Self>, emitter: &mut LineEmitter) -> Result<SourceExit, SourceError> {
        let binary = locate_program(&WHISPER_BINARIES)
            .ok_or_else(|| SourceError::NotFound("whisper.cpp binary not found".into()))?;
        if !self.request.audio.is_file() {
            return Err(SourceError::NotFound("audio not found".into()));
        }
        Box::new(self.command(binary)).run(emitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_model_and_language() {
        let source = WhisperSource::new(WhisperRequest {
            audio: PathBuf::from("/tmp/a.wav"),
            model: None,
            language: None,
        });
        assert_eq!(
            source.command(PathBuf::from("whisper")).describe(),
            format!("whisper -m {DEFAULT_WHISPER_MODEL} -l en /tmp/a.wav")
        );
    }
}
