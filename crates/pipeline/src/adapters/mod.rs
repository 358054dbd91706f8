//! Line sources backed by external programs.

use std::path::PathBuf;

pub mod flash;
pub mod llama;
pub mod process;
pub mod remote;
pub mod whisper;

pub use flash::{FlashRequest, FlashSource};
pub use llama::{list_models, LlamaRequest, LlamaSource};
pub use process::ProcessSource;
pub use remote::RemoteSource;
pub use whisper::{WhisperRequest, WhisperSource};

/// First of `candidates` found on `PATH`.
pub fn locate_program(candidates: &[&str]) -> Option<PathBuf> {
    candidates.iter().find_map(|name| which::which(name).ok())
}
