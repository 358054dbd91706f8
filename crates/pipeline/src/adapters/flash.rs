//! Device imaging through the external flash helper.

use std::ffi::OsString;

use super::ProcessSource;
use crate::emitter::LineEmitter;
use crate::source::{LineSource, SourceError, SourceExit};

#[derive(Debug, Clone)]
pub struct FlashRequest {
    pub device: String,
    pub image_url: String,
    pub safe_hdmi: bool,
    pub enable_ssh: bool,
}

/// Writes an OS image to a block device, relaying the helper's progress lines.
#[derive(Debug, Clone)]
pub struct FlashSource {
    process: ProcessSource,
}

impl FlashSource {
    pub fn new(helper: impl Into<OsString>, request: &FlashRequest) -> Result<Self, SourceError> {
        if request.device.trim().is_empty() || request.image_url.trim().is_empty() {
            return Err(SourceError::Invalid(
                "device and image_url are required".into(),
            ));
        }

        let mut process = ProcessSource::new(helper)
            .arg("--image")
            .arg(&request.image_url)
            .arg("--device")
            .arg(&request.device);
        if request.safe_hdmi {
            process = process.arg("--safe-hdmi");
        }
        if request.enable_ssh {
            process = process.arg("--enable-ssh");
        }
        Ok(Self { process })
    }

    pub fn describe(&self) -> String {
        self.process.describe()
    }
}

impl LineSource for FlashSource {
    fn run(self: Box<Self>, emitter: &mut LineEmitter) -> Result<SourceExit, SourceError> {
        Box::new(self.process).run(emitter)
    }
}
