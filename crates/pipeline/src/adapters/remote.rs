//! Run a shell command on the target device over ssh.

use super::ProcessSource;
use crate::emitter::LineEmitter;
use crate::source::{LineSource, SourceError, SourceExit};

#[derive(Debug, Clone)]
pub struct RemoteSource {
    process: ProcessSource,
}

impl RemoteSource {
    /// `BatchMode=yes` makes ssh fail instead of prompting for a password.
    pub fn new(user: &str, host: &str, command: &str) -> Self {
        let process = ProcessSource::new("ssh")
            .args(["-o", "BatchMode=yes"])
            .arg(format!("{user}@{host}"))
            .arg(command);
        Self { process }
    }

    pub fn describe(&self) -> String {
        self.process.describe()
    }
}

impl LineSource for RemoteSource {
    fn run(self: Box<Self>, emitter: &mut LineEmitter) -> Result<SourceExit, SourceError> {
        Box::new(self.process).run(emitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_user_at_host() {
        let source = RemoteSource::new("jetson", "jetson.local", "uptime");
        assert_eq!(
            source.describe(),
            "ssh -o BatchMode=yes jetson@jetson.local uptime"
        );
    }
}
