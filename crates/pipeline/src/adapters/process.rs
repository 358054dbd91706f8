//! Run a child process and stream its stdout and stderr as lines.

use std::ffi::{OsStr, OsString};
use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use crate::emitter::LineEmitter;
use crate::source::{LineSource, SourceError, SourceExit};

/// How often the worker wakes to check for cancellation and child exit.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long to wait for the pipe readers to hit EOF after a kill.
const READER_DRAIN: Duration = Duration::from_secs(1);

/// A program invocation whose output becomes the stream.
///
/// Stdout and stderr are merged; order within each pipe is preserved. On Unix
/// the child leads its own process group, and cancellation kills the whole
/// group so helpers it forked die with it. The same kill is registered as the
/// stream's abort hook.
#[derive(Debug, Clone)]
pub struct ProcessSource {
    program: OsString,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
}

impl ProcessSource {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_owned()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Human-readable command line, used as the job's command text.
    pub fn describe(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn spawn(&self) -> Result<Child, SourceError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        command.spawn().map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                SourceError::NotFound(format!(
                    "{} not found",
                    self.program.to_string_lossy()
                ))
            } else {
                SourceError::Io(err)
            }
        })
    }
}

impl LineSource for ProcessSource {
    fn run(self: Box<Self>, emitter: &mut LineEmitter) -> Result<SourceExit, SourceError> {
        let mut child = self.spawn()?;
        tracing::debug!(command = %self.describe(), pid = child.id(), "Process started");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SourceError::Fault("failed to capture stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SourceError::Fault("failed to capture stderr".into()))?;

        let child = Arc::new(Mutex::new(child));
        {
            let child = Arc::clone(&child);
            emitter.on_abort(move || kill(&child));
        }

        let (line_tx, line_rx) = mpsc::channel::<String>();
        let readers = [
            spawn_reader("stdout", stdout, line_tx.clone())?,
            spawn_reader("stderr", stderr, line_tx)?,
        ];

        // Lines are emitted only from this thread, so nothing can follow the
        // terminal sentinel.
        loop {
            if emitter.is_cancelled() {
                kill(&child);
                break;
            }
            match line_rx.recv_timeout(POLL_INTERVAL) {
                Ok(line) => {
                    emitter.emit(line);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let status = wait(&child, emitter)?;
        if emitter.is_cancelled() {
            drain_readers(&line_rx, readers);
        } else {
            for reader in readers {
                let _ = reader.join();
            }
        }

        tracing::debug!(command = %self.describe(), code = ?status.code(), "Process exited");
        Ok(SourceExit::from_status(status))
    }
}

fn spawn_reader<R>(
    label: &'static str,
    pipe: R,
    tx: mpsc::Sender<String>,
) -> Result<thread::JoinHandle<()>, SourceError>
where
    R: Read + Send + 'static,
{
    let handle = thread::Builder::new()
        .name(format!("process-{label}"))
        .spawn(move || {
            let mut reader = BufReader::new(pipe);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf);
                        let line = line.trim_end_matches(['\n', '\r']).to_owned();
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                }
            }
        })?;
    Ok(handle)
}

fn lock(child: &Mutex<Child>) -> MutexGuard<'_, Child> {
    match child.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn kill(child: &Mutex<Child>) {
    let mut child = lock(child);
    #[cfg(unix)]
    kill_group(child.id());
    if let Err(err) = child.kill() {
        // Already exited.
        if err.kind() != io::ErrorKind::InvalidInput {
            tracing::warn!(error = %err, pid = child.id(), "Failed to kill process");
        }
    }
}

/// SIGKILL the process group led by `pid`.
#[cfg(unix)]
fn kill_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) takes plain integers and touches no memory we own.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc == -1 {
        let err = io::Error::last_os_error();
        // ESRCH: every member has already exited.
        if err.raw_os_error() != Some(libc::ESRCH) {
            tracing::warn!(error = %err, pgid, "Failed to kill process group");
        }
    }
}

/// Wait a bounded time for both pipe readers to see EOF, then join them.
///
/// A reader still blocked after the drain window is detached and logged.
fn drain_readers(line_rx: &mpsc::Receiver<String>, readers: [thread::JoinHandle<()>; 2]) {
    let deadline = Instant::now() + READER_DRAIN;
    let mut closed = false;
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match line_rx.recv_timeout(remaining) {
            Ok(_) => {}
            Err(RecvTimeoutError::Disconnected) => {
                closed = true;
                break;
            }
            Err(RecvTimeoutError::Timeout) => break,
        }
    }

    if closed {
        for reader in readers {
            let _ = reader.join();
        }
    } else {
        tracing::warn!(
            drain_ms = READER_DRAIN.as_millis() as u64,
            "Pipe readers still open after kill; detaching",
        );
    }
}

/// Poll for exit so the abort hook can take the lock between checks.
fn wait(child: &Mutex<Child>, emitter: &LineEmitter) -> Result<ExitStatus, SourceError> {
    let mut killed = false;
    loop {
        if let Some(status) = lock(child).try_wait()? {
            return Ok(status);
        }
        if !killed && emitter.is_cancelled() {
            kill(child);
            killed = true;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_joins_program_and_args() {
        let source = ProcessSource::new("ssh").args(["-o", "BatchMode=yes"]).arg("host");
        assert_eq!(source.describe(), "ssh -o BatchMode=yes host");
    }
}
