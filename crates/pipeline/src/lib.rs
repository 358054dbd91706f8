//! Streaming core: run a blocking, line-producing worker on its own thread
//! and relay its output to async consumers.
//!
//! - [`StreamBridge`] starts a [`LineSource`] and returns a [`StreamHandle`]
//!   plus the receiving end of the relay channel.
//! - [`relay`] drains that channel into any number of [`RelaySink`]s, such
//!   as a WebSocket, the log hub or a ledger recorder.
//! - [`StreamRegistry`] tracks live streams by job id for explicit cancel.
//! - [`adapters`] wraps external programs (whisper.cpp, llama.cpp, the
//!   imaging helper, ssh) as line sources.
//!
//! Every stream delivers exactly one [`RelayMessage::Done`], after its last
//! line, whatever way it ends.

pub mod adapters;
pub mod bridge;
pub mod emitter;
pub mod handle;
pub mod message;
pub mod recorder;
pub mod registry;
pub mod relay;
pub mod source;

pub use bridge::{BridgeConfig, StreamBridge};
pub use emitter::LineEmitter;
pub use handle::StreamHandle;
pub use message::{RelayMessage, RelayReceiver, StreamOutcome};
pub use recorder::{JobRecorder, TranscriptRecorder};
pub use registry::StreamRegistry;
pub use relay::{relay, RelaySink, SinkError};
pub use source::{from_fn, LineSource, SourceError, SourceExit};
