//! WebSocket infrastructure: the log hub, heartbeat and the streaming
//! endpoints mounted under `/api/v1/ws`.

mod handler;
mod heartbeat;
pub mod manager;
pub mod sinks;
mod stream;

pub use handler::logs_ws;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
pub use stream::{flash_ws, model_ws, transcribe_ws};
