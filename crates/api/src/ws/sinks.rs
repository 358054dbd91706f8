//! Relay sinks that live in the API layer.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use blackroad_core::stream_events::{MSG_TYPE_STREAM_DONE, MSG_TYPE_STREAM_LINE};
use blackroad_core::types::DbId;
use blackroad_pipeline::{RelaySink, SinkError, StreamOutcome};
use futures::stream::SplitSink;
use futures::SinkExt;
use serde_json::json;

use crate::ws::manager::WsManager;

/// The WebSocket of the client that started a stream.
///
/// Lines go out as plain text frames; on completion the route's done marker
/// is sent and the socket is closed. Owns the stream, so a send failure
/// cancels it.
pub struct SocketSink {
    sink: SplitSink<WebSocket, Message>,
    done_marker: &'static str,
}

impl SocketSink {
    pub fn new(sink: SplitSink<WebSocket, Message>, done_marker: &'static str) -> Self {
        Self { sink, done_marker }
    }

    /// Send the done marker and close the socket.
    pub async fn finish(&mut self) -> Result<(), SinkError> {
        self.sink
            .send(Message::Text(self.done_marker.into()))
            .await
            .map_err(|_| SinkError::Disconnected)?;
        let _ = self.sink.close().await;
        Ok(())
    }
}

#[async_trait]
impl RelaySink for SocketSink {
    fn name(&self) -> &'static str {
        "socket"
    }

    async fn line(&mut self, line: &str) -> Result<(), SinkError> {
        self.sink
            .send(Message::Text(line.into()))
            .await
            .map_err(|_| SinkError::Disconnected)
    }

    async fn done(&mut self, _outcome: &StreamOutcome) -> Result<(), SinkError> {
        self.finish().await
    }

    fn owns_stream(&self) -> bool {
        true
    }
}

/// Publishes a stream to every log-hub subscriber as JSON events.
///
/// ```json
/// {"type": "stream.line", "stream": "flash", "job_id": 1, "line": "10%"}
/// {"type": "stream.done", "stream": "flash", "job_id": 1, "outcome": {"outcome": "succeeded", "exit_code": 0}}
/// ```
pub struct HubSink {
    ws_manager: Arc<WsManager>,
    stream: &'static str,
    job_id: Option<DbId>,
}

impl HubSink {
    pub fn new(ws_manager: Arc<WsManager>, stream: &'static str, job_id: Option<DbId>) -> Self {
        Self {
            ws_manager,
            stream,
            job_id,
        }
    }
}

#[async_trait]
impl RelaySink for HubSink {
    fn name(&self) -> &'static str {
        "log_hub"
    }

    async fn line(&mut self, line: &str) -> Result<(), SinkError> {
        let event = json!({
            "type": MSG_TYPE_STREAM_LINE,
            "stream": self.stream,
            "job_id": self.job_id,
            "line": line,
        });
        self.ws_manager.broadcast_text(event.to_string()).await;
        Ok(())
    }

    async fn done(&mut self, outcome: &StreamOutcome) -> Result<(), SinkError> {
        let event = json!({
            "type": MSG_TYPE_STREAM_DONE,
            "stream": self.stream,
            "job_id": self.job_id,
            "outcome": outcome,
        });
        self.ws_manager.broadcast_text(event.to_string()).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hub_sink_publishes_line_and_done_events() {
        let manager = Arc::new(WsManager::new());
        let mut rx = manager.add("viewer".to_string()).await;
        let mut sink = HubSink::new(Arc::clone(&manager), "flash", Some(7));

        sink.line("10%").await.unwrap();
        sink.done(&StreamOutcome::Succeeded { exit_code: Some(0) })
            .await
            .unwrap();

        let Some(Message::Text(first)) = rx.recv().await else {
            panic!("expected a text frame");
        };
        let first: serde_json::Value = serde_json::from_str(first.as_str()).unwrap();
        assert_eq!(first["type"], "stream.line");
        assert_eq!(first["stream"], "flash");
        assert_eq!(first["job_id"], 7);
        assert_eq!(first["line"], "10%");

        let Some(Message::Text(second)) = rx.recv().await else {
            panic!("expected a text frame");
        };
        let second: serde_json::Value = serde_json::from_str(second.as_str()).unwrap();
        assert_eq!(second["type"], "stream.done");
        assert_eq!(second["outcome"]["outcome"], "succeeded");
        assert_eq!(second["outcome"]["exit_code"], 0);
    }

    #[tokio::test]
    async fn hub_sink_without_subscribers_is_ok() {
        let manager = Arc::new(WsManager::new());
        let mut sink = HubSink::new(manager, "model", None);
        assert!(sink.line("token").await.is_ok());
    }
}
