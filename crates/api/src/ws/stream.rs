//! Streaming endpoints: one client starts one stream and receives its lines.
//!
//! Protocol: the client sends a single JSON text message describing the
//! request. The server replies with one text frame per output line, then the
//! route's done marker, then closes. A request that fails validation gets a
//! single `[error] …` line before the marker. Closing the socket early
//! cancels the stream.

use std::path::PathBuf;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use blackroad_core::stream_events::{
    diagnostic_line, DONE_MARKER_FLASH, DONE_MARKER_MODEL, DONE_MARKER_WHISPER,
};
use blackroad_core::validation::validate_session;
use blackroad_db::models::job::JobStatus;
use blackroad_pipeline::adapters::{
    FlashRequest, FlashSource, LlamaRequest, LlamaSource, WhisperRequest, WhisperSource,
};
use blackroad_pipeline::{relay, JobRecorder, LineSource, RelaySink, TranscriptRecorder};
use futures::stream::SplitStream;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::ServerConfig;
use crate::handlers::uploads::resolve_upload;
use crate::state::AppState;
use crate::ws::sinks::{HubSink, SocketSink};

/// Static description of one streaming route.
struct StreamRoute {
    /// Label used in log fields and hub events.
    stream: &'static str,
    thread_name: &'static str,
    done_marker: &'static str,
}

const FLASH: StreamRoute = StreamRoute {
    stream: "flash",
    thread_name: "flash-writer",
    done_marker: DONE_MARKER_FLASH,
};

const MODEL: StreamRoute = StreamRoute {
    stream: "model",
    thread_name: "model-stream",
    done_marker: DONE_MARKER_MODEL,
};

const TRANSCRIBE: StreamRoute = StreamRoute {
    stream: "transcribe",
    thread_name: "whisper-stream",
    done_marker: DONE_MARKER_WHISPER,
};

/// A validated request, ready to start.
struct Prepared {
    source: Box<dyn LineSource>,
    /// Recorded as the job's command.
    command: String,
    /// Transcript session that also receives every line.
    session: Option<String>,
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct FlashStart {
    #[serde(default)]
    device: String,
    #[serde(default)]
    image_url: String,
    #[serde(default = "default_true")]
    safe_hdmi: bool,
    #[serde(default = "default_true")]
    enable_ssh: bool,
}

#[derive(Debug, Deserialize)]
struct ModelStart {
    #[serde(default)]
    model: String,
    #[serde(default)]
    prompt: String,
    n: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TranscribeStart {
    token: Option<String>,
    lang: Option<String>,
    model: Option<PathBuf>,
    session: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/ws/flash
pub async fn flash_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_stream(socket, state, FLASH, prepare_flash))
}

/// GET /api/v1/ws/model
pub async fn model_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_stream(socket, state, MODEL, prepare_model))
}

/// GET /api/v1/ws/transcribe
pub async fn transcribe_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_stream(socket, state, TRANSCRIBE, prepare_transcribe))
}

fn prepare_flash(req: FlashStart, config: &ServerConfig) -> Result<Prepared, String> {
    let source = FlashSource::new(
        config.flash_helper.as_str(),
        &FlashRequest {
            device: req.device.trim().to_string(),
            image_url: req.image_url.trim().to_string(),
            safe_hdmi: req.safe_hdmi,
            enable_ssh: req.enable_ssh,
        },
    )
    .map_err(|e| e.to_string())?;

    Ok(Prepared {
        command: source.describe(),
        source: Box::new(source),
        session: None,
    })
}

fn prepare_model(req: ModelStart, config: &ServerConfig) -> Result<Prepared, String> {
    let source = LlamaSource::new(
        LlamaRequest {
            model: req.model,
            prompt: req.prompt,
            n_predict: req.n,
        },
        &config.models_dir,
    )
    .map_err(|e| e.to_string())?;

    Ok(Prepared {
        command: format!("llama {} -n {}", source.model().display(), source.n_predict()),
        source: Box::new(source),
        session: None,
    })
}

fn prepare_transcribe(req: TranscribeStart, config: &ServerConfig) -> Result<Prepared, String> {
    let token = req
        .token
        .filter(|t| !t.trim().is_empty())
        .ok_or("missing token")?;
    let audio = resolve_upload(&config.transcribe_tmp, &token)?;

    let session = req
        .session
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| token.clone());
    validate_session(&session).map_err(|e| e.to_string())?;

    let source = WhisperSource::new(WhisperRequest {
        audio,
        model: req.model,
        language: req.lang,
    });
    Ok(Prepared {
        command: format!("whisper {token}"),
        source: Box::new(source),
        session: Some(session),
    })
}

// ---------------------------------------------------------------------------
// Shared session loop
// ---------------------------------------------------------------------------

async fn serve_stream<R, F>(socket: WebSocket, state: AppState, route: StreamRoute, prepare: F)
where
    R: DeserializeOwned,
    F: FnOnce(R, &ServerConfig) -> Result<Prepared, String>,
{
    let conn_id = uuid::Uuid::new_v4().to_string();
    let (sink, mut inbound) = socket.split();
    let mut socket_sink = SocketSink::new(sink, route.done_marker);
    tracing::info!(conn_id = %conn_id, stream = route.stream, "Stream client connected");

    let Some(first) = first_text(&mut inbound).await else {
        tracing::debug!(conn_id = %conn_id, "Stream client left before sending a request");
        return;
    };

    let prepared = serde_json::from_str::<R>(&first)
        .map_err(|_| "invalid json".to_string())
        .and_then(|req| prepare(req, state.config.as_ref()));
    let prepared = match prepared {
        Ok(prepared) => prepared,
        Err(message) => {
            tracing::info!(conn_id = %conn_id, stream = route.stream, error = %message, "Stream request rejected");
            reject(&mut socket_sink, &message).await;
            return;
        }
    };

    // Recording is best-effort: a ledger failure never blocks the stream.
    let job_id = match state.ledgers.operations.create(&prepared.command).await {
        Ok(id) => Some(id),
        Err(err) => {
            tracing::warn!(conn_id = %conn_id, error = %err, "Could not record job");
            None
        }
    };
    if let Some(session) = &prepared.session {
        if let Err(err) = state.ledgers.transcripts.start(session).await {
            tracing::warn!(session = %session, error = %err, "Could not start transcript");
        }
    }

    let (handle, rx) = match state
        .bridge
        .named(route.thread_name)
        .start_boxed(prepared.source)
    {
        Ok(started) => started,
        Err(err) => {
            tracing::error!(conn_id = %conn_id, error = %err, "Failed to spawn stream worker");
            if let Some(id) = job_id {
                let _ = state.ledgers.operations.finish(id, JobStatus::Failed, None).await;
            }
            reject(&mut socket_sink, "failed to start worker").await;
            return;
        }
    };
    if let Some(id) = job_id {
        state.streams.insert(id, handle.clone()).await;
    }

    // Watch for the client going away while the stream runs.
    let watcher_handle = handle.clone();
    let watcher_conn_id = conn_id.clone();
    let watcher = tokio::spawn(async move {
        while let Some(result) = inbound.next().await {
            match result {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
        tracing::debug!(conn_id = %watcher_conn_id, "Stream client disconnected");
        watcher_handle.request_cancel();
    });

    let mut sinks: Vec<Box<dyn RelaySink>> = vec![
        Box::new(socket_sink),
        Box::new(HubSink::new(state.ws_manager.clone(), route.stream, job_id)),
    ];
    if let Some(id) = job_id {
        sinks.push(Box::new(JobRecorder::new(state.ledgers.operations.clone(), id)));
    }
    if let Some(session) = prepared.session {
        sinks.push(Box::new(TranscriptRecorder::new(
            state.ledgers.transcripts.clone(),
            session,
        )));
    }

    let outcome = relay(rx, &handle, sinks).await;
    watcher.abort();
    if let Some(id) = job_id {
        state.streams.remove(id).await;
    }

    tracing::info!(
        conn_id = %conn_id,
        stream = route.stream,
        job_id = ?job_id,
        outcome = outcome.label(),
        "Stream finished",
    );
}

/// The first text frame from the client. `None` if the client closes first.
async fn first_text(inbound: &mut SplitStream<WebSocket>) -> Option<String> {
    while let Some(result) = inbound.next().await {
        match result {
            Ok(Message::Text(text)) => return Some(text.as_str().to_owned()),
            Ok(Message::Binary(bytes)) => {
                return Some(String::from_utf8_lossy(&bytes).into_owned());
            }
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
    None
}

/// Send a diagnostic line and the done marker, then close.
async fn reject(sink: &mut SocketSink, message: &str) {
    if sink.line(&diagnostic_line(message)).await.is_ok() {
        let _ = sink.finish().await;
    }
}
