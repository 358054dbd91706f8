//! Handlers for the `/jobs` resource.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use blackroad_core::error::CoreError;
use blackroad_core::types::DbId;
use blackroad_core::validation::validate_command;
use blackroad_db::ledger::operations::DEFAULT_LIST_LIMIT;
use blackroad_db::models::job::JobStatus;
use blackroad_pipeline::adapters::RemoteSource;
use blackroad_pipeline::{
    relay, JobRecorder, LineSource, RelayReceiver, RelaySink, StreamHandle, StreamOutcome,
    StreamRegistry, TranscriptRecorder,
};
use serde::Deserialize;
use tokio::task::JoinHandle;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;
use crate::ws::sinks::HubSink;

/// Query parameters for `GET /api/v1/jobs`.
#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    /// Maximum number of results. Defaults to 50, capped at 500.
    pub limit: Option<i64>,
}

/// Body of `POST /api/v1/jobs/run`.
#[derive(Debug, Deserialize)]
pub struct RunJobRequest {
    pub command: String,
    /// Overrides the configured remote host.
    pub host: Option<String>,
    pub user: Option<String>,
}

/// GET /api/v1/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs = state
        .ledgers
        .operations
        .list(params.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .ledgers
        .operations
        .get(job_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Job", job_id))?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/jobs/{id}/cancel
///
/// Cancels the live stream recording this job and waits for its worker to
/// exit. Returns 204, or 409 when the job exists but has no live stream.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<StatusCode> {
    if state.streams.cancel(job_id).await {
        return Ok(StatusCode::NO_CONTENT);
    }

    if state.ledgers.operations.get(job_id).await?.is_none() {
        return Err(CoreError::not_found("Job", job_id).into());
    }
    Err(CoreError::Conflict(format!("Job {job_id} has no live stream")).into())
}

/// POST /api/v1/jobs/run (also mounted as POST /api/v1/run)
///
/// Run `command` on the remote target over ssh, recording it as a job, and
/// return the finished job. Output lines are also published to the log hub.
/// Bounded by `JOB_RUN_TIMEOUT_SECS`; on expiry the stream is cancelled and
/// the job is recorded as failed.
pub async fn run_job(
    State(state): State<AppState>,
    Json(input): Json<RunJobRequest>,
) -> AppResult<impl IntoResponse> {
    validate_command(&input.command)?;

    let host = input
        .host
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| state.config.remote_host.clone());
    let user = input
        .user
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| state.config.remote_user.clone());

    let source = RemoteSource::new(&user, &host, &input.command);
    tracing::debug!(command = %source.describe(), "Remote job requested");

    let (job_id, _) = run_recorded(
        &state,
        OneShot {
            thread_name: "remote-job",
            stream: "remote",
            command: input.command,
            source: Box::new(source),
            session: None,
        },
    )
    .await?;

    let job = state
        .ledgers
        .operations
        .get(job_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Job", job_id))?;
    Ok(Json(DataResponse { data: job }))
}

/// A source run to completion on behalf of one request.
pub(crate) struct OneShot {
    pub thread_name: &'static str,
    /// Label for hub events.
    pub stream: &'static str,
    /// Recorded as the job's command.
    pub command: String,
    pub source: Box<dyn LineSource>,
    /// Transcript session that also receives every line.
    pub session: Option<String>,
}

/// Record `run` as a job, stream it to the ledgers and the log hub, and wait
/// for it to finish or hit `JOB_RUN_TIMEOUT_SECS`.
pub(crate) async fn run_recorded(
    state: &AppState,
    run: OneShot,
) -> AppResult<(DbId, StreamOutcome)> {
    if let Some(session) = &run.session {
        state.ledgers.transcripts.start(session).await?;
    }
    let job_id = state.ledgers.operations.create(&run.command).await?;
    tracing::info!(job_id, stream = run.stream, command = %run.command, "Job started");

    let (handle, rx) = match state.bridge.named(run.thread_name).start_boxed(run.source) {
        Ok(started) => started,
        Err(err) => {
            state
                .ledgers
                .operations
                .finish(job_id, JobStatus::Failed, None)
                .await?;
            return Err(AppError::InternalError(format!(
                "failed to start worker thread: {err}"
            )));
        }
    };
    state.streams.insert(job_id, handle.clone()).await;

    let mut sinks: Vec<Box<dyn RelaySink>> = vec![
        Box::new(JobRecorder::new(state.ledgers.operations.clone(), job_id)),
        Box::new(HubSink::new(state.ws_manager.clone(), run.stream, Some(job_id))),
    ];
    if let Some(session) = run.session {
        sinks.push(Box::new(TranscriptRecorder::new(
            state.ledgers.transcripts.clone(),
            session,
        )));
    }

    let limit = Duration::from_secs(state.config.job_run_timeout_secs);
    let outcome = spawn_supervised(state.streams.clone(), job_id, handle, rx, sinks, limit)
        .await
        .map_err(|err| AppError::InternalError(format!("relay task failed: {err}")))?;
    tracing::info!(job_id, outcome = outcome.label(), "Job finished");
    Ok((job_id, outcome))
}

/// Relay a registered stream into `sinks` on its own task, cancelling it once
/// `limit` elapses.
///
/// The task owns the registry entry for `job_id` and removes it when the
/// stream ends, so the entry is released even if the request that started
/// the job goes away.
fn spawn_supervised(
    streams: StreamRegistry,
    job_id: DbId,
    handle: StreamHandle,
    rx: RelayReceiver,
    sinks: Vec<Box<dyn RelaySink>>,
    limit: Duration,
) -> JoinHandle<StreamOutcome> {
    tokio::spawn(async move {
        let relaying = relay(rx, &handle, sinks);
        tokio::pin!(relaying);
        let outcome = match tokio::time::timeout(limit, &mut relaying).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(job_id, timeout_secs = limit.as_secs(), "Job timed out");
                // Keep draining while the grace period and abort run.
                let (_, outcome) = tokio::join!(handle.cancel(), &mut relaying);
                outcome
            }
        };
        streams.remove(job_id).await;
        outcome
    })
}
