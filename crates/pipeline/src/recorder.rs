//! Sinks that persist a stream into the ledgers.

use async_trait::async_trait;
use blackroad_core::types::DbId;
use blackroad_db::models::job::JobStatus;
use blackroad_db::{OperationLedger, TranscriptLedger};

use crate::message::StreamOutcome;
use crate::relay::{RelaySink, SinkError};

/// Ledger status for a terminal outcome. Only a clean success counts as
/// `succeeded`; cancellation is recorded as `failed`.
pub fn job_status_for(outcome: &StreamOutcome) -> JobStatus {
    if outcome.is_success() {
        JobStatus::Succeeded
    } else {
        JobStatus::Failed
    }
}

/// Appends every line to a job's output and finalises the job.
pub struct JobRecorder {
    ledger: OperationLedger,
    job_id: DbId,
}

impl JobRecorder {
    pub fn new(ledger: OperationLedger, job_id: DbId) -> Self {
        Self { ledger, job_id }
    }
}

#[async_trait]
impl RelaySink for JobRecorder {
    fn name(&self) -> &'static str {
        "job_recorder"
    }

    async fn line(&mut self, line: &str) -> Result<(), SinkError> {
        self.ledger
            .append_output(self.job_id, &format!("{line}\n"))
            .await?;
        Ok(())
    }

    async fn done(&mut self, outcome: &StreamOutcome) -> Result<(), SinkError> {
        self.ledger
            .finish(self.job_id, job_status_for(outcome), outcome.exit_code())
            .await?;
        Ok(())
    }
}

/// Appends every line to a transcript session and marks it ended.
pub struct TranscriptRecorder {
    ledger: TranscriptLedger,
    session: String,
}

impl TranscriptRecorder {
    pub fn new(ledger: TranscriptLedger, session: impl Into<String>) -> Self {
        Self {
            ledger,
            session: session.into(),
        }
    }
}

#[async_trait]
impl RelaySink for TranscriptRecorder {
    fn name(&self) -> &'static str {
        "transcript_recorder"
    }

    async fn line(&mut self, line: &str) -> Result<(), SinkError> {
        self.ledger
            .append(&self.session, &format!("{line}\n"))
            .await?;
        Ok(())
    }

    async fn done(&mut self, _outcome: &StreamOutcome) -> Result<(), SinkError> {
        self.ledger.finish(&self.session).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_success_maps_to_succeeded() {
        assert_eq!(
            job_status_for(&StreamOutcome::Succeeded { exit_code: Some(0) }),
            JobStatus::Succeeded
        );
        assert_eq!(
            job_status_for(&StreamOutcome::Cancelled { exit_code: Some(0) }),
            JobStatus::Failed
        );
        assert_eq!(
            job_status_for(&StreamOutcome::Faulted {
                error: "x".into()
            }),
            JobStatus::Failed
        );
    }
}
