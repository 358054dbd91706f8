//! Thin SQL wrappers. Callers own locking and transactions; see [`crate::ledger`].

pub mod job_repo;
pub mod transcript_repo;

pub use job_repo::JobRepo;
pub use transcript_repo::TranscriptRepo;
