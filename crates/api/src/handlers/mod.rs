pub mod jobs;
pub mod models;
pub mod transcripts;
pub mod uploads;
