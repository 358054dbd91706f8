//! Live streams indexed by the job they are recording.

use std::collections::HashMap;
use std::sync::Arc;

use blackroad_core::types::DbId;
use tokio::sync::RwLock;

use crate::handle::StreamHandle;

/// Shared map of job id to live [`StreamHandle`].
///
/// Lets a request other than the stream's owner cancel it, and lets shutdown
/// cancel everything still running.
#[derive(Clone, Default)]
pub struct StreamRegistry {
    streams: Arc<RwLock<HashMap<DbId, StreamHandle>>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, job_id: DbId, handle: StreamHandle) {
        self.streams.write().await.insert(job_id, handle);
    }

    pub async fn remove(&self, job_id: DbId) -> Option<StreamHandle> {
        self.streams.write().await.remove(&job_id)
    }

    pub async fn get(&self, job_id: DbId) -> Option<StreamHandle> {
        self.streams.read().await.get(&job_id).cloned()
    }

    /// Cancel the stream recording `job_id` and wait for its worker to exit.
    ///
    /// Returns `false` when no live stream is registered for that job.
    pub async fn cancel(&self, job_id: DbId) -> bool {
        let Some(handle) = self.get(job_id).await else {
            return false;
        };
        let outcome = handle.cancel().await;
        tracing::info!(job_id, outcome = outcome.label(), "Stream cancelled");
        true
    }

    /// Ids of all registered streams, ascending.
    pub async fn active_ids(&self) -> Vec<DbId> {
        let mut ids: Vec<DbId> = self.streams.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub async fn len(&self) -> usize {
        self.streams.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.streams.read().await.is_empty()
    }

    /// Cancel and join every registered stream. Used during shutdown.
    pub async fn cancel_all(&self) {
        let handles: Vec<(DbId, StreamHandle)> = self.streams.write().await.drain().collect();
        let count = handles.len();
        for (job_id, handle) in handles {
            let outcome = handle.cancel().await;
            tracing::debug!(job_id, outcome = outcome.label(), "Stream cancelled at shutdown");
        }
        if count > 0 {
            tracing::info!(count, "Cancelled all live streams");
        }
    }
}
