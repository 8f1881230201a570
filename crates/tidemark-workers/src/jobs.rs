//! Job persistence over the cache storage contract.
//!
//! Jobs live under `job:<id>` with a one-hour TTL. Status transitions are
//! last-writer-wins on the same id; a job is mutated at most twice.

use std::sync::Arc;
use std::time::Duration;
use tidemark_cache::CacheStorage;
use tidemark_types::{ConversionResult, ConvertError, ConvertOptions, Job, Result};
use tracing::{debug, warn};

const JOB_TTL: Duration = Duration::from_secs(3600);

#[derive(Clone)]
pub struct JobStore {
    storage: Arc<dyn CacheStorage>,
}

impl JobStore {
    pub fn new(storage: Arc<dyn CacheStorage>) -> Self {
        Self { storage }
    }

    fn key(id: &str) -> String {
        format!("job:{id}")
    }

    /// Short opaque job token.
    fn new_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
    }

    pub async fn create(
        &self,
        url: String,
        options: ConvertOptions,
        callback_url: Option<String>,
    ) -> Result<Job> {
        let job = Job::new(Self::new_id(), url, options, callback_url);
        self.persist(&job).await?;
        debug!(job_id = %job.id, "job created");
        Ok(job)
    }

    pub async fn get(&self, id: &str) -> Result<Job> {
        let raw = self
            .storage
            .get(&Self::key(id))
            .await?
            .ok_or(ConvertError::JobNotFound)?;
        serde_json::from_slice(&raw).map_err(|e| ConvertError::internal(format!("job decode: {e}")))
    }

    pub async fn complete(&self, id: &str, result: ConversionResult) -> Result<Job> {
        let mut job = self.get(id).await?;
        job.complete(result);
        self.persist(&job).await?;
        debug!(job_id = %id, "job completed");
        Ok(job)
    }

    pub async fn fail(&self, id: &str, error: String) -> Result<Job> {
        let mut job = self.get(id).await?;
        job.fail(error);
        self.persist(&job).await?;
        warn!(job_id = %id, "job failed");
        Ok(job)
    }

    async fn persist(&self, job: &Job) -> Result<()> {
        let raw = serde_json::to_vec(job)
            .map_err(|e| ConvertError::internal(format!("job encode: {e}")))?;
        self.storage.set(&Self::key(&job.id), &raw, JOB_TTL).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_cache::MemoryCache;
    use tidemark_types::JobStatus;

    fn store() -> JobStore {
        JobStore::new(Arc::new(MemoryCache::new()))
    }

    #[tokio::test]
    async fn create_then_get() {
        let store = store();
        let job = store
            .create("https://example.com".into(), ConvertOptions::default(), None)
            .await
            .unwrap();
        assert_eq!(job.id.len(), 12);
        assert_eq!(job.status, JobStatus::Processing);

        let fetched = store.get(&job.id).await.unwrap();
        assert_eq!(fetched.url, "https://example.com");
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let err = store().get("nope").await.unwrap_err();
        assert!(matches!(err, ConvertError::JobNotFound));
    }

    #[tokio::test]
    async fn complete_and_fail_transition() {
        let store = store();
        let job = store
            .create("https://example.com".into(), ConvertOptions::default(), None)
            .await
            .unwrap();

        let done = store
            .complete(&job.id, ConversionResult::empty("https://example.com"))
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert!(done.result.is_some());

        let failed = store.fail(&job.id, "boom".into()).await.unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }
}
