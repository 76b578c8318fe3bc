/// Process-local registry of in-flight processing jobs
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::domain::value_objects::{AgentId, DocumentId, JobKey, Milestone, ProcessingStatus, Progress};

/// How long finished jobs stay visible to pollers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobRegistryConfig {
    pub completed_ttl: Duration,
    pub failed_ttl: Duration,
}

impl Default for JobRegistryConfig {
    fn default() -> Self {
        JobRegistryConfig {
            completed_ttl: Duration::from_secs(30),
            failed_ttl: Duration::from_secs(300),
        }
    }
}

/// Ephemeral progress view of one (agent, document) pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingJob {
    pub agent_id: AgentId,
    pub document_id: DocumentId,
    pub document_name: String,
    pub status: ProcessingStatus,
    pub progress: Progress,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessingJob {
    fn started(key: &JobKey, document_name: &str) -> Self {
        let now = Utc::now();
        ProcessingJob {
            agent_id: key.agent_id.clone(),
            document_id: key.document_id.clone(),
            document_name: document_name.to_string(),
            status: ProcessingStatus::Processing,
            progress: Milestone::Started.progress(),
            message: Milestone::Started.message().to_string(),
            error: None,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> JobKey {
        JobKey::new(self.agent_id.clone(), self.document_id.clone())
    }
}

struct TrackedJob {
    job: ProcessingJob,
    expires_at: Option<Instant>,
}

impl TrackedJob {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Owned by a processing service instance; never shared through global state.
///
/// Also acts as the per-(agent, document) lease: a key can only be begun while
/// no job for it is processing. Finished jobs are evicted lazily once their
/// grace window has passed.
pub struct JobRegistry {
    config: JobRegistryConfig,
    jobs: Mutex<HashMap<JobKey, TrackedJob>>,
}

impl JobRegistry {
    pub fn new(config: JobRegistryConfig) -> Self {
        JobRegistry {
            config,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &JobRegistryConfig {
        &self.config
    }

    /// Claim the key for a new run. Returns false when a run is already processing.
    pub async fn try_begin(&self, key: &JobKey, document_name: &str) -> bool {
        let mut jobs = self.jobs.lock().await;
        let now = Instant::now();

        if let Some(existing) = jobs.get(key) {
            if !existing.is_expired(now) && existing.job.status == ProcessingStatus::Processing {
                debug!("Job {} is already processing", key);
                return false;
            }
        }

        jobs.insert(
            key.clone(),
            TrackedJob {
                job: ProcessingJob::started(key, document_name),
                expires_at: None,
            },
        );
        debug!("Job {} started", key);
        true
    }

    /// Move a running job to a pipeline checkpoint
    pub async fn advance(&self, key: &JobKey, milestone: Milestone) {
        let mut jobs = self.jobs.lock().await;
        if let Some(tracked) = jobs.get_mut(key) {
            tracked.job.progress = milestone.progress();
            tracked.job.message = milestone.message().to_string();
            tracked.job.updated_at = Utc::now();
        }
    }

    pub async fn complete(&self, key: &JobKey) {
        let ttl = self.config.completed_ttl;
        self.finish(key, ttl, |job| {
            job.status = ProcessingStatus::Completed;
            job.progress = Progress::complete();
            job.message = Milestone::Done.message().to_string();
        })
        .await;
    }

    pub async fn fail(&self, key: &JobKey, error: &str) {
        let ttl = self.config.failed_ttl;
        self.finish(key, ttl, |job| {
            job.status = ProcessingStatus::Failed;
            job.progress = Progress::zero();
            job.message = format!("Processing failed: {}", error);
            job.error = Some(error.to_string());
        })
        .await;
    }

    async fn finish<F>(&self, key: &JobKey, ttl: Duration, update: F)
    where
        F: FnOnce(&mut ProcessingJob),
    {
        let mut jobs = self.jobs.lock().await;
        if let Some(tracked) = jobs.get_mut(key) {
            update(&mut tracked.job);
            tracked.job.updated_at = Utc::now();
            tracked.expires_at = Some(Instant::now() + ttl);
            debug!("Job {} finished as {}, evicting in {:?}", key, tracked.job.status, ttl);
        }
    }

    /// Drop a job immediately, releasing its lease
    pub async fn remove(&self, key: &JobKey) -> Option<ProcessingJob> {
        self.jobs.lock().await.remove(key).map(|tracked| tracked.job)
    }

    pub async fn get(&self, key: &JobKey) -> Option<ProcessingJob> {
        let mut jobs = self.jobs.lock().await;
        Self::evict_expired(&mut jobs);
        jobs.get(key).map(|tracked| tracked.job.clone())
    }

    /// All visible jobs for an agent, oldest first
    pub async fn list_by_agent(&self, agent_id: &AgentId) -> Vec<ProcessingJob> {
        let mut jobs = self.jobs.lock().await;
        Self::evict_expired(&mut jobs);
        let mut listed: Vec<ProcessingJob> = jobs
            .values()
            .filter(|tracked| &tracked.job.agent_id == agent_id)
            .map(|tracked| tracked.job.clone())
            .collect();
        listed.sort_by_key(|job| job.started_at);
        listed
    }

    /// Jobs that are still processing
    pub async fn active(&self) -> Vec<ProcessingJob> {
        let mut jobs = self.jobs.lock().await;
        Self::evict_expired(&mut jobs);
        let mut active: Vec<ProcessingJob> = jobs
            .values()
            .filter(|tracked| tracked.job.status == ProcessingStatus::Processing)
            .map(|tracked| tracked.job.clone())
            .collect();
        active.sort_by_key(|job| job.started_at);
        active
    }

    /// Evict finished jobs whose grace window has passed
    pub async fn purge_expired(&self) -> usize {
        let mut jobs = self.jobs.lock().await;
        Self::evict_expired(&mut jobs)
    }

    fn evict_expired(jobs: &mut HashMap<JobKey, TrackedJob>) -> usize {
        let now = Instant::now();
        let before = jobs.len();
        jobs.retain(|_, tracked| !tracked.is_expired(now));
        before - jobs.len()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new(JobRegistryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(agent: &str, doc: &str) -> JobKey {
        JobKey::new(AgentId::new(agent).unwrap(), DocumentId::new(doc).unwrap())
    }

    #[tokio::test]
    async fn test_begin_and_advance() {
        let registry = JobRegistry::default();
        let key = key("agent-1", "doc-1");

        assert!(registry.try_begin(&key, "deck.pdf").await);
        let job = registry.get(&key).await.unwrap();
        assert_eq!(job.status, ProcessingStatus::Processing);
        assert_eq!(job.progress.value(), 0);
        assert_eq!(job.document_name, "deck.pdf");

        registry.advance(&key, Milestone::Embedding).await;
        let job = registry.get(&key).await.unwrap();
        assert_eq!(job.progress.value(), 50);
        assert_eq!(job.message, "Generating embeddings...");
    }

    #[tokio::test]
    async fn test_lease_rejects_second_begin_while_processing() {
        let registry = JobRegistry::default();
        let key = key("agent-1", "doc-1");

        assert!(registry.try_begin(&key, "deck.pdf").await);
        assert!(!registry.try_begin(&key, "deck.pdf").await);

        registry.complete(&key).await;
        assert!(registry.try_begin(&key, "deck.pdf").await);
    }

    #[tokio::test]
    async fn test_lease_is_per_agent_and_document() {
        let registry = JobRegistry::default();
        assert!(registry.try_begin(&key("agent-1", "doc-1"), "a").await);
        assert!(registry.try_begin(&key("agent-2", "doc-1"), "a").await);
        assert!(registry.try_begin(&key("agent-1", "doc-2"), "b").await);
        assert_eq!(registry.active().await.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_job_evicted_after_grace_window() {
        let registry = JobRegistry::default();
        let key = key("agent-1", "doc-1");
        registry.try_begin(&key, "deck.pdf").await;
        registry.complete(&key).await;

        tokio::time::advance(Duration::from_secs(29)).await;
        let job = registry.get(&key).await.unwrap();
        assert_eq!(job.status, ProcessingStatus::Completed);
        assert_eq!(job.progress.value(), 100);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(registry.get(&key).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_job_kept_longer() {
        let registry = JobRegistry::default();
        let key = key("agent-1", "doc-1");
        registry.try_begin(&key, "deck.pdf").await;
        registry.fail(&key, "No text content extracted").await;

        tokio::time::advance(Duration::from_secs(120)).await;
        let job = registry.get(&key).await.unwrap();
        assert_eq!(job.status, ProcessingStatus::Failed);
        assert_eq!(job.progress.value(), 0);
        assert_eq!(job.error.as_deref(), Some("No text content extracted"));

        tokio::time::advance(Duration::from_secs(181)).await;
        assert_eq!(registry.purge_expired().await, 1);
        assert!(registry.get(&key).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_processing_job_never_expires() {
        let registry = JobRegistry::default();
        let key = key("agent-1", "doc-1");
        registry.try_begin(&key, "deck.pdf").await;

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(registry.get(&key).await.is_some());
    }

    #[tokio::test]
    async fn test_list_by_agent() {
        let registry = JobRegistry::default();
        registry.try_begin(&key("agent-1", "doc-1"), "a").await;
        registry.try_begin(&key("agent-1", "doc-2"), "b").await;
        registry.try_begin(&key("agent-2", "doc-3"), "c").await;

        let jobs = registry.list_by_agent(&AgentId::new("agent-1").unwrap()).await;
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.agent_id.as_str() == "agent-1"));
    }

    #[tokio::test]
    async fn test_remove_releases_lease() {
        let registry = JobRegistry::default();
        let key = key("agent-1", "doc-1");
        registry.try_begin(&key, "deck.pdf").await;
        assert!(registry.remove(&key).await.is_some());
        assert!(registry.try_begin(&key, "deck.pdf").await);
    }

    #[tokio::test]
    async fn test_instances_are_independent() {
        let first = JobRegistry::default();
        let second = JobRegistry::default();
        let key = key("agent-1", "doc-1");
        first.try_begin(&key, "deck.pdf").await;
        assert!(second.get(&key).await.is_none());
    }
}
