use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::application::services::{JobRegistry, ProcessingJob};
use crate::domain::value_objects::{JobKey, ProcessingStatus};

/// Poll cadence of the reference status poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            interval: Duration::from_millis(2000),
            max_attempts: 150,
        }
    }
}

/// How a poll ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Completed(ProcessingJob),
    Failed(ProcessingJob),
    /// Gave up locally; the job itself keeps running
    TimedOut { attempts: u32 },
    /// No job is tracked for the key, either never started or already evicted
    NotTracked,
}

/// Use case for following a processing job until it finishes.
///
/// The poller only reads the registry, so timing out never affects the job.
pub struct PollProcessingStatus {
    registry: Arc<JobRegistry>,
    config: PollConfig,
}

impl PollProcessingStatus {
    pub fn new(registry: Arc<JobRegistry>, config: PollConfig) -> Self {
        Self { registry, config }
    }

    /// Poll until the job is terminal, calling `on_update` with every observed state
    pub async fn execute<F>(&self, key: &JobKey, mut on_update: F) -> PollOutcome
    where
        F: FnMut(&ProcessingJob),
    {
        for attempt in 1..=self.config.max_attempts {
            let job = match self.registry.get(key).await {
                Some(job) => job,
                None => {
                    debug!("No job tracked for {}", key);
                    return PollOutcome::NotTracked;
                }
            };

            on_update(&job);
            match job.status {
                ProcessingStatus::Completed => return PollOutcome::Completed(job),
                ProcessingStatus::Failed => return PollOutcome::Failed(job),
                _ => {}
            }

            if attempt < self.config.max_attempts {
                tokio::time::sleep(self.config.interval).await;
            }
        }

        warn!(
            "Stopped polling {} after {} attempts",
            key, self.config.max_attempts
        );
        PollOutcome::TimedOut {
            attempts: self.config.max_attempts,
        }
    }
}
