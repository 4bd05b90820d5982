use std::sync::Arc;

use dashmap::DashMap;
use sentinel_core::models::Job;
use tracing::{debug, warn};

/// Per-agent single-slot holding area for the next job to deliver.
///
/// `offer` is last-write-wins: an unclaimed job is replaced and the original
/// dispatcher is not told. `take_if_present` removes atomically, so a job is
/// handed to at most one caller.
#[derive(Debug, Clone, Default)]
pub struct JobMailbox {
    slots: Arc<DashMap<String, Job>>,
}

impl JobMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offer(&self, job: Job) {
        let agent_id = job.target_agent_id.clone();
        let job_id = job.job_id.clone();

        metrics::counter!("sentinel_jobs_offered_total").increment(1);
        if let Some(displaced) = self.slots.insert(agent_id.clone(), job) {
            metrics::counter!("sentinel_jobs_overwritten_total").increment(1);
            warn!(
                agent_id = %agent_id,
                job_id = %job_id,
                displaced_job_id = %displaced.job_id,
                "Unclaimed job replaced in mailbox"
            );
        } else {
            debug!(agent_id = %agent_id, job_id = %job_id, "Job queued in mailbox");
        }
    }

    pub fn take_if_present(&self, agent_id: &str) -> Option<Job> {
        self.slots.remove(agent_id).map(|(_, job)| job)
    }

    pub fn has_pending(&self, agent_id: &str) -> bool {
        self.slots.contains_key(agent_id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
