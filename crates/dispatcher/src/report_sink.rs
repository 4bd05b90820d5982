use std::sync::Arc;

use sentinel_core::{
    models::{JobRecord, ReportStatus},
    traits::JobRecordRepository,
    SentinelResult,
};
use tracing::{error, info};

/// Records terminal job results. Every call appends; nothing is retried here.
#[derive(Clone)]
pub struct JobReportSink {
    repo: Arc<dyn JobRecordRepository>,
}

impl JobReportSink {
    pub fn new(repo: Arc<dyn JobRecordRepository>) -> Self {
        Self { repo }
    }

    pub async fn record(
        &self,
        job_id: &str,
        agent_id: &str,
        status: ReportStatus,
        result: &str,
    ) -> SentinelResult<JobRecord> {
        match self.repo.append(job_id, agent_id, status, result).await {
            Ok(record) => {
                metrics::counter!("sentinel_job_reports_total", "status" => status.as_str())
                    .increment(1);
                info!(
                    agent_id = %agent_id,
                    job_id = %job_id,
                    status = %status,
                    "Job report recorded"
                );
                Ok(record)
            }
            Err(e) => {
                error!(
                    agent_id = %agent_id,
                    job_id = %job_id,
                    error = %e,
                    "Failed to persist job report"
                );
                Err(e)
            }
        }
    }

    pub async fn records_for(&self, job_id: &str) -> SentinelResult<Vec<JobRecord>> {
        self.repo.find_by_job_id(job_id).await
    }
}
