use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sentinel_core::{
    models::{Job, JobEnvelope, JobKind, ReportJobRequest, ReportStatus},
    traits::ExecutionOutcome,
    ExecutorRegistry,
};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

use super::CoordinatorTransport;

/// Runs jobs received over the heartbeat stream and reports their results.
///
/// Each job gets its own task. There is no local concurrency cap.
#[derive(Clone)]
pub struct TaskExecutionManager {
    registry: ExecutorRegistry,
    transport: Arc<dyn CoordinatorTransport>,
    execution_timeout: Duration,
    report_timeout: Duration,
    running_jobs: Arc<AtomicU32>,
}

impl TaskExecutionManager {
    pub fn new(
        registry: ExecutorRegistry,
        transport: Arc<dyn CoordinatorTransport>,
        execution_timeout: Duration,
        report_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            transport,
            execution_timeout,
            report_timeout,
            running_jobs: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn running_jobs(&self) -> u32 {
        self.running_jobs.load(Ordering::SeqCst)
    }

    pub fn spawn_job(&self, agent_id: &str, envelope: JobEnvelope) -> JoinHandle<Job> {
        let manager = self.clone();
        let agent_id = agent_id.to_string();
        tokio::spawn(async move { manager.run_job(&agent_id, envelope).await })
    }

    /// Execute one job and report it. Failures to report are logged only.
    pub async fn run_job(&self, agent_id: &str, envelope: JobEnvelope) -> Job {
        let mut job = Job::from_envelope(agent_id, envelope);
        info!(job_id = %job.job_id, kind = %job.kind, "Executing job");

        job.mark_executing();
        let outcome = {
            let _running = RunningJobGuard::enter(&self.running_jobs);
            self.execute(&job).await
        };

        let status = ReportStatus::from_success(outcome.success);
        let report = ReportJobRequest {
            agent_id: agent_id.to_string(),
            job_id: job.job_id.clone(),
            status,
            result: outcome.result,
        };

        match timeout(self.report_timeout, self.transport.report(&report)).await {
            Ok(Ok(())) => {
                job.mark_reported(status);
                info!(job_id = %job.job_id, status = %status, "Job reported");
            }
            Ok(Err(e)) => error!(job_id = %job.job_id, error = %e, "Failed to report job"),
            Err(_) => warn!(
                job_id = %job.job_id,
                timeout_secs = self.report_timeout.as_secs(),
                "Job report timed out"
            ),
        }

        job
    }

    async fn execute(&self, job: &Job) -> ExecutionOutcome {
        let executor = match self.registry.get(job.kind) {
            Ok(executor) => executor,
            Err(e) => return ExecutionOutcome::failure(e.to_string()),
        };

        let target = match job.kind {
            JobKind::Shell => "localhost",
            JobKind::Probe => job.payload.as_str(),
        };

        match timeout(self.execution_timeout, executor.execute(target, &job.payload)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => ExecutionOutcome::failure(format!("execution error: {e}")),
            Err(_) => ExecutionOutcome::failure(format!(
                "job timed out ({}s limit)",
                self.execution_timeout.as_secs()
            )),
        }
    }
}

/// Holds one slot of the running job count until dropped, including on unwind.
struct RunningJobGuard {
    count: Arc<AtomicU32>,
}

impl RunningJobGuard {
    fn enter(count: &Arc<AtomicU32>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self {
            count: count.clone(),
        }
    }
}

impl Drop for RunningJobGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}
