use std::sync::Arc;

use async_trait::async_trait;
use sentinel_core::{
    models::{AgentStatus, HeartbeatRequest, JobKind, JobRecord, ReportStatus, TaskStatus},
    traits::{JobRecordRepository, TaskQueue},
    SentinelError, SentinelResult,
};
use sentinel_dispatcher::{
    AgentDirectory, CoordinationService, JobMailbox, JobReportSink, TaskSubmission,
};
use sentinel_infrastructure::{DatabaseManager, InMemoryTaskQueue};

async fn service() -> (CoordinationService, DatabaseManager) {
    let db = DatabaseManager::in_memory().await.unwrap();
    let service = CoordinationService::new(
        AgentDirectory::new(db.agent_repository()),
        JobMailbox::new(),
        JobReportSink::new(db.job_record_repository()),
    );
    (service, db)
}

fn heartbeat(agent_id: &str) -> HeartbeatRequest {
    HeartbeatRequest {
        agent_id: agent_id.to_string(),
        running_jobs: 0,
        cpu_usage: None,
    }
}

#[tokio::test]
async fn test_register_twice_yields_same_agent() {
    let (service, _db) = service().await;

    let first = service.register("hostA", "1.2.3.4").await.unwrap();
    let second = service.register("hostA", "1.2.3.4").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(service.directory.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_register_then_heartbeat_then_report() {
    let (service, _db) = service().await;

    let agent_id = service.register("hostA", "1.2.3.4").await.unwrap();
    let job = service.dispatch(&agent_id, JobKind::Shell, "echo ok");

    let mut session = service.open_session();
    let response = session.handle(heartbeat(&agent_id)).await.unwrap();
    let delivered = response.job.expect("job should be delivered");
    assert_eq!(delivered.job_id, job.job_id);
    assert!(!response.config_outdated);

    let response = session.handle(heartbeat(&agent_id)).await.unwrap();
    assert!(response.job.is_none(), "a job is delivered exactly once");
    assert_eq!(session.jobs_delivered(), 1);

    service
        .reports
        .record(&job.job_id, &agent_id, ReportStatus::Success, "ok")
        .await
        .unwrap();
    let records = service.reports.records_for(&job.job_id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].agent_id, agent_id);
    assert_eq!(records[0].result, "ok");
}

#[tokio::test]
async fn test_one_job_per_round_trip() {
    let (service, _db) = service().await;
    let agent_id = service.register("hostA", "1.2.3.4").await.unwrap();

    service.dispatch(&agent_id, JobKind::Shell, "first");
    let latest = service.dispatch(&agent_id, JobKind::Shell, "second");

    let mut session = service.open_session();
    let response = session.handle(heartbeat(&agent_id)).await.unwrap();
    assert_eq!(response.job.unwrap().job_id, latest.job_id);

    let response = session.handle(heartbeat(&agent_id)).await.unwrap();
    assert!(response.job.is_none());
}

#[tokio::test]
async fn test_session_rejects_foreign_agent_id() {
    let (service, _db) = service().await;
    let a = service.register("hostA", "1.2.3.4").await.unwrap();
    let b = service.register("hostB", "1.2.3.5").await.unwrap();
    service.dispatch(&b, JobKind::Shell, "ls");

    let mut session = service.open_session();
    session.handle(heartbeat(&a)).await.unwrap();

    let result = session.handle(heartbeat(&b)).await;
    assert!(matches!(result, Err(SentinelError::Protocol(_))));
    assert!(service.mailbox.has_pending(&b));
}

#[tokio::test]
async fn test_session_end_marks_offline_and_keeps_pending_job() {
    let (service, _db) = service().await;
    let agent_id = service.register("hostA", "1.2.3.4").await.unwrap();

    let mut session = service.open_session();
    session.handle(heartbeat(&agent_id)).await.unwrap();
    let job = service.dispatch(&agent_id, JobKind::Probe, "10.0.0.5");
    session.close().await;

    let agent = service.directory.get(&agent_id).await.unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Offline);

    let mut next = service.open_session();
    let response = next.handle(heartbeat(&agent_id)).await.unwrap();
    assert_eq!(response.job.unwrap().job_id, job.job_id);

    let agent = service.directory.get(&agent_id).await.unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Online);
}

#[tokio::test]
async fn test_superseded_session_close_keeps_agent_online() {
    let (service, _db) = service().await;
    let agent_id = service.register("hostA", "1.2.3.4").await.unwrap();

    let mut old = service.open_session();
    old.handle(heartbeat(&agent_id)).await.unwrap();

    service.register("hostA", "1.2.3.4").await.unwrap();
    let mut current = service.open_session();
    current.handle(heartbeat(&agent_id)).await.unwrap();

    old.close().await;
    let agent = service.directory.get(&agent_id).await.unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Online);

    current.close().await;
    let agent = service.directory.get(&agent_id).await.unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Offline);
}

#[tokio::test]
async fn test_heartbeat_refreshes_last_seen() {
    let (service, _db) = service().await;
    let agent_id = service.register("hostA", "1.2.3.4").await.unwrap();
    let before = service.directory.get(&agent_id).await.unwrap().unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let mut session = service.open_session();
    session.handle(heartbeat(&agent_id)).await.unwrap();

    let after = service.directory.get(&agent_id).await.unwrap().unwrap();
    assert!(after.last_seen > before.last_seen);
}

#[tokio::test]
async fn test_unknown_agent_heartbeat_still_answers() {
    let (service, _db) = service().await;
    let mut session = service.open_session();

    let response = session.handle(heartbeat("ghost")).await.unwrap();
    assert!(response.job.is_none());
    assert_eq!(session.agent_id(), Some("ghost"));
}

struct FailingRecords;

#[async_trait]
impl JobRecordRepository for FailingRecords {
    async fn append(
        &self,
        _job_id: &str,
        _agent_id: &str,
        _status: ReportStatus,
        _result: &str,
    ) -> SentinelResult<JobRecord> {
        Err(SentinelError::DatabaseOperation("disk full".to_string()))
    }

    async fn find_by_job_id(&self, _job_id: &str) -> SentinelResult<Vec<JobRecord>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_report_persistence_failure_is_surfaced() {
    let sink = JobReportSink::new(Arc::new(FailingRecords));
    let result = sink.record("j1", "a1", ReportStatus::Failed, "boom").await;
    assert!(matches!(result, Err(SentinelError::DatabaseOperation(_))));
}

#[tokio::test]
async fn test_submit_creates_pending_task_and_publishes_id() {
    let db = DatabaseManager::in_memory().await.unwrap();
    let queue = InMemoryTaskQueue::new();
    let submission = TaskSubmission::new(db.task_repository(), Arc::new(queue.clone()));

    let task = submission.submit("10.0.0.5").await.unwrap();
    assert_eq!(task.status, TaskStatus::Pending);

    let stored = submission.get(task.id).await.unwrap().unwrap();
    assert_eq!(stored.target, "10.0.0.5");

    let mut stream = queue.subscribe(1).await.unwrap();
    let delivery = stream.next_delivery().await.unwrap().unwrap();
    assert_eq!(delivery.body(), task.id.to_string().as_bytes());
}

#[tokio::test]
async fn test_submit_publish_failure_keeps_row_pending() {
    let db = DatabaseManager::in_memory().await.unwrap();
    let queue = InMemoryTaskQueue::new();
    queue.close().await.unwrap();
    let submission = TaskSubmission::new(db.task_repository(), Arc::new(queue));

    assert!(submission.submit("10.0.0.5").await.is_err());

    let stored = submission.get(1).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Pending);
}
