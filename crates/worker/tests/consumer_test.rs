use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sentinel_core::{
    config::WorkerConfig,
    models::{Task, TaskStatus},
    traits::{ExecutionOutcome, JobExecutor, TaskQueue, TaskRepository},
    SentinelError, SentinelResult,
};
use sentinel_infrastructure::{DatabaseManager, InMemoryTaskQueue};
use sentinel_worker::TaskQueueConsumer;
use tokio::sync::broadcast;

/// Tracks how many executions overlap.
struct RecordingExecutor {
    delay: Duration,
    calls: AtomicUsize,
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl RecordingExecutor {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            calls: AtomicUsize::new(0),
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobExecutor for RecordingExecutor {
    fn name(&self) -> &str {
        "recording"
    }

    async fn execute(&self, target: &str, _payload: &str) -> SentinelResult<ExecutionOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(ExecutionOutcome::success(format!("Open Ports: 80 ({target})")))
    }
}

struct BrokenExecutor;

#[async_trait]
impl JobExecutor for BrokenExecutor {
    fn name(&self) -> &str {
        "broken"
    }

    async fn execute(&self, _target: &str, _payload: &str) -> SentinelResult<ExecutionOutcome> {
        Err(SentinelError::TaskExecution("scanner crashed".to_string()))
    }
}

/// Never returns from the final status write, simulating a worker that dies
/// between execution and persistence.
struct StallingRepository {
    inner: Arc<dyn TaskRepository>,
}

#[async_trait]
impl TaskRepository for StallingRepository {
    async fn create(&self, target: &str) -> SentinelResult<Task> {
        self.inner.create(target).await
    }

    async fn get_by_id(&self, id: i64) -> SentinelResult<Option<Task>> {
        self.inner.get_by_id(id).await
    }

    async fn update_status(
        &self,
        id: i64,
        status: TaskStatus,
        result: Option<&str>,
    ) -> SentinelResult<()> {
        if status.is_terminal() {
            return std::future::pending().await;
        }
        self.inner.update_status(id, status, result).await
    }
}

fn worker_config(max_concurrent_tasks: usize, prefetch_count: u16) -> WorkerConfig {
    WorkerConfig {
        max_concurrent_tasks,
        prefetch_count,
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

fn start(
    consumer: TaskQueueConsumer,
) -> (
    broadcast::Sender<()>,
    tokio::task::JoinHandle<SentinelResult<()>>,
) {
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(async move { consumer.run(shutdown_rx).await });
    (shutdown_tx, handle)
}

#[tokio::test]
async fn test_task_from_queue_is_completed_and_acked_once() {
    let db = DatabaseManager::in_memory().await.unwrap();
    sqlx::query(
        "INSERT INTO tasks (id, target, status, result, created_at, updated_at) \
         VALUES (42, '10.0.0.5', 'Pending', NULL, $1, $1)",
    )
    .bind(Utc::now())
    .execute(db.pool())
    .await
    .unwrap();

    let queue = InMemoryTaskQueue::new();
    queue.publish_raw("42");

    let executor = RecordingExecutor::new(Duration::ZERO);
    let consumer = TaskQueueConsumer::new(
        Arc::new(queue.clone()),
        db.task_repository(),
        executor.clone(),
        worker_config(5, 10),
    );
    let (shutdown_tx, handle) = start(consumer);

    wait_until(|| queue.acked().len() == 1).await;
    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();

    let task = db.task_repository().get_by_id(42).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(!task.result.unwrap_or_default().is_empty());
    assert_eq!(queue.acked(), vec!["42".to_string()]);
    assert!(queue.dead_lettered().is_empty());
    assert_eq!(executor.calls(), 1);
}

#[tokio::test]
async fn test_concurrency_never_exceeds_limit() {
    let db = DatabaseManager::in_memory().await.unwrap();
    let tasks = db.task_repository();
    let queue = InMemoryTaskQueue::new();
    for i in 0..6 {
        let task = tasks.create(&format!("10.0.0.{i}")).await.unwrap();
        queue.publish_task(task.id).await.unwrap();
    }

    let executor = RecordingExecutor::new(Duration::from_millis(50));
    let consumer = TaskQueueConsumer::new(
        Arc::new(queue.clone()),
        tasks.clone(),
        executor.clone(),
        worker_config(2, 4),
    );
    let (shutdown_tx, handle) = start(consumer);

    wait_until(|| queue.acked().len() == 6).await;
    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(executor.calls(), 6);
    assert_eq!(executor.peak(), 2);
    for id in 1..=6 {
        let task = tasks.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
    }
}

#[tokio::test]
async fn test_invalid_body_is_dropped_without_requeue() {
    let db = DatabaseManager::in_memory().await.unwrap();
    let queue = InMemoryTaskQueue::new();
    queue.publish_raw("abc");

    let executor = RecordingExecutor::new(Duration::ZERO);
    let consumer = TaskQueueConsumer::new(
        Arc::new(queue.clone()),
        db.task_repository(),
        executor.clone(),
        worker_config(1, 1),
    );
    let (shutdown_tx, handle) = start(consumer);

    wait_until(|| queue.dead_lettered().len() == 1).await;
    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(queue.dead_lettered(), vec!["abc".to_string()]);
    assert_eq!(queue.ready_len(), 0);
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn test_unknown_task_is_dropped_without_requeue() {
    let db = DatabaseManager::in_memory().await.unwrap();
    let queue = InMemoryTaskQueue::new();
    queue.publish_task(999).await.unwrap();

    let executor = RecordingExecutor::new(Duration::ZERO);
    let consumer = TaskQueueConsumer::new(
        Arc::new(queue.clone()),
        db.task_repository(),
        executor.clone(),
        worker_config(1, 1),
    );
    let (shutdown_tx, handle) = start(consumer);

    wait_until(|| queue.dead_lettered().len() == 1).await;
    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(queue.ready_len(), 0);
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn test_executor_error_marks_task_failed() {
    let db = DatabaseManager::in_memory().await.unwrap();
    let tasks = db.task_repository();
    let task = tasks.create("10.0.0.9").await.unwrap();
    let queue = InMemoryTaskQueue::new();
    queue.publish_task(task.id).await.unwrap();

    let consumer = TaskQueueConsumer::new(
        Arc::new(queue.clone()),
        tasks.clone(),
        Arc::new(BrokenExecutor),
        worker_config(1, 1),
    );
    let (shutdown_tx, handle) = start(consumer);

    wait_until(|| queue.acked().len() == 1).await;
    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();

    let stored = tasks.get_by_id(task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert!(stored.result.unwrap().contains("scanner crashed"));
}

#[tokio::test]
async fn test_crash_before_persist_redelivers_task() {
    let db = DatabaseManager::in_memory().await.unwrap();
    let tasks = db.task_repository();
    let task = tasks.create("10.0.0.5").await.unwrap();
    let queue = InMemoryTaskQueue::new();
    queue.publish_task(task.id).await.unwrap();

    let executor = RecordingExecutor::new(Duration::ZERO);
    let stalling = Arc::new(StallingRepository {
        inner: tasks.clone(),
    });
    let consumer = TaskQueueConsumer::new(
        Arc::new(queue.clone()),
        stalling,
        executor.clone(),
        worker_config(1, 1),
    );
    let (_first_tx, first) = start(consumer);

    wait_until(|| executor.calls() == 1).await;
    first.abort();
    let _ = first.await;

    wait_until(|| queue.ready_len() == 1).await;
    assert!(queue.acked().is_empty());
    let stored = tasks.get_by_id(task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Running);

    let consumer = TaskQueueConsumer::new(
        Arc::new(queue.clone()),
        tasks.clone(),
        executor.clone(),
        worker_config(1, 1),
    );
    let (shutdown_tx, second) = start(consumer);

    wait_until(|| queue.acked().len() == 1).await;
    shutdown_tx.send(()).unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(executor.calls(), 2);
    let stored = tasks.get_by_id(task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_shutdown_drains_in_flight_tasks() {
    let db = DatabaseManager::in_memory().await.unwrap();
    let tasks = db.task_repository();
    let queue = InMemoryTaskQueue::new();
    for target in ["10.0.0.1", "10.0.0.2"] {
        let task = tasks.create(target).await.unwrap();
        queue.publish_task(task.id).await.unwrap();
    }

    let executor = RecordingExecutor::new(Duration::from_millis(300));
    let consumer = TaskQueueConsumer::new(
        Arc::new(queue.clone()),
        tasks.clone(),
        executor.clone(),
        worker_config(2, 2),
    );
    let (shutdown_tx, handle) = start(consumer);

    wait_until(|| executor.calls() == 2).await;
    shutdown_tx.send(()).unwrap();
    let late = tasks.create("10.0.0.3").await.unwrap();
    queue.publish_task(late.id).await.unwrap();

    handle.await.unwrap().unwrap();

    assert_eq!(queue.acked().len(), 2);
    assert_eq!(queue.ready_len(), 1);
    assert_eq!(executor.calls(), 2);
    for id in [1, 2] {
        let task = tasks.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
    }
    let late = tasks.get_by_id(late.id).await.unwrap().unwrap();
    assert_eq!(late.status, TaskStatus::Pending);
}

#[tokio::test]
async fn test_closed_queue_ends_consumer() {
    let db = DatabaseManager::in_memory().await.unwrap();
    let queue = InMemoryTaskQueue::new();

    let consumer = TaskQueueConsumer::new(
        Arc::new(queue.clone()),
        db.task_repository(),
        RecordingExecutor::new(Duration::ZERO),
        worker_config(1, 1),
    );
    let (_shutdown_tx, handle) = start(consumer);

    tokio::time::sleep(Duration::from_millis(20)).await;
    queue.close().await.unwrap();

    let finished = tokio::time::timeout(Duration::from_secs(5), handle).await;
    assert!(finished.unwrap().unwrap().is_ok());
}
