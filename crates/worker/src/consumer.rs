//! Scan task consumer.
//!
//! Pulls task ids off the queue, runs at most `max_concurrent_tasks` of them at
//! once and acknowledges a delivery only after its final status is stored.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use sentinel_core::{
    config::WorkerConfig,
    models::{Task, TaskStatus},
    traits::{ExecutionOutcome, JobExecutor, TaskDelivery, TaskQueue, TaskRepository},
    SentinelError, SentinelResult,
};
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// How a single delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Completed,
    Failed,
    /// Invalid body or unknown task, dropped without requeue.
    Rejected,
    /// Handed back to the broker for another attempt.
    Requeued,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Completed => "completed",
            DeliveryOutcome::Failed => "failed",
            DeliveryOutcome::Rejected => "rejected",
            DeliveryOutcome::Requeued => "requeued",
        }
    }
}

pub struct TaskQueueConsumer {
    queue: Arc<dyn TaskQueue>,
    processor: DeliveryProcessor,
    config: WorkerConfig,
}

#[derive(Clone)]
struct DeliveryProcessor {
    tasks: Arc<dyn TaskRepository>,
    executor: Arc<dyn JobExecutor>,
}

impl TaskQueueConsumer {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        tasks: Arc<dyn TaskRepository>,
        executor: Arc<dyn JobExecutor>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            processor: DeliveryProcessor { tasks, executor },
            config,
        }
    }

    /// Consume until shutdown is signalled or the subscription ends, then wait
    /// for every in-flight task to finish.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> SentinelResult<()> {
        let mut stream = self.queue.subscribe(self.config.prefetch_count).await?;
        let slots = Arc::new(Semaphore::new(self.config.max_concurrent_tasks));
        let mut in_flight = JoinSet::new();

        info!(
            max_concurrent_tasks = self.config.max_concurrent_tasks,
            prefetch = self.config.prefetch_count,
            "Scan worker consuming"
        );

        loop {
            let permit = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Shutdown requested, no longer accepting deliveries");
                    break;
                }
                permit = slots.clone().acquire_owned() => permit.map_err(|e| {
                    SentinelError::Internal(format!("并发槽位信号量已关闭: {e}"))
                })?,
            };

            let delivery = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Shutdown requested, no longer accepting deliveries");
                    break;
                }
                next = stream.next_delivery() => match next {
                    Some(Ok(delivery)) => delivery,
                    Some(Err(e)) => {
                        error!(error = %e, "Delivery stream failed");
                        break;
                    }
                    None => {
                        warn!("Delivery stream closed by broker");
                        break;
                    }
                },
            };

            while let Some(finished) = in_flight.try_join_next() {
                Self::log_join(finished);
            }

            let processor = self.processor.clone();
            in_flight.spawn(async move {
                let _permit = permit;
                processor.process(delivery).await
            });
        }

        info!(in_flight = in_flight.len(), "Waiting for in-flight tasks");
        while let Some(finished) = in_flight.join_next().await {
            Self::log_join(finished);
        }
        info!("Scan worker drained");

        Ok(())
    }

    fn log_join(finished: Result<DeliveryOutcome, tokio::task::JoinError>) {
        match finished {
            Ok(outcome) => debug!(outcome = outcome.as_str(), "Delivery settled"),
            Err(e) => error!(error = %e, "Task processing aborted"),
        }
    }
}

impl DeliveryProcessor {
    async fn process(&self, delivery: Box<dyn TaskDelivery>) -> DeliveryOutcome {
        let handled = AssertUnwindSafe(self.handle(delivery.as_ref()))
            .catch_unwind()
            .await;
        let outcome = match handled {
            Ok(outcome) => outcome,
            Err(_) => {
                error!("Task processing panicked, handing message back to the broker");
                settle_reject(delivery.as_ref(), true).await
            }
        };
        metrics::counter!("sentinel_task_deliveries_total", "outcome" => outcome.as_str())
            .increment(1);
        outcome
    }

    async fn handle(&self, delivery: &dyn TaskDelivery) -> DeliveryOutcome {
        let task = match self.load_task(delivery.body()).await {
            Ok(task) => task,
            Err(e) if e.is_permanent() => {
                warn!(error = %e, "Dropping unusable task message");
                return settle_reject(delivery, false).await;
            }
            Err(e) => {
                error!(error = %e, "Failed to load task");
                return settle_reject(delivery, true).await;
            }
        };
        let task_id = task.id;

        if delivery.redelivered() {
            info!(task_id, "Processing redelivered task");
        }

        if let Err(e) = self
            .tasks
            .update_status(task_id, TaskStatus::Running, None)
            .await
        {
            error!(task_id, error = %e, "Failed to mark task running");
            return settle_reject(delivery, true).await;
        }

        info!(task_id, target = %task.target, executor = self.executor.name(), "Scanning target");
        let outcome = match self.executor.execute(&task.target, "").await {
            Ok(outcome) => outcome,
            Err(e) => ExecutionOutcome::failure(e.to_string()),
        };

        let status = TaskStatus::from_success(outcome.success);
        if let Err(e) = self
            .tasks
            .update_status(task_id, status, Some(&outcome.result))
            .await
        {
            error!(task_id, error = %e, "Failed to store task result, leaving message for redelivery");
            return settle_reject(delivery, true).await;
        }

        if let Err(e) = delivery.ack().await {
            error!(task_id, error = %e, "Failed to ack task message");
        }

        info!(task_id, status = status.as_str(), "Task finished");
        match status {
            TaskStatus::Completed => DeliveryOutcome::Completed,
            _ => DeliveryOutcome::Failed,
        }
    }

    async fn load_task(&self, body: &[u8]) -> SentinelResult<Task> {
        let task_id = parse_task_id(body)?;
        self.tasks
            .get_by_id(task_id)
            .await?
            .ok_or(SentinelError::TaskNotFound { id: task_id })
    }
}

fn parse_task_id(body: &[u8]) -> SentinelResult<i64> {
    std::str::from_utf8(body)
        .ok()
        .and_then(|text| text.trim().parse::<i64>().ok())
        .ok_or_else(|| SentinelError::InvalidTaskId(String::from_utf8_lossy(body).into_owned()))
}

async fn settle_reject(delivery: &dyn TaskDelivery, requeue: bool) -> DeliveryOutcome {
    if let Err(e) = delivery.reject(requeue).await {
        error!(requeue, error = %e, "Failed to reject task message");
    }
    if requeue {
        DeliveryOutcome::Requeued
    } else {
        DeliveryOutcome::Rejected
    }
}
