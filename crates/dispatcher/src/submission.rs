use std::sync::Arc;

use sentinel_core::{
    models::Task,
    traits::{TaskQueue, TaskRepository},
    SentinelResult,
};
use tracing::{error, info};

/// Persists a scan task and publishes its id for the scan workers.
#[derive(Clone)]
pub struct TaskSubmission {
    tasks: Arc<dyn TaskRepository>,
    queue: Arc<dyn TaskQueue>,
}

impl TaskSubmission {
    pub fn new(tasks: Arc<dyn TaskRepository>, queue: Arc<dyn TaskQueue>) -> Self {
        Self { tasks, queue }
    }

    /// The row is written first; a failed publish leaves it `Pending` and is returned as an error.
    pub async fn submit(&self, target: &str) -> SentinelResult<Task> {
        let task = self.tasks.create(target).await?;

        if let Err(e) = self.queue.publish_task(task.id).await {
            error!(task_id = task.id, error = %e, "Failed to publish task");
            return Err(e);
        }

        info!(task_id = task.id, target = %task.target, "Task submitted");
        Ok(task)
    }

    pub async fn get(&self, id: i64) -> SentinelResult<Option<Task>> {
        self.tasks.get_by_id(id).await
    }
}
