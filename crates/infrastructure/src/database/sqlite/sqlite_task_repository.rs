use async_trait::async_trait;
use chrono::Utc;
use sentinel_core::{
    models::{Task, TaskStatus},
    traits::TaskRepository,
    SentinelError, SentinelResult,
};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::parse_status;

pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> SentinelResult<Task> {
        let status: String = row.try_get("status")?;
        Ok(Task {
            id: row.try_get("id")?,
            target: row.try_get("target")?,
            status: parse_status::<TaskStatus>(&status)?,
            result: row.try_get("result")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, target: &str) -> SentinelResult<Task> {
        let now = Utc::now();
        let inserted = sqlx::query(
            r#"
            INSERT INTO tasks (target, status, result, created_at, updated_at)
            VALUES ($1, $2, NULL, $3, $3)
            "#,
        )
        .bind(target)
        .bind(TaskStatus::Pending.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(SentinelError::Database)?;

        let id = inserted.last_insert_rowid();
        debug!("创建扫描任务成功: id={}, target={}", id, target);

        Ok(Task {
            id,
            target: target.to_string(),
            status: TaskStatus::Pending,
            result: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> SentinelResult<Option<Task>> {
        let row = sqlx::query(
            "SELECT id, target, status, result, created_at, updated_at FROM tasks WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(SentinelError::Database)?;

        row.as_ref().map(Self::row_to_task).transpose()
    }

    async fn update_status(
        &self,
        id: i64,
        status: TaskStatus,
        result: Option<&str>,
    ) -> SentinelResult<()> {
        let query_result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = $2, result = COALESCE($3, result), updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(result)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(SentinelError::Database)?;

        if query_result.rows_affected() == 0 {
            return Err(SentinelError::TaskNotFound { id });
        }

        debug!("更新任务状态成功: {} -> {}", id, status);
        Ok(())
    }
}
