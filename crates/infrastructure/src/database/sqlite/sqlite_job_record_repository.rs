use async_trait::async_trait;
use chrono::Utc;
use sentinel_core::{
    models::{JobRecord, ReportStatus},
    traits::JobRecordRepository,
    SentinelError, SentinelResult,
};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::parse_status;

pub struct SqliteJobRecordRepository {
    pool: SqlitePool,
}

impl SqliteJobRecordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> SentinelResult<JobRecord> {
        let status: String = row.try_get("status")?;
        Ok(JobRecord {
            id: row.try_get("id")?,
            job_id: row.try_get("job_id")?,
            agent_id: row.try_get("agent_id")?,
            status: parse_status::<ReportStatus>(&status)?,
            result: row.try_get("result")?,
            executed_at: row.try_get("executed_at")?,
        })
    }
}

#[async_trait]
impl JobRecordRepository for SqliteJobRecordRepository {
    async fn append(
        &self,
        job_id: &str,
        agent_id: &str,
        status: ReportStatus,
        result: &str,
    ) -> SentinelResult<JobRecord> {
        let executed_at = Utc::now();
        let inserted = sqlx::query(
            r#"
            INSERT INTO job_records (job_id, agent_id, status, result, executed_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(job_id)
        .bind(agent_id)
        .bind(status.as_str())
        .bind(result)
        .bind(executed_at)
        .execute(&self.pool)
        .await
        .map_err(SentinelError::Database)?;

        debug!("作业结果已记录: job_id={}, agent_id={}", job_id, agent_id);

        Ok(JobRecord {
            id: inserted.last_insert_rowid(),
            job_id: job_id.to_string(),
            agent_id: agent_id.to_string(),
            status,
            result: result.to_string(),
            executed_at,
        })
    }

    async fn find_by_job_id(&self, job_id: &str) -> SentinelResult<Vec<JobRecord>> {
        let rows = sqlx::query(
            "SELECT id, job_id, agent_id, status, result, executed_at FROM job_records WHERE job_id = $1 ORDER BY id",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(SentinelError::Database)?;

        rows.iter().map(Self::row_to_record).collect()
    }
}
