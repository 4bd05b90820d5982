use std::sync::Arc;
use std::time::Duration;

use sentinel_core::{
    config::models::DatabaseConfig,
    traits::{AgentRepository, JobRecordRepository, TaskRepository},
    SentinelError, SentinelResult,
};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::info;

use super::sqlite::{SqliteAgentRepository, SqliteJobRecordRepository, SqliteTaskRepository};
use crate::bootstrap::connect_with_retry;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS agents (
        agent_id TEXT PRIMARY KEY,
        hostname TEXT NOT NULL,
        address TEXT NOT NULL,
        status TEXT NOT NULL,
        last_seen TEXT NOT NULL,
        registered_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS job_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        job_id TEXT NOT NULL,
        agent_id TEXT NOT NULL,
        status TEXT NOT NULL,
        result TEXT NOT NULL,
        executed_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_job_records_job_id ON job_records(job_id)",
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        target TEXT NOT NULL,
        status TEXT NOT NULL,
        result TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
];

/// Owns the SQLite pool and hands out repositories over it.
#[derive(Clone)]
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// Connect with the bounded startup retry from `config`, then create the schema.
    pub async fn new(config: &DatabaseConfig) -> SentinelResult<Self> {
        let pool = connect_with_retry(
            "数据库",
            config.connect_attempts,
            Duration::from_secs(config.connect_retry_delay_seconds),
            || async {
                SqlitePoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect(&config.url)
                    .await
                    .map_err(SentinelError::Database)
            },
        )
        .await?;

        let manager = Self { pool };
        manager.migrate().await?;
        info!("数据库连接就绪: {}", config.url);
        Ok(manager)
    }

    /// Private in-memory database. A single connection that never expires keeps it alive.
    pub async fn in_memory() -> SentinelResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(SentinelError::Database)?;

        let manager = Self { pool };
        manager.migrate().await?;
        Ok(manager)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> SentinelResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(SentinelError::Database)?;
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn agent_repository(&self) -> Arc<dyn AgentRepository> {
        Arc::new(SqliteAgentRepository::new(self.pool.clone()))
    }

    pub fn job_record_repository(&self) -> Arc<dyn JobRecordRepository> {
        Arc::new(SqliteJobRecordRepository::new(self.pool.clone()))
    }

    pub fn task_repository(&self) -> Arc<dyn TaskRepository> {
        Arc::new(SqliteTaskRepository::new(self.pool.clone()))
    }
}
