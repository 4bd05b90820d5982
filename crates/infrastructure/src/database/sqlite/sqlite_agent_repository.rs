use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sentinel_core::{
    models::{Agent, AgentStatus},
    traits::AgentRepository,
    SentinelError, SentinelResult,
};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::parse_status;

pub struct SqliteAgentRepository {
    pool: SqlitePool,
}

impl SqliteAgentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_agent(row: &sqlx::sqlite::SqliteRow) -> SentinelResult<Agent> {
        let status: String = row.try_get("status")?;
        Ok(Agent {
            agent_id: row.try_get("agent_id")?,
            hostname: row.try_get("hostname")?,
            address: row.try_get("address")?,
            status: parse_status::<AgentStatus>(&status)?,
            last_seen: row.try_get("last_seen")?,
            registered_at: row.try_get("registered_at")?,
        })
    }
}

#[async_trait]
impl AgentRepository for SqliteAgentRepository {
    async fn upsert(&self, agent: &Agent) -> SentinelResult<Agent> {
        sqlx::query(
            r#"
            INSERT INTO agents (agent_id, hostname, address, status, last_seen, registered_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT(agent_id) DO UPDATE SET
                hostname = excluded.hostname,
                address = excluded.address,
                status = excluded.status,
                last_seen = excluded.last_seen
            "#,
        )
        .bind(&agent.agent_id)
        .bind(&agent.hostname)
        .bind(&agent.address)
        .bind(agent.status.as_str())
        .bind(agent.last_seen)
        .bind(agent.registered_at)
        .execute(&self.pool)
        .await
        .map_err(SentinelError::Database)?;

        debug!("注册Agent成功: {}", agent.agent_id);

        self.get_by_id(&agent.agent_id)
            .await?
            .ok_or_else(|| SentinelError::AgentNotFound {
                id: agent.agent_id.clone(),
            })
    }

    async fn get_by_id(&self, agent_id: &str) -> SentinelResult<Option<Agent>> {
        let row = sqlx::query(
            "SELECT agent_id, hostname, address, status, last_seen, registered_at FROM agents WHERE agent_id = $1",
        )
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(SentinelError::Database)?;

        row.as_ref().map(Self::row_to_agent).transpose()
    }

    async fn touch(&self, agent_id: &str, seen_at: DateTime<Utc>) -> SentinelResult<bool> {
        let result = sqlx::query(
            "UPDATE agents SET last_seen = $2, status = $3 WHERE agent_id = $1",
        )
        .bind(agent_id)
        .bind(seen_at)
        .bind(AgentStatus::Online.as_str())
        .execute(&self.pool)
        .await
        .map_err(SentinelError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_status(&self, agent_id: &str, status: AgentStatus) -> SentinelResult<()> {
        let result = sqlx::query("UPDATE agents SET status = $2 WHERE agent_id = $1")
            .bind(agent_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(SentinelError::Database)?;

        if result.rows_affected() == 0 {
            return Err(SentinelError::AgentNotFound {
                id: agent_id.to_string(),
            });
        }

        debug!("更新Agent状态成功: {} -> {}", agent_id, status);
        Ok(())
    }

    async fn list(&self) -> SentinelResult<Vec<Agent>> {
        let rows = sqlx::query(
            "SELECT agent_id, hostname, address, status, last_seen, registered_at FROM agents ORDER BY registered_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(SentinelError::Database)?;

        rows.iter().map(Self::row_to_agent).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseManager;

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let manager = DatabaseManager::in_memory().await.unwrap();
        let repo = SqliteAgentRepository::new(manager.pool().clone());

        let first = repo.upsert(&Agent::new("hostA", "1.2.3.4")).await.unwrap();
        let second = repo.upsert(&Agent::new("hostA", "1.2.3.4")).await.unwrap();

        assert_eq!(first.agent_id, second.agent_id);
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reregistration_updates_address_and_status() {
        let manager = DatabaseManager::in_memory().await.unwrap();
        let repo = SqliteAgentRepository::new(manager.pool().clone());

        let agent = repo.upsert(&Agent::new("hostA", "1.2.3.4")).await.unwrap();
        repo.update_status(&agent.agent_id, AgentStatus::Offline)
            .await
            .unwrap();

        let again = repo.upsert(&Agent::new("hostA", "5.6.7.8")).await.unwrap();
        assert_eq!(again.address, "5.6.7.8");
        assert_eq!(again.status, AgentStatus::Online);
        assert_eq!(again.registered_at, agent.registered_at);
    }

    #[tokio::test]
    async fn test_touch_unknown_agent() {
        let manager = DatabaseManager::in_memory().await.unwrap();
        let repo = SqliteAgentRepository::new(manager.pool().clone());

        assert!(!repo.touch("missing", Utc::now()).await.unwrap());
        assert!(matches!(
            repo.update_status("missing", AgentStatus::Offline).await,
            Err(SentinelError::AgentNotFound { .. })
        ));
    }
}
