use std::sync::Arc;

use chrono::Utc;
use sentinel_core::{
    models::{Agent, AgentStatus},
    traits::AgentRepository,
    SentinelResult,
};
use tracing::{debug, info};

/// Durable store of known agents.
#[derive(Clone)]
pub struct AgentDirectory {
    repo: Arc<dyn AgentRepository>,
}

impl AgentDirectory {
    pub fn new(repo: Arc<dyn AgentRepository>) -> Self {
        Self { repo }
    }

    /// Idempotent: the id is derived from the hostname, so repeat calls update the same row.
    pub async fn register(&self, hostname: &str, address: &str) -> SentinelResult<String> {
        let agent = self.repo.upsert(&Agent::new(hostname, address)).await?;
        info!(
            agent_id = %agent.agent_id,
            hostname = %agent.hostname,
            address = %agent.address,
            "Agent registered"
        );
        Ok(agent.agent_id)
    }

    /// Refresh liveness. Returns `false` for an agent the directory has never seen.
    pub async fn record_heartbeat(&self, agent_id: &str) -> SentinelResult<bool> {
        self.repo.touch(agent_id, Utc::now()).await
    }

    pub async fn mark_offline(&self, agent_id: &str) -> SentinelResult<()> {
        self.repo
            .update_status(agent_id, AgentStatus::Offline)
            .await?;
        debug!(agent_id = %agent_id, "Agent marked offline");
        Ok(())
    }

    pub async fn get(&self, agent_id: &str) -> SentinelResult<Option<Agent>> {
        self.repo.get_by_id(agent_id).await
    }

    pub async fn list(&self) -> SentinelResult<Vec<Agent>> {
        self.repo.list().await
    }
}
