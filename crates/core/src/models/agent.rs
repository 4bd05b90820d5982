use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Agent状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Online,
    Offline,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Online => "online",
            AgentStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(AgentStatus::Online),
            "offline" => Ok(AgentStatus::Offline),
            _ => Err(format!("Invalid agent status: {s}")),
        }
    }
}

/// Agent节点信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: String,
    pub hostname: String,
    pub address: String,
    pub status: AgentStatus,
    pub last_seen: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
}

impl Agent {
    /// Deterministic id for a hostname, so re-registration lands on the same row.
    pub fn derive_id(hostname: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_DNS, hostname.as_bytes()).to_string()
    }

    pub fn new(hostname: impl Into<String>, address: impl Into<String>) -> Self {
        let hostname = hostname.into();
        let now = Utc::now();
        Self {
            agent_id: Self::derive_id(&hostname),
            hostname,
            address: address.into(),
            status: AgentStatus::Online,
            last_seen: now,
            registered_at: now,
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == AgentStatus::Online
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_id_is_stable() {
        assert_eq!(Agent::derive_id("hostA"), Agent::derive_id("hostA"));
        assert_ne!(Agent::derive_id("hostA"), Agent::derive_id("hostB"));
    }

    #[test]
    fn test_new_agent_is_online() {
        let agent = Agent::new("hostA", "1.2.3.4");
        assert!(agent.is_online());
        assert_eq!(agent.agent_id, Agent::derive_id("hostA"));
    }

    #[test]
    fn test_status_text_roundtrip() {
        for status in [AgentStatus::Online, AgentStatus::Offline] {
            assert_eq!(status.as_str().parse::<AgentStatus>().unwrap(), status);
        }
        assert!("ALIVE".parse::<AgentStatus>().is_err());
    }
}
