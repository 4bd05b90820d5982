use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    pub bind_address: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl CoordinatorConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(anyhow::anyhow!(
                "无效的监听地址: {}",
                self.bind_address
            ));
        }
        Ok(())
    }
}

/// Agent side timing and identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub server_url: String,
    /// Falls back to the OS hostname when unset.
    pub hostname: Option<String>,
    pub address: String,
    pub heartbeat_interval_seconds: u64,
    pub execution_timeout_seconds: u64,
    pub report_timeout_seconds: u64,
    pub register_retry_delay_seconds: u64,
    pub reconnect_delay_seconds: u64,
    pub connect_timeout_seconds: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:9090".to_string(),
            hostname: None,
            address: "Unknown".to_string(),
            heartbeat_interval_seconds: 5,
            execution_timeout_seconds: 10,
            report_timeout_seconds: 5,
            register_retry_delay_seconds: 2,
            reconnect_delay_seconds: 3,
            connect_timeout_seconds: 5,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            return Err(anyhow::anyhow!(
                "协调服务地址必须以http://或https://开头: {}",
                self.server_url
            ));
        }

        let timings = [
            ("heartbeat_interval_seconds", self.heartbeat_interval_seconds),
            ("execution_timeout_seconds", self.execution_timeout_seconds),
            ("report_timeout_seconds", self.report_timeout_seconds),
            ("register_retry_delay_seconds", self.register_retry_delay_seconds),
            ("reconnect_delay_seconds", self.reconnect_delay_seconds),
            ("connect_timeout_seconds", self.connect_timeout_seconds),
        ];
        for (name, value) in timings {
            if value == 0 {
                return Err(anyhow::anyhow!("{name} 必须大于0"));
            }
        }

        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_seconds)
    }

    pub fn report_timeout(&self) -> Duration {
        Duration::from_secs(self.report_timeout_seconds)
    }

    pub fn register_retry_delay(&self) -> Duration {
        Duration::from_secs(self.register_retry_delay_seconds)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

/// Scan worker concurrency ceiling and broker prefetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub max_concurrent_tasks: usize,
    pub prefetch_count: u16,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 5,
            prefetch_count: 10,
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_concurrent_tasks == 0 {
            return Err(anyhow::anyhow!("最大并发任务数必须大于0"));
        }

        if (self.prefetch_count as usize) < self.max_concurrent_tasks {
            return Err(anyhow::anyhow!(
                "预取数量({})不能小于最大并发任务数({})",
                self.prefetch_count,
                self.max_concurrent_tasks
            ));
        }

        Ok(())
    }
}
