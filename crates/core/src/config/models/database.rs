use serde::{Deserialize, Serialize};

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Startup connection attempts before the process gives up.
    pub connect_attempts: u32,
    pub connect_retry_delay_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://sentinel.db?mode=rwc".to_string(),
            max_connections: 10,
            connect_attempts: 10,
            connect_retry_delay_seconds: 2,
        }
    }
}

impl DatabaseConfig {
    /// Validate database configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.url.is_empty() {
            return Err(anyhow::anyhow!("数据库URL不能为空"));
        }

        if !self.url.starts_with("sqlite:") {
            return Err(anyhow::anyhow!("数据库URL必须是SQLite格式"));
        }

        if self.max_connections == 0 {
            return Err(anyhow::anyhow!("最大连接数必须大于0"));
        }

        if self.connect_attempts == 0 {
            return Err(anyhow::anyhow!("数据库连接尝试次数必须大于0"));
        }

        Ok(())
    }
}
