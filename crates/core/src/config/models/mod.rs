pub mod app_config;
pub mod coordinator_agent;
pub mod database;
pub mod message_queue;
pub mod observability;

// Re-export main types for easier imports
pub use app_config::{AppConfig, DEFAULT_CONFIG_PATHS};
pub use coordinator_agent::{AgentConfig, CoordinatorConfig, WorkerConfig};
pub use database::DatabaseConfig;
pub use message_queue::MessageQueueConfig;
pub use observability::ObservabilityConfig;
