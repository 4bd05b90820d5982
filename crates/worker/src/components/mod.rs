pub mod coordinator_client;
pub mod heartbeat_manager;
pub mod task_execution;
pub mod worker_lifecycle;

pub use coordinator_client::{
    ConnectionGuard, CoordinatorTransport, HeartbeatChannel, HttpCoordinatorClient,
};
pub use heartbeat_manager::{HeartbeatManager, SessionEnd};
pub use task_execution::TaskExecutionManager;
pub use worker_lifecycle::{resolve_hostname, AgentState, WorkerLifecycle};
