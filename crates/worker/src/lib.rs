//! Execution side of the fleet: the agent loop that runs jobs delivered over
//! the heartbeat stream, and the scan worker that drains the task queue.

pub mod components;
pub mod consumer;
pub mod executors;

pub use components::{
    AgentState, CoordinatorTransport, HeartbeatChannel, HttpCoordinatorClient,
    TaskExecutionManager, WorkerLifecycle,
};
pub use consumer::{DeliveryOutcome, TaskQueueConsumer};
pub use executors::{ShellExecutor, TcpProbeExecutor, DEFAULT_PROBE_PORTS};
