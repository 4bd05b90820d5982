use axum::{
    routing::{get, post},
    Router,
};
use sentinel_dispatcher::{CoordinationService, TaskSubmission};

use crate::handlers::{
    agents::{list_agents, register_agent},
    health::health_check,
    heartbeat::heartbeat_stream,
    jobs::{dispatch_job, report_job},
    tasks::{get_task, submit_task},
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub coordination: CoordinationService,
    pub submission: TaskSubmission,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Agent协调接口
        .route("/api/agents", get(list_agents))
        .route("/api/agents/register", post(register_agent))
        .route("/api/agents/heartbeat", get(heartbeat_stream))
        .route("/api/jobs", post(dispatch_job))
        .route("/api/jobs/report", post(report_job))
        // 扫描任务接口
        .route("/api/tasks", post(submit_task))
        .route("/api/tasks/{id}", get(get_task))
        .with_state(state)
}
