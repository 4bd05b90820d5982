//! # Sentinel API
//!
//! 协调服务的HTTP接口，基于Axum构建：
//! - Agent注册、心跳流（WebSocket）、作业结果回报
//! - 管理接口：向Agent投递作业、查询Agent列表
//! - 扫描任务提交与查询
//! - 健康检查

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use std::future::Future;

use axum::Router;
use sentinel_dispatcher::{CoordinationService, TaskSubmission};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tracing::info;

pub use error::{ApiError, ApiResult};
pub use routes::{create_routes, AppState};

use middleware::{cors_layer, request_logging, trace_layer};

/// 创建完整的API应用（路由 + 中间件）
pub fn create_app(coordination: CoordinationService, submission: TaskSubmission) -> Router {
    let state = AppState {
        coordination,
        submission,
    };

    create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(cors_layer())
            .layer(axum::middleware::from_fn(request_logging)),
    )
}

/// Serve until `shutdown` resolves, then let in-flight requests finish.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("协调服务监听地址: {}", addr);
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
