use std::sync::Arc;

use anyhow::{Context, Result};
use sentinel_api::{create_app, serve};
use sentinel_core::{traits::TaskQueue, AppConfig};
use sentinel_dispatcher::{
    AgentDirectory, CoordinationService, JobMailbox, JobReportSink, TaskSubmission,
};
use sentinel_infrastructure::{DatabaseManager, RabbitMQTaskQueue};
use sentinel_worker::{TaskQueueConsumer, TcpProbeExecutor, WorkerLifecycle};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{info, warn};

/// 应用运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// 协调服务：Agent注册、心跳、作业回报与管理接口
    Coordinator,
    /// 远程Agent
    Agent,
    /// 扫描任务消费者
    Worker,
}

impl AppMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppMode::Coordinator => "coordinator",
            AppMode::Agent => "agent",
            AppMode::Worker => "worker",
        }
    }
}

impl std::str::FromStr for AppMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "coordinator" => Ok(AppMode::Coordinator),
            "agent" => Ok(AppMode::Agent),
            "worker" => Ok(AppMode::Worker),
            _ => Err(anyhow::anyhow!("不支持的运行模式: {s}")),
        }
    }
}

/// 主应用程序
pub struct Application {
    config: AppConfig,
    mode: AppMode,
}

impl Application {
    pub fn new(config: AppConfig, mode: AppMode) -> Self {
        Self { config, mode }
    }

    pub fn mode(&self) -> AppMode {
        self.mode
    }

    /// Run the selected component until `shutdown_rx` fires.
    pub async fn run(self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!(mode = self.mode.as_str(), "启动应用程序");

        match self.mode {
            AppMode::Coordinator => self.run_coordinator(shutdown_rx).await,
            AppMode::Agent => self.run_agent(shutdown_rx).await,
            AppMode::Worker => self.run_scan_worker(shutdown_rx).await,
        }
    }

    async fn run_coordinator(self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let db = DatabaseManager::new(&self.config.database)
            .await
            .context("连接数据库失败")?;
        let queue: Arc<dyn TaskQueue> = Arc::new(
            RabbitMQTaskQueue::new(self.config.message_queue.clone())
                .await
                .context("连接消息队列失败")?,
        );

        let coordination = CoordinationService::new(
            AgentDirectory::new(db.agent_repository()),
            JobMailbox::new(),
            JobReportSink::new(db.job_record_repository()),
        );
        let submission = TaskSubmission::new(db.task_repository(), queue.clone());
        let app = create_app(coordination, submission);

        let listener = TcpListener::bind(self.config.coordinator.bind_address.as_str())
            .await
            .with_context(|| format!("绑定监听地址失败: {}", self.config.coordinator.bind_address))?;

        serve(listener, app, async move {
            let _ = shutdown_rx.recv().await;
            info!("协调服务停止接受新连接");
        })
        .await
        .context("协调服务运行失败")?;

        if let Err(e) = queue.close().await {
            warn!(error = %e, "关闭消息队列连接失败");
        }
        db.close().await;
        info!("协调服务已停止");
        Ok(())
    }

    async fn run_agent(self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let mut lifecycle =
            WorkerLifecycle::from_config(self.config.agent.clone()).context("创建Agent失败")?;
        lifecycle.run(shutdown_rx).await;
        Ok(())
    }

    async fn run_scan_worker(self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let db = DatabaseManager::new(&self.config.database)
            .await
            .context("连接数据库失败")?;
        let queue: Arc<dyn TaskQueue> = Arc::new(
            RabbitMQTaskQueue::new(self.config.message_queue.clone())
                .await
                .context("连接消息队列失败")?,
        );

        let consumer = TaskQueueConsumer::new(
            queue.clone(),
            db.task_repository(),
            Arc::new(TcpProbeExecutor::new()),
            self.config.worker.clone(),
        );
        consumer.run(shutdown_rx).await.context("扫描任务消费失败")?;

        if let Err(e) = queue.close().await {
            warn!(error = %e, "关闭消息队列连接失败");
        }
        db.close().await;
        info!("扫描Worker已停止");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!("coordinator".parse::<AppMode>().unwrap(), AppMode::Coordinator);
        assert_eq!("agent".parse::<AppMode>().unwrap(), AppMode::Agent);
        assert_eq!("worker".parse::<AppMode>().unwrap(), AppMode::Worker);
        assert!("dispatcher".parse::<AppMode>().is_err());
    }
}
