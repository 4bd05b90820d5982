//! 数据仓储层接口定义
//!
//! - `AgentRepository` - Agent目录的注册与状态维护
//! - `JobRecordRepository` - 作业结果的追加式审计记录
//! - `TaskRepository` - 扫描任务的读取与状态流转
//!
//! 所有实现都必须可以被多个连接会话并发调用，同步由实现内部负责。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    errors::SentinelResult,
    models::{Agent, AgentStatus, JobRecord, ReportStatus, Task, TaskStatus},
};

#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// Insert the agent or refresh address/status/last_seen of the existing row.
    /// Returns the stored record.
    async fn upsert(&self, agent: &Agent) -> SentinelResult<Agent>;

    async fn get_by_id(&self, agent_id: &str) -> SentinelResult<Option<Agent>>;

    /// Refresh `last_seen`. Returns `false` when the agent is unknown.
    async fn touch(&self, agent_id: &str, seen_at: DateTime<Utc>) -> SentinelResult<bool>;

    async fn update_status(&self, agent_id: &str, status: AgentStatus) -> SentinelResult<()>;

    async fn list(&self) -> SentinelResult<Vec<Agent>>;
}

#[async_trait]
pub trait JobRecordRepository: Send + Sync {
    /// Always appends. Duplicate job ids produce additional rows.
    async fn append(
        &self,
        job_id: &str,
        agent_id: &str,
        status: ReportStatus,
        result: &str,
    ) -> SentinelResult<JobRecord>;

    async fn find_by_job_id(&self, job_id: &str) -> SentinelResult<Vec<JobRecord>>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Creates a task in `Pending`.
    async fn create(&self, target: &str) -> SentinelResult<Task>;

    async fn get_by_id(&self, id: i64) -> SentinelResult<Option<Task>>;

    async fn update_status(
        &self,
        id: i64,
        status: TaskStatus,
        result: Option<&str>,
    ) -> SentinelResult<()>;
}
