//! 作业执行器接口定义
//!
//! 执行器是实际执行命令或探测的组件。协调平面与扫描队列都只依赖这个接口，
//! 具体实现位于 `sentinel-worker`。

use async_trait::async_trait;

use crate::errors::SentinelResult;

/// What an executor produced for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub result: String,
    pub success: bool,
}

impl ExecutionOutcome {
    pub fn success(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
            success: true,
        }
    }

    pub fn failure(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
            success: false,
        }
    }
}

#[async_trait]
pub trait JobExecutor: Send + Sync {
    fn name(&self) -> &str;

    /// Run against `target` with an executor-specific `payload`.
    ///
    /// `Err` means the executor itself could not run; callers record it as a failure.
    async fn execute(&self, target: &str, payload: &str) -> SentinelResult<ExecutionOutcome>;
}
