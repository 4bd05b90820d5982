use thiserror::Error;

/// 系统错误类型定义
#[derive(Debug, Error)]
pub enum SentinelError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),

    #[error("任务未找到: {id}")]
    TaskNotFound { id: i64 },

    #[error("Agent未找到: {id}")]
    AgentNotFound { id: String },

    #[error("无效的任务标识: {0}")]
    InvalidTaskId(String),

    #[error("消息队列错误: {0}")]
    MessageQueue(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("任务执行错误: {0}")]
    TaskExecution(String),

    #[error("网络错误: {0}")]
    Network(String),

    #[error("协议错误: {0}")]
    Protocol(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl SentinelError {
    /// Errors that will never succeed on redelivery of the same input.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            SentinelError::TaskNotFound { .. } | SentinelError::InvalidTaskId(_)
        )
    }
}

impl From<serde_json::Error> for SentinelError {
    fn from(e: serde_json::Error) -> Self {
        SentinelError::Serialization(e.to_string())
    }
}

/// 统一的Result类型
pub type SentinelResult<T> = std::result::Result<T, SentinelError>;
