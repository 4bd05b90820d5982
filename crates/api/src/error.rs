use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sentinel_core::SentinelError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("系统错误: {0}")]
    Sentinel(#[from] SentinelError),

    #[error("未找到资源")]
    NotFound,

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("内部服务器错误: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, error_type) = match &self {
            ApiError::Sentinel(SentinelError::TaskNotFound { id }) => (
                StatusCode::NOT_FOUND,
                format!("任务 ID {id} 不存在"),
                "TASK_NOT_FOUND",
            ),
            ApiError::Sentinel(SentinelError::AgentNotFound { id }) => (
                StatusCode::NOT_FOUND,
                format!("Agent {id} 不存在"),
                "AGENT_NOT_FOUND",
            ),
            ApiError::Sentinel(SentinelError::InvalidTaskId(raw)) => (
                StatusCode::BAD_REQUEST,
                format!("无效的任务标识: {raw}"),
                "INVALID_TASK_ID",
            ),
            ApiError::Sentinel(SentinelError::MessageQueue(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "任务队列暂不可用".to_string(),
                "QUEUE_UNAVAILABLE",
            ),
            ApiError::Sentinel(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "系统内部错误".to_string(),
                "INTERNAL_ERROR",
            ),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                "请求的资源不存在".to_string(),
                "NOT_FOUND",
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                format!("请求参数错误: {msg}"),
                "BAD_REQUEST",
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("系统内部错误: {msg}"),
                "INTERNAL_ERROR",
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "message": error_message,
                "type": error_type,
                "code": status.as_u16(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::Sentinel(SentinelError::TaskNotFound { id: 1 }),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::Sentinel(SentinelError::MessageQueue("down".to_string())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApiError::BadRequest("cmd".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Sentinel(SentinelError::Internal("x".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
