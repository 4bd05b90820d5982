use axum::extract::{Path, State};
use axum::Json;
use sentinel_core::{models::SubmitTaskRequest, SentinelError};

use crate::{
    error::{ApiError, ApiResult},
    response::{created, success},
    routes::AppState,
};

/// 提交扫描任务
pub async fn submit_task(
    State(state): State<AppState>,
    Json(request): Json<SubmitTaskRequest>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let target = request.target.trim();
    if target.is_empty() {
        return Err(ApiError::BadRequest("target不能为空".to_string()));
    }

    let task = state.submission.submit(target).await?;
    Ok(created(task))
}

/// 获取单个扫描任务
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let task = state
        .submission
        .get(id)
        .await?
        .ok_or(ApiError::Sentinel(SentinelError::TaskNotFound { id }))?;
    Ok(success(task))
}
