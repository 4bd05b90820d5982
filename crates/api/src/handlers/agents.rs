use axum::{extract::State, Json};
use sentinel_core::models::{RegisterRequest, RegisterResponse};

use crate::{
    error::{ApiError, ApiResult},
    response::success,
    routes::AppState,
};

/// 注册Agent
pub async fn register_agent(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<Json<RegisterResponse>> {
    if request.hostname.trim().is_empty() {
        return Err(ApiError::BadRequest("hostname不能为空".to_string()));
    }

    let agent_id = state
        .coordination
        .register(&request.hostname, &request.address)
        .await?;

    Ok(Json(RegisterResponse {
        agent_id,
        success: true,
    }))
}

/// 获取Agent列表
pub async fn list_agents(
    State(state): State<AppState>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let agents = state.coordination.directory.list().await?;
    Ok(success(agents))
}
