use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use sentinel_core::models::{
    DispatchJobRequest, DispatchJobResponse, ReportJobRequest, ReportJobResponse,
};

use crate::{
    error::{ApiError, ApiResult},
    response::created,
    routes::AppState,
};

/// 向Agent信箱投递作业
pub async fn dispatch_job(
    State(state): State<AppState>,
    Json(request): Json<DispatchJobRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.target_agent.trim().is_empty() {
        return Err(ApiError::BadRequest("target_agent不能为空".to_string()));
    }
    if request.cmd.trim().is_empty() {
        return Err(ApiError::BadRequest("cmd不能为空".to_string()));
    }

    let job = state
        .coordination
        .dispatch(&request.target_agent, request.kind, &request.cmd);

    Ok(created(DispatchJobResponse { job_id: job.job_id }))
}

/// 接收Agent的作业结果回报
///
/// A persistence failure answers 500 with `received: false`; the agent only logs it.
pub async fn report_job(
    State(state): State<AppState>,
    Json(request): Json<ReportJobRequest>,
) -> impl IntoResponse {
    match state
        .coordination
        .reports
        .record(
            &request.job_id,
            &request.agent_id,
            request.status,
            &request.result,
        )
        .await
    {
        Ok(_) => (StatusCode::OK, Json(ReportJobResponse { received: true })),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ReportJobResponse { received: false }),
        ),
    }
}
