use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    error::ApiResult,
    response::{success, ApiResponse},
    routes::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerQueryParams {
    #[serde(default)]
    pub include_stale: bool,
}

/// 获取Worker会话列表，默认不含已失效会话
pub async fn list_workers(
    State(state): State<AppState>,
    Query(params): Query<WorkerQueryParams>,
) -> ApiResult<impl IntoResponse> {
    let workers = state.controller.list_workers(params.include_stale).await?;
    Ok(success(workers))
}

pub async fn get_worker(
    State(state): State<AppState>,
    Path(worker_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let view = state.controller.worker_status(&worker_id).await?;
    Ok(success(view))
}

/// 删除会话，其名下的待处理和运行中作业先被重置
pub async fn delete_worker(
    State(state): State<AppState>,
    Path(worker_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let deleted = state.controller.delete_worker(&worker_id).await?;
    let message = format!(
        "会话已删除，重置 {} 个作业",
        deleted.reset_assignments.len()
    );
    Ok(ApiResponse::success_with_message(deleted, message))
}
