use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use coordinator_core::NewSuperStudy;
use serde::Deserialize;

use crate::{
    error::ApiResult,
    response::{created, success, ApiResponse},
    routes::AppState,
};

#[derive(Debug, Deserialize)]
pub struct SuperStudyQueryParams {
    pub name: Option<String>,
}

pub async fn list_super_studies(
    State(state): State<AppState>,
    Query(params): Query<SuperStudyQueryParams>,
) -> ApiResult<impl IntoResponse> {
    let studies = state
        .controller
        .list_super_studies(params.name.as_deref())
        .await?;
    Ok(success(studies))
}

pub async fn create_super_study(
    State(state): State<AppState>,
    Json(request): Json<NewSuperStudy>,
) -> ApiResult<impl IntoResponse> {
    let study = state.controller.create_super_study(request).await?;
    Ok(created(study))
}

/// 批次详情，附带对账后的作业列表
pub async fn get_super_study(
    State(state): State<AppState>,
    Path(super_study_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let view = state.controller.assignment_status(&super_study_id).await?;
    Ok(success(view))
}

pub async fn get_super_study_assignments(
    State(state): State<AppState>,
    Path(super_study_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let view = state.controller.assignment_status(&super_study_id).await?;
    Ok(success(serde_json::json!({
        "assignments": view.assignments,
        "counts": view.counts,
    })))
}

pub async fn delete_super_study(
    State(state): State<AppState>,
    Path(super_study_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.controller.delete_super_study(&super_study_id).await?;
    Ok(ApiResponse::success_empty_with_message(format!(
        "研究批次 {super_study_id} 已删除"
    )))
}
