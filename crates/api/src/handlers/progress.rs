use axum::{extract::State, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use coordinator_core::ProgressReport;
use serde::Deserialize;

use crate::{
    error::{ApiError, ApiResult},
    response::ApiResponse,
    routes::AppState,
};

/// 进度上报请求
///
/// `message` 先按原始JSON接收，类型不合法时返回400而不是框架默认的422。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRequest {
    #[serde(default, alias = "machineId")]
    pub network_id: String,
    pub message: serde_json::Value,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

pub async fn report_progress(
    State(state): State<AppState>,
    Json(request): Json<ProgressRequest>,
) -> ApiResult<impl IntoResponse> {
    let report: ProgressReport = serde_json::from_value(request.message)
        .map_err(|e| ApiError::BadRequest(format!("无效的进度消息: {e}")))?;

    let outcome = state
        .controller
        .report_progress(&request.network_id, &report, request.timestamp)
        .await?;

    Ok(ApiResponse::success_with_message(
        outcome,
        "进度已记录".to_string(),
    ))
}
