use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use coordinator_core::HardwareInfo;
use serde::Deserialize;

use crate::{
    error::{ApiError, ApiResult},
    response::success,
    routes::AppState,
};

/// 心跳请求，旧版客户端使用 `machineId` 字段
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRequest {
    #[serde(default, alias = "machineId")]
    pub network_id: String,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(flatten)]
    pub hardware: HardwareInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatQuery {
    #[serde(default, alias = "machineId")]
    pub network_id: String,
}

pub async fn post_heartbeat(
    State(state): State<AppState>,
    Json(request): Json<HeartbeatRequest>,
) -> ApiResult<impl IntoResponse> {
    let hardware = (!request.hardware.is_empty()).then_some(&request.hardware);
    let summary = state
        .controller
        .heartbeat(&request.network_id, request.hostname.as_deref(), hardware)
        .await?;

    Ok(success(summary))
}

pub async fn lookup_heartbeat(
    State(state): State<AppState>,
    Query(params): Query<HeartbeatQuery>,
) -> ApiResult<impl IntoResponse> {
    let lookup = state
        .controller
        .lookup_heartbeat(&params.network_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("网络标识 {} 没有活动会话", params.network_id))
        })?;

    Ok(success(lookup))
}
