use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::{error::ApiResult, response::success, routes::AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    #[serde(default, alias = "machineId")]
    pub network_id: String,
}

pub async fn claim_assignment(
    State(state): State<AppState>,
    Path(assignment_id): Path<String>,
    Json(request): Json<ClaimRequest>,
) -> ApiResult<impl IntoResponse> {
    let assignment = state
        .controller
        .claim(&assignment_id, &request.network_id)
        .await?;

    Ok(success(assignment))
}
