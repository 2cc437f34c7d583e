use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::warn;

use crate::routes::AppState;

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (status, label) = match state.controller.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            warn!("存储健康检查失败: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    };

    (
        status,
        Json(json!({
            "status": label,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "service": "study-coordinator",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}
