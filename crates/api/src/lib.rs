//! # Coordinator API
//!
//! 协调引擎的HTTP传输层，基于Axum构建。
//!
//! ## API 端点
//!
//! ### Worker上报
//! - `POST /api/heartbeat` - 心跳
//! - `GET /api/heartbeat?networkId=` - 查询网络标识对应的活动会话
//! - `POST /api/assignments/{id}/claim` - 领取作业
//! - `POST /api/progress` - 进度上报
//!
//! ### 状态查询与管理
//! - `GET /api/workers` - 会话列表
//! - `GET /api/workers/{id}` - 会话详情
//! - `DELETE /api/workers/{id}` - 删除会话并释放其作业
//! - `GET /api/super-studies` - 研究批次列表
//! - `POST /api/super-studies` - 创建研究批次
//! - `GET /api/super-studies/{id}` - 批次详情
//! - `DELETE /api/super-studies/{id}` - 删除批次
//! - `GET /api/super-studies/{id}/assignments` - 对账后的作业状态
//!
//! ### 运维
//! - `GET /health` - 健康检查
//! - `GET /metrics` - Prometheus指标
//!
//! 成功响应统一为 `{success, data, message, timestamp}`，错误响应见 [`error::ApiError`]。

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use coordinator_core::config::ApiConfig;
use coordinator_dispatcher::CoordinatorController;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;

pub use error::{ApiError, ApiResult};
pub use response::ApiResponse;
pub use routes::AppState;

/// 创建API应用
///
/// `metrics` 为 `None` 时不挂载指标端点。
pub fn create_app(
    controller: Arc<CoordinatorController>,
    metrics: Option<PrometheusHandle>,
    api_config: &ApiConfig,
    metrics_endpoint: &str,
) -> Router {
    let state = AppState {
        controller,
        metrics,
    };

    let router = routes::create_routes(state, metrics_endpoint).layer(
        ServiceBuilder::new()
            .layer(middleware::trace_layer())
            .layer(middleware::timeout_layer(api_config))
            .layer(axum::middleware::from_fn(middleware::request_logging)),
    );

    if api_config.cors_enabled {
        router.layer(middleware::cors_layer(api_config))
    } else {
        router
    }
}
