use axum::{
    routing::{get, post},
    Router,
};
use coordinator_dispatcher::CoordinatorController;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::handlers::{
    assignments::claim_assignment,
    health::health_check,
    heartbeat::{lookup_heartbeat, post_heartbeat},
    metrics::render_metrics,
    progress::report_progress,
    super_studies::{
        create_super_study, delete_super_study, get_super_study, get_super_study_assignments,
        list_super_studies,
    },
    workers::{delete_worker, get_worker, list_workers},
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<CoordinatorController>,
    pub metrics: Option<PrometheusHandle>,
}

/// 创建API路由
pub fn create_routes(state: AppState, metrics_endpoint: &str) -> Router {
    let mut router = Router::new()
        // 健康检查
        .route("/health", get(health_check))
        // Worker上报
        .route("/api/heartbeat", get(lookup_heartbeat).post(post_heartbeat))
        .route("/api/assignments/{id}/claim", post(claim_assignment))
        .route("/api/progress", post(report_progress))
        // 会话管理
        .route("/api/workers", get(list_workers))
        .route("/api/workers/{id}", get(get_worker).delete(delete_worker))
        // 研究批次管理
        .route(
            "/api/super-studies",
            get(list_super_studies).post(create_super_study),
        )
        .route(
            "/api/super-studies/{id}",
            get(get_super_study).delete(delete_super_study),
        )
        .route(
            "/api/super-studies/{id}/assignments",
            get(get_super_study_assignments),
        );

    if state.metrics.is_some() {
        router = router.route(metrics_endpoint, get(render_metrics));
    }

    router.with_state(state)
}
