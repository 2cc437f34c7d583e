use std::sync::Arc;

use anyhow::{Context, Result};
use coordinator_api::create_app;
use coordinator_core::{AppConfig, SystemClock};
use coordinator_dispatcher::CoordinatorController;
use coordinator_infrastructure::DatabaseManager;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{error, info};

/// 主应用程序
pub struct Application {
    config: AppConfig,
    database: DatabaseManager,
    controller: Arc<CoordinatorController>,
    metrics: Option<PrometheusHandle>,
}

impl Application {
    /// 连接数据库、执行迁移、安装指标记录器并组装协调引擎
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("连接数据库: {}", config.database.url);
        let database = DatabaseManager::new(&config.database)
            .await
            .context("创建数据库连接池失败")?;
        database.migrate().await.context("执行数据库迁移失败")?;

        let metrics = if config.observability.metrics_enabled {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .context("安装Prometheus指标记录器失败")?;
            Some(handle)
        } else {
            None
        };

        let controller = Arc::new(CoordinatorController::new(
            database.store(),
            Arc::new(SystemClock),
            Some(config.liveness.clone()),
            Some(config.reconciliation.clone()),
        ));

        Ok(Self {
            config,
            database,
            controller,
            metrics,
        })
    }

    /// 运行API服务器直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        if !self.config.api.enabled {
            info!("API服务器已在配置中禁用，等待关闭信号");
            let _ = shutdown_rx.recv().await;
            self.database.close().await;
            return Ok(());
        }

        let app = create_app(
            self.controller.clone(),
            self.metrics.clone(),
            &self.config.api,
            &self.config.observability.metrics_endpoint,
        );

        let listener = TcpListener::bind(&self.config.api.bind_address)
            .await
            .with_context(|| format!("绑定地址失败: {}", self.config.api.bind_address))?;

        info!("API服务器启动在 http://{}", self.config.api.bind_address);

        let server = axum::serve(listener, app.into_make_service()).with_graceful_shutdown(
            async move {
                let _ = shutdown_rx.recv().await;
                info!("API服务器收到关闭信号");
            },
        );

        if let Err(e) = server.await {
            error!("API服务器运行失败: {}", e);
        }

        self.database.close().await;
        info!("API服务器已停止");
        Ok(())
    }
}
