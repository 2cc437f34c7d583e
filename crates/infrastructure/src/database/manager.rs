use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use coordinator_core::{config::DatabaseConfig, CoordinatorStore};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use super::sqlite::{
    SqliteAssignmentRepository, SqliteHealthProbe, SqliteLiveStateRepository,
    SqliteProgressEventRepository, SqliteSuperStudyRepository, SqliteWorkerRepository,
};

/// SQLite 连接池与仓储工厂
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .with_context(|| format!("无效的数据库URL: {}", config.url))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .max_lifetime(Duration::from_secs(1800)) // 30分钟默认生命周期
            .connect_with(options)
            .await
            .with_context(|| format!("连接数据库失败: {}", config.url))?;

        info!("数据库连接池已建立: {}", config.url);
        Ok(Self { pool })
    }

    /// 使用已有连接池，测试中配合内存数据库使用
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .context("执行数据库迁移失败")?;
        info!("数据库迁移完成");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// 组装引擎使用的存储句柄
    pub fn store(&self) -> CoordinatorStore {
        CoordinatorStore {
            workers: Arc::new(SqliteWorkerRepository::new(self.pool.clone())),
            assignments: Arc::new(SqliteAssignmentRepository::new(self.pool.clone())),
            super_studies: Arc::new(SqliteSuperStudyRepository::new(self.pool.clone())),
            live_states: Arc::new(SqliteLiveStateRepository::new(self.pool.clone())),
            events: Arc::new(SqliteProgressEventRepository::new(self.pool.clone())),
            health: Arc::new(SqliteHealthProbe::new(self.pool.clone())),
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
