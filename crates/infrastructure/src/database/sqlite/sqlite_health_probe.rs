use async_trait::async_trait;
use coordinator_core::{CoordinatorError, CoordinatorResult, HealthProbe};
use sqlx::SqlitePool;

pub struct SqliteHealthProbe {
    pool: SqlitePool,
}

impl SqliteHealthProbe {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HealthProbe for SqliteHealthProbe {
    async fn ping(&self) -> CoordinatorResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(CoordinatorError::Database)?;
        Ok(())
    }
}
