use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coordinator_core::{
    CoordinatorError, CoordinatorResult, HardwareInfo, WorkerRepository, WorkerSession,
};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

const WORKER_COLUMNS: &str = "id, network_id, hostname, gpu_name, cpu_cores, total_ram_gb, status, is_stale, provisional, last_seen, created_at";

pub struct SqliteWorkerRepository {
    pool: SqlitePool,
}

impl SqliteWorkerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> CoordinatorResult<WorkerSession> {
        Ok(WorkerSession {
            id: row.try_get("id")?,
            network_id: row.try_get("network_id")?,
            hostname: row.try_get("hostname")?,
            hardware: HardwareInfo {
                gpu_name: row.try_get("gpu_name")?,
                cpu_cores: row.try_get("cpu_cores")?,
                total_ram_gb: row.try_get("total_ram_gb")?,
            },
            status: row.try_get("status")?,
            is_stale: row.try_get("is_stale")?,
            provisional: row.try_get("provisional")?,
            last_seen: row.try_get("last_seen")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn rows_to_sessions(rows: &[sqlx::sqlite::SqliteRow]) -> CoordinatorResult<Vec<WorkerSession>> {
        rows.iter().map(Self::row_to_session).collect()
    }
}

#[async_trait]
impl WorkerRepository for SqliteWorkerRepository {
    #[instrument(skip(self, session), fields(session_id = %session.id, network_id = %session.network_id))]
    async fn create(&self, session: &WorkerSession) -> CoordinatorResult<WorkerSession> {
        sqlx::query(
            r#"
            INSERT INTO workers (id, network_id, hostname, gpu_name, cpu_cores, total_ram_gb, status, is_stale, provisional, last_seen, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&session.id)
        .bind(&session.network_id)
        .bind(&session.hostname)
        .bind(&session.hardware.gpu_name)
        .bind(session.hardware.cpu_cores)
        .bind(session.hardware.total_ram_gb)
        .bind(session.status)
        .bind(session.is_stale)
        .bind(session.provisional)
        .bind(session.last_seen)
        .bind(session.created_at)
        .execute(&self.pool)
        .await
        .map_err(CoordinatorError::Database)?;

        debug!("创建Worker会话成功: {} ({})", session.id, session.network_id);
        Ok(session.clone())
    }

    async fn get_by_id(&self, id: &str) -> CoordinatorResult<Option<WorkerSession>> {
        let row = sqlx::query(&format!("SELECT {WORKER_COLUMNS} FROM workers WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoordinatorError::Database)?;

        row.as_ref().map(Self::row_to_session).transpose()
    }

    #[instrument(skip(self, session), fields(session_id = %session.id))]
    async fn update(&self, session: &WorkerSession) -> CoordinatorResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE workers
            SET network_id = $2, hostname = $3, gpu_name = $4, cpu_cores = $5,
                total_ram_gb = $6, status = $7, is_stale = $8, provisional = $9, last_seen = $10
            WHERE id = $1
            "#,
        )
        .bind(&session.id)
        .bind(&session.network_id)
        .bind(&session.hostname)
        .bind(&session.hardware.gpu_name)
        .bind(session.hardware.cpu_cores)
        .bind(session.hardware.total_ram_gb)
        .bind(session.status)
        .bind(session.is_stale)
        .bind(session.provisional)
        .bind(session.last_seen)
        .execute(&self.pool)
        .await
        .map_err(CoordinatorError::Database)?;

        if result.rows_affected() == 0 {
            return Err(CoordinatorError::WorkerNotFound {
                id: session.id.clone(),
            });
        }
        Ok(())
    }

    #[instrument(skip(self), fields(session_id = %id))]
    async fn delete(&self, id: &str) -> CoordinatorResult<bool> {
        let result = sqlx::query("DELETE FROM workers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(CoordinatorError::Database)?;

        debug!("删除Worker会话: {} (rows: {})", id, result.rows_affected());
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, include_stale: bool) -> CoordinatorResult<Vec<WorkerSession>> {
        let rows = sqlx::query(&format!(
            "SELECT {WORKER_COLUMNS} FROM workers WHERE ($1 OR is_stale = 0) ORDER BY last_seen DESC"
        ))
        .bind(include_stale)
        .fetch_all(&self.pool)
        .await
        .map_err(CoordinatorError::Database)?;

        Self::rows_to_sessions(&rows)
    }

    async fn find_active_by_network_id(
        &self,
        network_id: &str,
    ) -> CoordinatorResult<Option<WorkerSession>> {
        let row = sqlx::query(&format!(
            "SELECT {WORKER_COLUMNS} FROM workers WHERE network_id = $1 AND is_stale = 0 ORDER BY last_seen DESC LIMIT 1"
        ))
        .bind(network_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoordinatorError::Database)?;

        row.as_ref().map(Self::row_to_session).transpose()
    }

    async fn find_unnamed_created_since(
        &self,
        since: DateTime<Utc>,
    ) -> CoordinatorResult<Vec<WorkerSession>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {WORKER_COLUMNS} FROM workers
            WHERE is_stale = 0 AND (hostname IS NULL OR hostname = '') AND created_at >= $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(CoordinatorError::Database)?;

        Self::rows_to_sessions(&rows)
    }

    async fn find_active_by_hostname_seen_since(
        &self,
        hostname: &str,
        since: DateTime<Utc>,
    ) -> CoordinatorResult<Option<WorkerSession>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {WORKER_COLUMNS} FROM workers
            WHERE hostname = $1 AND is_stale = 0 AND last_seen >= $2
            ORDER BY last_seen DESC LIMIT 1
            "#
        ))
        .bind(hostname)
        .bind(since)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoordinatorError::Database)?;

        row.as_ref().map(Self::row_to_session).transpose()
    }

    async fn find_stale_by_network_or_hostname(
        &self,
        network_id: &str,
        hostname: Option<&str>,
    ) -> CoordinatorResult<Vec<WorkerSession>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {WORKER_COLUMNS} FROM workers
            WHERE is_stale = 1 AND (network_id = $1 OR ($2 IS NOT NULL AND hostname = $2))
            ORDER BY last_seen DESC
            "#
        ))
        .bind(network_id)
        .bind(hostname)
        .fetch_all(&self.pool)
        .await
        .map_err(CoordinatorError::Database)?;

        Self::rows_to_sessions(&rows)
    }

    async fn mark_stale(&self, id: &str) -> CoordinatorResult<()> {
        sqlx::query("UPDATE workers SET is_stale = 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(CoordinatorError::Database)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn supersede(&self, network_id: &str, keep_id: &str) -> CoordinatorResult<Vec<String>> {
        let rows = sqlx::query(
            "UPDATE workers SET is_stale = 1 WHERE network_id = $1 AND id <> $2 AND is_stale = 0 RETURNING id",
        )
        .bind(network_id)
        .bind(keep_id)
        .fetch_all(&self.pool)
        .await
        .map_err(CoordinatorError::Database)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("id").map_err(CoordinatorError::Database))
            .collect()
    }
}
