use async_trait::async_trait;
use coordinator_core::{CoordinatorError, CoordinatorResult, LiveState, LiveStateRepository};
use sqlx::{Row, SqlitePool};

use crate::database::mapping::MappingHelpers;

pub struct SqliteLiveStateRepository {
    pool: SqlitePool,
}

impl SqliteLiveStateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_live_state(row: &sqlx::sqlite::SqliteRow) -> CoordinatorResult<LiveState> {
        Ok(LiveState {
            worker_id: row.try_get("worker_id")?,
            status: row.try_get("status")?,
            stage: row.try_get("stage")?,
            progress: row.try_get("progress")?,
            stage_progress: row.try_get("stage_progress")?,
            log_messages: MappingHelpers::parse_json_sqlite(row, "log_messages")?,
            warning_count: row.try_get("warning_count")?,
            error_count: row.try_get("error_count")?,
            eta: row.try_get("eta")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl LiveStateRepository for SqliteLiveStateRepository {
    async fn get(&self, worker_id: &str) -> CoordinatorResult<Option<LiveState>> {
        let row = sqlx::query(
            r#"
            SELECT worker_id, status, stage, progress, stage_progress, log_messages,
                   warning_count, error_count, eta, updated_at
            FROM live_states WHERE worker_id = $1
            "#,
        )
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoordinatorError::Database)?;

        row.as_ref().map(Self::row_to_live_state).transpose()
    }

    async fn upsert(&self, state: &LiveState) -> CoordinatorResult<()> {
        let log_json = MappingHelpers::to_json_string(&state.log_messages, "实时日志")?;

        sqlx::query(
            r#"
            INSERT INTO live_states (worker_id, status, stage, progress, stage_progress, log_messages, warning_count, error_count, eta, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT(worker_id) DO UPDATE SET
                status = excluded.status,
                stage = excluded.stage,
                progress = excluded.progress,
                stage_progress = excluded.stage_progress,
                log_messages = excluded.log_messages,
                warning_count = excluded.warning_count,
                error_count = excluded.error_count,
                eta = excluded.eta,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&state.worker_id)
        .bind(state.status)
        .bind(&state.stage)
        .bind(state.progress)
        .bind(state.stage_progress)
        .bind(log_json)
        .bind(state.warning_count)
        .bind(state.error_count)
        .bind(state.eta)
        .bind(state.updated_at)
        .execute(&self.pool)
        .await
        .map_err(CoordinatorError::Database)?;

        Ok(())
    }

    async fn delete(&self, worker_id: &str) -> CoordinatorResult<()> {
        sqlx::query("DELETE FROM live_states WHERE worker_id = $1")
            .bind(worker_id)
            .execute(&self.pool)
            .await
            .map_err(CoordinatorError::Database)?;
        Ok(())
    }
}
