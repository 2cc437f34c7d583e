use async_trait::async_trait;
use coordinator_core::{
    CoordinatorError, CoordinatorResult, ProgressEvent, ProgressEventRepository,
};
use sqlx::{Row, SqlitePool};

use crate::database::mapping::MappingHelpers;

pub struct SqliteProgressEventRepository {
    pool: SqlitePool,
}

impl SqliteProgressEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> CoordinatorResult<ProgressEvent> {
        Ok(ProgressEvent {
            id: row.try_get("id")?,
            worker_id: row.try_get("worker_id")?,
            assignment_id: row.try_get("assignment_id")?,
            event_type: row.try_get("event_type")?,
            message: row.try_get("message")?,
            stage: row.try_get("stage")?,
            progress: row.try_get("progress")?,
            eta: row.try_get("eta")?,
            data: MappingHelpers::parse_json_sqlite(row, "data")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl ProgressEventRepository for SqliteProgressEventRepository {
    async fn record(&self, event: &ProgressEvent) -> CoordinatorResult<()> {
        let data_json = MappingHelpers::to_json_string(&event.data, "事件载荷")?;

        sqlx::query(
            r#"
            INSERT INTO progress_events (id, worker_id, assignment_id, event_type, message, stage, progress, eta, data, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&event.id)
        .bind(&event.worker_id)
        .bind(&event.assignment_id)
        .bind(event.event_type)
        .bind(&event.message)
        .bind(&event.stage)
        .bind(event.progress)
        .bind(event.eta)
        .bind(data_json)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(CoordinatorError::Database)?;

        Ok(())
    }

    async fn list_by_worker(
        &self,
        worker_id: &str,
        limit: i64,
    ) -> CoordinatorResult<Vec<ProgressEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, worker_id, assignment_id, event_type, message, stage, progress, eta, data, created_at
            FROM progress_events
            WHERE worker_id = $1
            ORDER BY created_at DESC, rowid DESC
            LIMIT $2
            "#,
        )
        .bind(worker_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(CoordinatorError::Database)?;

        rows.iter().map(Self::row_to_event).collect()
    }
}
