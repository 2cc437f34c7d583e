use async_trait::async_trait;
use coordinator_core::{
    Assignment, AssignmentRepository, AssignmentStatus, CoordinatorError, CoordinatorResult,
};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use crate::database::mapping::MappingHelpers;

const ASSIGNMENT_COLUMNS: &str = "id, super_study_id, idx, status, worker_id, progress, current_stage, eta, started_at, completed_at, config";

pub struct SqliteAssignmentRepository {
    pool: SqlitePool,
}

impl SqliteAssignmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_assignment(row: &sqlx::sqlite::SqliteRow) -> CoordinatorResult<Assignment> {
        Ok(Assignment {
            id: row.try_get("id")?,
            super_study_id: row.try_get("super_study_id")?,
            index: row.try_get("idx")?,
            status: row.try_get("status")?,
            worker_id: row.try_get("worker_id")?,
            progress: row.try_get("progress")?,
            current_stage: row.try_get("current_stage")?,
            eta: row.try_get("eta")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            config: MappingHelpers::parse_json_sqlite(row, "config")?,
        })
    }

    async fn fetch_many(&self, sql: &str, key: &str) -> CoordinatorResult<Vec<Assignment>> {
        let rows = sqlx::query(sql)
            .bind(key)
            .fetch_all(&self.pool)
            .await
            .map_err(CoordinatorError::Database)?;

        rows.iter().map(Self::row_to_assignment).collect()
    }
}

#[async_trait]
impl AssignmentRepository for SqliteAssignmentRepository {
    async fn get_by_id(&self, id: &str) -> CoordinatorResult<Option<Assignment>> {
        let row = sqlx::query(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoordinatorError::Database)?;

        row.as_ref().map(Self::row_to_assignment).transpose()
    }

    async fn list_by_super_study(
        &self,
        super_study_id: &str,
    ) -> CoordinatorResult<Vec<Assignment>> {
        self.fetch_many(
            &format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE super_study_id = $1 ORDER BY idx ASC"),
            super_study_id,
        )
        .await
    }

    async fn list_by_worker(&self, worker_id: &str) -> CoordinatorResult<Vec<Assignment>> {
        self.fetch_many(
            &format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE worker_id = $1 ORDER BY super_study_id, idx"),
            worker_id,
        )
        .await
    }

    async fn find_running_by_worker(&self, worker_id: &str) -> CoordinatorResult<Vec<Assignment>> {
        let rows = sqlx::query(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE worker_id = $1 AND status = $2 ORDER BY started_at DESC"
        ))
        .bind(worker_id)
        .bind(AssignmentStatus::Running)
        .fetch_all(&self.pool)
        .await
        .map_err(CoordinatorError::Database)?;

        rows.iter().map(Self::row_to_assignment).collect()
    }

    #[instrument(skip(self, assignment), fields(assignment_id = %assignment.id))]
    async fn update(&self, assignment: &Assignment) -> CoordinatorResult<()> {
        let config_json = MappingHelpers::to_json_string(&assignment.config, "作业配置")?;

        let result = sqlx::query(
            r#"
            UPDATE assignments
            SET status = $2, worker_id = $3, progress = $4, current_stage = $5,
                eta = $6, started_at = $7, completed_at = $8, config = $9
            WHERE id = $1
            "#,
        )
        .bind(&assignment.id)
        .bind(assignment.status)
        .bind(&assignment.worker_id)
        .bind(assignment.progress)
        .bind(&assignment.current_stage)
        .bind(assignment.eta)
        .bind(assignment.started_at)
        .bind(assignment.completed_at)
        .bind(config_json)
        .execute(&self.pool)
        .await
        .map_err(CoordinatorError::Database)?;

        if result.rows_affected() == 0 {
            return Err(CoordinatorError::AssignmentNotFound {
                id: assignment.id.clone(),
            });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn transfer_running(&self, from: &[String], to: &str) -> CoordinatorResult<Vec<String>> {
        let mut tx = self.pool.begin().await.map_err(CoordinatorError::Database)?;
        let mut moved = Vec::new();

        for source in from {
            let rows = sqlx::query(
                "UPDATE assignments SET worker_id = $1 WHERE worker_id = $2 AND status = $3 RETURNING id",
            )
            .bind(to)
            .bind(source)
            .bind(AssignmentStatus::Running)
            .fetch_all(&mut *tx)
            .await
            .map_err(CoordinatorError::Database)?;

            for row in rows {
                moved.push(row.try_get::<String, _>("id")?);
            }
        }

        tx.commit().await.map_err(CoordinatorError::Database)?;
        debug!("转移 {} 个运行中作业到会话 {}", moved.len(), to);
        Ok(moved)
    }
}
