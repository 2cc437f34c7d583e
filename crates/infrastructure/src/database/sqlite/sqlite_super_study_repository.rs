use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coordinator_core::{
    Assignment, CoordinatorError, CoordinatorResult, SuperStudy, SuperStudyRepository,
    SuperStudyStatus,
};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use crate::database::mapping::MappingHelpers;

const SUPER_STUDY_COLUMNS: &str = "id, name, description, base_config, total_assignments, completed_assignments, master_progress, status, created_at, updated_at";

pub struct SqliteSuperStudyRepository {
    pool: SqlitePool,
}

impl SqliteSuperStudyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_super_study(row: &sqlx::sqlite::SqliteRow) -> CoordinatorResult<SuperStudy> {
        Ok(SuperStudy {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            base_config: MappingHelpers::parse_optional_json_sqlite(row, "base_config")?,
            total_assignments: row.try_get("total_assignments")?,
            completed_assignments: row.try_get("completed_assignments")?,
            master_progress: row.try_get("master_progress")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl SuperStudyRepository for SqliteSuperStudyRepository {
    #[instrument(skip(self, study, assignments), fields(super_study_id = %study.id))]
    async fn create_with_assignments(
        &self,
        study: &SuperStudy,
        assignments: &[Assignment],
    ) -> CoordinatorResult<()> {
        let base_config_json = study
            .base_config
            .as_ref()
            .map(|c| MappingHelpers::to_json_string(c, "基础配置"))
            .transpose()?;

        let mut tx = self.pool.begin().await.map_err(CoordinatorError::Database)?;

        sqlx::query(
            r#"
            INSERT INTO super_studies (id, name, description, base_config, total_assignments, completed_assignments, master_progress, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&study.id)
        .bind(&study.name)
        .bind(&study.description)
        .bind(base_config_json)
        .bind(study.total_assignments)
        .bind(study.completed_assignments)
        .bind(study.master_progress)
        .bind(study.status)
        .bind(study.created_at)
        .bind(study.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(CoordinatorError::Database)?;

        for assignment in assignments {
            let config_json = MappingHelpers::to_json_string(&assignment.config, "作业配置")?;
            sqlx::query(
                r#"
                INSERT INTO assignments (id, super_study_id, idx, status, worker_id, progress, current_stage, eta, started_at, completed_at, config)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(&assignment.id)
            .bind(&assignment.super_study_id)
            .bind(assignment.index)
            .bind(assignment.status)
            .bind(&assignment.worker_id)
            .bind(assignment.progress)
            .bind(&assignment.current_stage)
            .bind(assignment.eta)
            .bind(assignment.started_at)
            .bind(assignment.completed_at)
            .bind(config_json)
            .execute(&mut *tx)
            .await
            .map_err(CoordinatorError::Database)?;
        }

        tx.commit().await.map_err(CoordinatorError::Database)?;
        debug!(
            "创建研究批次成功: {} ({} 个作业)",
            study.id,
            assignments.len()
        );
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> CoordinatorResult<Option<SuperStudy>> {
        let row = sqlx::query(&format!(
            "SELECT {SUPER_STUDY_COLUMNS} FROM super_studies WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoordinatorError::Database)?;

        row.as_ref().map(Self::row_to_super_study).transpose()
    }

    async fn list(&self, name_filter: Option<&str>) -> CoordinatorResult<Vec<SuperStudy>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SUPER_STUDY_COLUMNS} FROM super_studies
            WHERE ($1 IS NULL OR instr(name, $1) > 0)
            ORDER BY created_at DESC
            "#
        ))
        .bind(name_filter)
        .fetch_all(&self.pool)
        .await
        .map_err(CoordinatorError::Database)?;

        rows.iter().map(Self::row_to_super_study).collect()
    }

    async fn update(&self, study: &SuperStudy) -> CoordinatorResult<()> {
        let base_config_json = study
            .base_config
            .as_ref()
            .map(|c| MappingHelpers::to_json_string(c, "基础配置"))
            .transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE super_studies
            SET name = $2, description = $3, base_config = $4, total_assignments = $5,
                completed_assignments = $6, master_progress = $7, status = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(&study.id)
        .bind(&study.name)
        .bind(&study.description)
        .bind(base_config_json)
        .bind(study.total_assignments)
        .bind(study.completed_assignments)
        .bind(study.master_progress)
        .bind(study.status)
        .bind(study.updated_at)
        .execute(&self.pool)
        .await
        .map_err(CoordinatorError::Database)?;

        if result.rows_affected() == 0 {
            return Err(CoordinatorError::SuperStudyNotFound {
                id: study.id.clone(),
            });
        }
        Ok(())
    }

    #[instrument(skip(self), fields(super_study_id = %id))]
    async fn delete(&self, id: &str) -> CoordinatorResult<bool> {
        let result = sqlx::query("DELETE FROM super_studies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(CoordinatorError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_running_if_pending(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> CoordinatorResult<bool> {
        let result = sqlx::query(
            "UPDATE super_studies SET status = $2, updated_at = $3 WHERE id = $1 AND status = $4",
        )
        .bind(id)
        .bind(SuperStudyStatus::Running)
        .bind(now)
        .bind(SuperStudyStatus::Pending)
        .execute(&self.pool)
        .await
        .map_err(CoordinatorError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
