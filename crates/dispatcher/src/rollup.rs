use std::sync::Arc;

use tracing::{debug, instrument};

use coordinator_core::{
    AssignmentStatus, Clock, CoordinatorError, CoordinatorResult, CoordinatorStore, SuperStudy,
    SuperStudyStatus,
};

/// 研究批次的派生字段
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rollup {
    pub completed: i32,
    pub master_progress: f64,
    pub status: SuperStudyStatus,
}

/// 由作业状态推导批次汇总
pub fn derive(statuses: &[AssignmentStatus], total: i32) -> Rollup {
    let completed = statuses
        .iter()
        .filter(|s| **s == AssignmentStatus::Completed)
        .count() as i32;

    let master_progress = if total > 0 {
        100.0 * f64::from(completed) / f64::from(total)
    } else {
        0.0
    };

    let status = if total > 0 && completed == total {
        SuperStudyStatus::Completed
    } else if statuses.contains(&AssignmentStatus::Running) {
        SuperStudyStatus::Running
    } else {
        SuperStudyStatus::Pending
    };

    Rollup {
        completed,
        master_progress,
        status,
    }
}

/// 汇总计算器，幂等，可在任意作业变更后重复调用
pub struct RollupAggregator {
    store: CoordinatorStore,
    clock: Arc<dyn Clock>,
}

impl RollupAggregator {
    pub fn new(store: CoordinatorStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    #[instrument(skip(self))]
    pub async fn recompute(&self, super_study_id: &str) -> CoordinatorResult<SuperStudy> {
        let mut study = self
            .store
            .super_studies
            .get_by_id(super_study_id)
            .await?
            .ok_or_else(|| CoordinatorError::SuperStudyNotFound {
                id: super_study_id.to_string(),
            })?;

        let statuses: Vec<AssignmentStatus> = self
            .store
            .assignments
            .list_by_super_study(super_study_id)
            .await?
            .iter()
            .map(|a| a.status)
            .collect();

        let rollup = derive(&statuses, study.total_assignments);
        study.completed_assignments = rollup.completed;
        study.master_progress = rollup.master_progress;
        study.status = rollup.status;
        study.updated_at = self.clock.now();

        self.store.super_studies.update(&study).await?;
        debug!(
            "研究批次 {} 汇总: {}/{} 完成, 状态 {}",
            study.id, study.completed_assignments, study.total_assignments, study.status
        );

        Ok(study)
    }
}
