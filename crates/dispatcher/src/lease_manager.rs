use std::collections::BTreeSet;
use std::sync::Arc;

use metrics::counter;
use tracing::{info, instrument, warn};

use coordinator_core::{
    Assignment, Clock, CoordinatorError, CoordinatorResult, CoordinatorStore, WorkerSession,
    WorkerStatus,
};

use crate::identity::{Contact, IdentityResolver};
use crate::rollup::RollupAggregator;

/// 作业租约管理
///
/// 不做任何加锁：并发领取同一作业时最后一次写入生效，
/// 由读路径对账收敛。
pub struct LeaseManager {
    store: CoordinatorStore,
    identity: Arc<IdentityResolver>,
    rollup: Arc<RollupAggregator>,
    clock: Arc<dyn Clock>,
}

impl LeaseManager {
    pub fn new(
        store: CoordinatorStore,
        identity: Arc<IdentityResolver>,
        rollup: Arc<RollupAggregator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            identity,
            rollup,
            clock,
        }
    }

    async fn load_session(&self, session_id: &str) -> CoordinatorResult<WorkerSession> {
        self.store
            .workers
            .get_by_id(session_id)
            .await?
            .ok_or_else(|| CoordinatorError::WorkerNotFound {
                id: session_id.to_string(),
            })
    }

    /// 汇总失败只记录告警
    async fn rollup_best_effort(&self, super_study_id: &str) {
        if let Err(e) = self.rollup.recompute(super_study_id).await {
            warn!("重新计算研究批次 {} 的汇总失败: {}", super_study_id, e);
        }
    }

    /// 领取作业
    ///
    /// 不检查作业是否处于 PENDING，重复领取会直接改挂到新的会话。
    #[instrument(skip(self))]
    pub async fn claim(&self, assignment_id: &str, network_id: &str) -> CoordinatorResult<Assignment> {
        if network_id.trim().is_empty() {
            return Err(CoordinatorError::validation("networkId 不能为空"));
        }

        let mut assignment = self
            .store
            .assignments
            .get_by_id(assignment_id)
            .await?
            .ok_or_else(|| CoordinatorError::AssignmentNotFound {
                id: assignment_id.to_string(),
            })?;

        let resolution = self.identity.resolve(Contact::claim(network_id)).await?;
        let mut session = resolution.session;
        let now = self.clock.now();

        if let Some(previous) = assignment.worker_id.as_deref().filter(|w| *w != session.id) {
            if assignment.is_running() {
                warn!(
                    "作业 {} 正由会话 {} 运行，改挂到会话 {}",
                    assignment.id, previous, session.id
                );
            }
        }

        assignment.claim(&session.id, now);
        self.store.assignments.update(&assignment).await?;

        session.status = WorkerStatus::Running;
        session.last_seen = now;
        self.store.workers.update(&session).await?;

        if self
            .store
            .super_studies
            .mark_running_if_pending(&assignment.super_study_id, now)
            .await?
        {
            info!("研究批次 {} 开始运行", assignment.super_study_id);
        }
        self.rollup_best_effort(&assignment.super_study_id).await;

        counter!("coordinator_claims_total").increment(1);
        info!(
            "作业 {} (#{}) 被会话 {} ({}) 领取",
            assignment.id, assignment.index, session.id, network_id
        );
        Ok(assignment)
    }

    /// 会话报告完成：结束其当前运行中的作业
    #[instrument(skip(self))]
    pub async fn report_finished(&self, session_id: &str) -> CoordinatorResult<Option<Assignment>> {
        let mut session = self.load_session(session_id).await?;
        let now = self.clock.now();

        let current = self
            .store
            .assignments
            .find_running_by_worker(session_id)
            .await?
            .into_iter()
            .next();

        let completed = match current {
            Some(mut assignment) => {
                assignment.complete(now);
                self.store.assignments.update(&assignment).await?;
                info!("会话 {} 完成作业 {}", session_id, assignment.id);
                self.rollup_best_effort(&assignment.super_study_id).await;
                Some(assignment)
            }
            None => None,
        };

        session.status = WorkerStatus::Idle;
        self.store.workers.update(&session).await?;
        Ok(completed)
    }

    /// 会话报告致命错误，作业的失败判定留给对账
    #[instrument(skip(self))]
    pub async fn report_fatal_error(&self, session_id: &str) -> CoordinatorResult<()> {
        let mut session = self.load_session(session_id).await?;
        session.status = WorkerStatus::Error;
        self.store.workers.update(&session).await?;
        warn!("会话 {} 报告致命错误", session_id);
        Ok(())
    }

    /// 解除会话持有的全部作业，返回被重置的作业ID
    #[instrument(skip(self))]
    pub async fn unassign(&self, session_id: &str) -> CoordinatorResult<Vec<String>> {
        let owned = self.store.assignments.list_by_worker(session_id).await?;
        let mut studies = BTreeSet::new();
        let mut reset = Vec::with_capacity(owned.len());

        for mut assignment in owned {
            assignment.reset();
            self.store.assignments.update(&assignment).await?;
            studies.insert(assignment.super_study_id.clone());
            reset.push(assignment.id);
        }

        for study_id in &studies {
            self.rollup_best_effort(study_id).await;
        }

        if !reset.is_empty() {
            info!(
                "会话 {} 的 {} 个作业已解除分配，涉及 {} 个研究批次",
                session_id,
                reset.len(),
                studies.len()
            );
        }
        Ok(reset)
    }

    /// 删除会话：先解除分配，再级联删除
    #[instrument(skip(self))]
    pub async fn delete_worker(&self, session_id: &str) -> CoordinatorResult<Vec<String>> {
        self.load_session(session_id).await?;
        let reset = self.unassign(session_id).await?;
        self.store.workers.delete(session_id).await?;
        info!("会话 {} 已删除", session_id);
        Ok(reset)
    }

    /// 对账修复：重置为 PENDING
    pub async fn reset_assignment(&self, assignment: &Assignment) -> CoordinatorResult<Assignment> {
        let mut repaired = assignment.clone();
        repaired.reset();
        self.store.assignments.update(&repaired).await?;
        self.rollup_best_effort(&repaired.super_study_id).await;
        Ok(repaired)
    }

    /// 对账修复：标记为 COMPLETED，沿用已有的完成时间
    pub async fn complete_assignment(
        &self,
        assignment: &Assignment,
    ) -> CoordinatorResult<Assignment> {
        let mut repaired = assignment.clone();
        let completed_at = repaired.completed_at.unwrap_or_else(|| self.clock.now());
        repaired.complete(completed_at);
        self.store.assignments.update(&repaired).await?;
        self.rollup_best_effort(&repaired.super_study_id).await;
        Ok(repaired)
    }

    /// 对账修复：标记为 FAILED
    pub async fn fail_assignment(&self, assignment: &Assignment) -> CoordinatorResult<Assignment> {
        let mut repaired = assignment.clone();
        repaired.fail();
        self.store.assignments.update(&repaired).await?;
        self.rollup_best_effort(&repaired.super_study_id).await;
        Ok(repaired)
    }
}
