//! 读路径对账
//!
//! 写路径上的尽力而为写入会让作业状态与会话状态出现偏差。每次状态读取都在
//! 快照上运行 [`reconcile`] 推导出修正后的视图，必要时通过租约管理器把修正写回，
//! 使后续读取收敛。加载快照时按存活档位判定会话是否已超时，崩溃后不再联系的
//! Worker 的租约因此也会被释放。

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use chrono::{DateTime, Utc};
use coordinator_core::{
    config::ReconciliationConfig, Assignment, AssignmentStatus, Clock, CoordinatorError,
    CoordinatorResult, CoordinatorStore, SuperStudy, WorkerSession, WorkerStatus,
};

use crate::lease_manager::LeaseManager;
use crate::liveness::LivenessPolicy;

/// 对账所需的会话快照
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub session: WorkerSession,
    pub running_assignment_ids: Vec<String>,
}

impl WorkerContext {
    fn holds_other_running(&self, assignment_id: &str) -> bool {
        self.running_assignment_ids
            .iter()
            .any(|id| id != assignment_id)
    }
}

/// 写回命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairCommand {
    ResetToPending,
    MarkCompleted,
    MarkFailed,
}

/// 单个作业的对账结果
#[derive(Debug, Clone)]
pub struct Reconciled {
    /// 修正后的展示视图
    pub view: Assignment,
    /// 展示用的会话，引用过期时替换为继任会话
    pub worker: Option<WorkerSession>,
    pub derived_status: AssignmentStatus,
    pub repair: Option<RepairCommand>,
}

fn finished_or_pending(assignment: &Assignment) -> AssignmentStatus {
    if assignment.completed_at.is_some() {
        AssignmentStatus::Completed
    } else {
        AssignmentStatus::Pending
    }
}

/// 推导作业的修正状态，不访问存储
///
/// `referenced` 是作业引用的会话，`successor` 是与其网络标识相同的活跃会话。
/// 超时判定已在构造 [`WorkerContext`] 时折算进 `is_stale`。
pub fn reconcile(
    assignment: &Assignment,
    referenced: Option<&WorkerContext>,
    successor: Option<&WorkerContext>,
) -> Reconciled {
    let resolved = match referenced {
        Some(worker) if worker.session.is_stale => successor.or(Some(worker)),
        other => other,
    };

    let derived_status = if assignment.status != AssignmentStatus::Running {
        assignment.status
    } else {
        match resolved {
            None => AssignmentStatus::Pending,
            Some(worker)
                if !worker.session.is_stale
                    && worker.session.status == WorkerStatus::Idle
                    && !worker.holds_other_running(&assignment.id) =>
            {
                finished_or_pending(assignment)
            }
            Some(worker) if worker.session.status == WorkerStatus::Error => {
                AssignmentStatus::Failed
            }
            Some(worker) if worker.session.is_stale => finished_or_pending(assignment),
            Some(_) => assignment.status,
        }
    };

    let repair = if derived_status == assignment.status {
        None
    } else {
        match derived_status {
            AssignmentStatus::Pending => Some(RepairCommand::ResetToPending),
            AssignmentStatus::Completed => Some(RepairCommand::MarkCompleted),
            AssignmentStatus::Failed => Some(RepairCommand::MarkFailed),
            AssignmentStatus::Running => None,
        }
    };

    let mut view = assignment.clone();
    let mut worker = resolved.map(|w| w.session.clone());
    match repair {
        Some(RepairCommand::ResetToPending) => {
            view.reset();
            worker = None;
        }
        Some(RepairCommand::MarkCompleted) => {
            let completed_at = view.completed_at.unwrap_or_default();
            view.complete(completed_at);
        }
        Some(RepairCommand::MarkFailed) => view.fail(),
        None => {}
    }
    if let Some(worker) = &worker {
        view.worker_id = Some(worker.id.clone());
    }

    Reconciled {
        view,
        worker,
        derived_status,
        repair,
    }
}

/// 各状态的作业数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn tally<'a>(statuses: impl IntoIterator<Item = &'a AssignmentStatus>) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            match status {
                AssignmentStatus::Pending => counts.pending += 1,
                AssignmentStatus::Running => counts.running += 1,
                AssignmentStatus::Completed => counts.completed += 1,
                AssignmentStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }
}

/// 对账后的作业
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledAssignment {
    #[serde(flatten)]
    pub assignment: Assignment,
    pub worker: Option<WorkerSession>,
    pub stored_status: AssignmentStatus,
    pub repaired: bool,
}

/// 研究批次的对账视图
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyStatusView {
    pub super_study: SuperStudy,
    pub assignments: Vec<ReconciledAssignment>,
    pub counts: StatusCounts,
}

/// 对账引擎：加载快照、调用 [`reconcile`]、按配置写回
pub struct ReconciliationEngine {
    store: CoordinatorStore,
    lease_manager: Arc<LeaseManager>,
    policy: LivenessPolicy,
    clock: Arc<dyn Clock>,
    config: ReconciliationConfig,
}

impl ReconciliationEngine {
    pub fn new(
        store: CoordinatorStore,
        lease_manager: Arc<LeaseManager>,
        policy: LivenessPolicy,
        clock: Arc<dyn Clock>,
        config: Option<ReconciliationConfig>,
    ) -> Self {
        Self {
            store,
            lease_manager,
            policy,
            clock,
            config: config.unwrap_or_default(),
        }
    }

    /// 加载会话快照，超出所在档位超时的会话按过期处理
    ///
    /// 开启写回时过期标记同时持久化，写入失败只影响本次之后的读取。
    async fn load_context(
        &self,
        mut session: WorkerSession,
        now: DateTime<Utc>,
    ) -> CoordinatorResult<WorkerContext> {
        let running_assignment_ids: Vec<String> = self
            .store
            .assignments
            .find_running_by_worker(&session.id)
            .await?
            .into_iter()
            .map(|a| a.id)
            .collect();

        if !session.is_stale
            && self
                .policy
                .is_expired(&session, running_assignment_ids.len(), now)
        {
            debug!(
                "会话 {} 已静默 {} 秒，对账时按过期处理",
                session.id,
                session.silence(now).num_seconds()
            );
            if self.config.write_back {
                match self.store.workers.mark_stale(&session.id).await {
                    Ok(()) => info!(
                        "对账将超时会话 {} ({}) 标记为过期",
                        session.id, session.network_id
                    ),
                    Err(e) => warn!("标记会话 {} 过期失败: {}", session.id, e),
                }
            }
            session.is_stale = true;
        }

        Ok(WorkerContext {
            session,
            running_assignment_ids,
        })
    }

    async fn apply_repair(
        &self,
        assignment: &Assignment,
        repair: RepairCommand,
    ) -> CoordinatorResult<()> {
        match repair {
            RepairCommand::ResetToPending => self.lease_manager.reset_assignment(assignment).await?,
            RepairCommand::MarkCompleted => {
                self.lease_manager.complete_assignment(assignment).await?
            }
            RepairCommand::MarkFailed => self.lease_manager.fail_assignment(assignment).await?,
        };
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn study_status(&self, super_study_id: &str) -> CoordinatorResult<StudyStatusView> {
        let study = self
            .store
            .super_studies
            .get_by_id(super_study_id)
            .await?
            .ok_or_else(|| CoordinatorError::SuperStudyNotFound {
                id: super_study_id.to_string(),
            })?;

        let assignments = self
            .store
            .assignments
            .list_by_super_study(super_study_id)
            .await?;

        let now = self.clock.now();
        let mut by_id: HashMap<String, Option<WorkerContext>> = HashMap::new();
        let mut by_network: HashMap<String, Option<WorkerContext>> = HashMap::new();
        let mut views = Vec::with_capacity(assignments.len());
        let mut repaired_any = false;

        for assignment in assignments {
            let referenced = match assignment.worker_id.as_deref() {
                Some(worker_id) => {
                    if !by_id.contains_key(worker_id) {
                        let context = match self.store.workers.get_by_id(worker_id).await? {
                            Some(session) => Some(self.load_context(session, now).await?),
                            None => None,
                        };
                        by_id.insert(worker_id.to_string(), context);
                    }
                    by_id.get(worker_id).cloned().flatten()
                }
                None => None,
            };

            let successor = match referenced.as_ref() {
                Some(worker) if worker.session.is_stale => {
                    let network_id = worker.session.network_id.clone();
                    if !by_network.contains_key(&network_id) {
                        let context = match self
                            .store
                            .workers
                            .find_active_by_network_id(&network_id)
                            .await?
                        {
                            Some(session) => Some(self.load_context(session, now).await?),
                            None => None,
                        };
                        by_network.insert(network_id.clone(), context);
                    }
                    // 未写回的超时会话仍会被按网络标识查到，不能作为自己的继任者
                    by_network
                        .get(&network_id)
                        .cloned()
                        .flatten()
                        .filter(|c| !c.session.is_stale && c.session.id != worker.session.id)
                }
                _ => None,
            };

            let reconciled = reconcile(&assignment, referenced.as_ref(), successor.as_ref());
            let mut repaired = false;

            if let Some(repair) = reconciled.repair {
                debug!(
                    "作业 {} 状态偏差: {} -> {}",
                    assignment.id, assignment.status, reconciled.derived_status
                );
                if self.config.write_back {
                    match self.apply_repair(&assignment, repair).await {
                        Ok(()) => {
                            repaired = true;
                            repaired_any = true;
                            counter!("coordinator_reconciliation_repairs_total").increment(1);
                            info!(
                                "对账修复作业 {}: {} -> {}",
                                assignment.id, assignment.status, reconciled.derived_status
                            );
                        }
                        Err(e) => warn!("写回作业 {} 的对账修复失败: {}", assignment.id, e),
                    }
                }
            }

            views.push(ReconciledAssignment {
                stored_status: assignment.status,
                assignment: reconciled.view,
                worker: reconciled.worker,
                repaired,
            });
        }

        let super_study = if repaired_any {
            match self.store.super_studies.get_by_id(super_study_id).await {
                Ok(Some(refreshed)) => refreshed,
                Ok(None) => study,
                Err(e) => {
                    warn!("重新读取研究批次 {} 失败: {}", super_study_id, e);
                    study
                }
            }
        } else {
            study
        };

        let counts = StatusCounts::tally(views.iter().map(|v| &v.assignment.status));
        Ok(StudyStatusView {
            super_study,
            assignments: views,
            counts,
        })
    }
}
