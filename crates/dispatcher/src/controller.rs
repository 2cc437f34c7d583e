use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use tracing::{info, instrument};

use coordinator_core::{
    config::{LivenessConfig, ReconciliationConfig},
    Assignment, AssignmentStatus, Clock, CoordinatorError, CoordinatorResult, CoordinatorStore,
    HardwareInfo, LiveState, NewSuperStudy, ProgressEvent, ProgressReport, SessionSummary,
    SuperStudy, WorkerSession,
};

use crate::identity::{Contact, IdentityResolver};
use crate::ingestion::{IngestOutcome, ProgressIngestor};
use crate::lease_manager::LeaseManager;
use crate::liveness::LivenessTracker;
use crate::reconciliation::{ReconciliationEngine, StudyStatusView};
use crate::rollup::RollupAggregator;

/// Worker状态视图中附带的最近事件条数
const RECENT_EVENT_LIMIT: i64 = 20;

/// 心跳查询结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatLookup {
    pub session: WorkerSession,
    pub running_assignments: Vec<Assignment>,
    pub is_offline: bool,
}

/// 单个会话的详细状态
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatusView {
    pub session: WorkerSession,
    pub live_state: Option<LiveState>,
    pub assignments: Vec<Assignment>,
    pub recent_events: Vec<ProgressEvent>,
    pub is_alive: bool,
}

/// 会话列表条目
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerOverview {
    #[serde(flatten)]
    pub session: WorkerSession,
    pub assignments: Vec<Assignment>,
    pub is_alive: bool,
}

/// 删除会话的结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedWorker {
    pub session_id: String,
    pub reset_assignments: Vec<String>,
}

/// 新建的研究批次
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSuperStudy {
    #[serde(flatten)]
    pub super_study: SuperStudy,
    pub assignments: Vec<Assignment>,
}

/// 协调引擎的统一入口，供传输层调用
pub struct CoordinatorController {
    store: CoordinatorStore,
    clock: Arc<dyn Clock>,
    liveness: Arc<LivenessTracker>,
    identity: Arc<IdentityResolver>,
    lease_manager: Arc<LeaseManager>,
    ingestor: ProgressIngestor,
    reconciliation: ReconciliationEngine,
}

fn require_network_id(network_id: &str) -> CoordinatorResult<&str> {
    let trimmed = network_id.trim();
    if trimmed.is_empty() {
        return Err(CoordinatorError::validation("networkId 不能为空"));
    }
    Ok(trimmed)
}

impl CoordinatorController {
    pub fn new(
        store: CoordinatorStore,
        clock: Arc<dyn Clock>,
        liveness_config: Option<LivenessConfig>,
        reconciliation_config: Option<ReconciliationConfig>,
    ) -> Self {
        let liveness_config = liveness_config.unwrap_or_default();
        let liveness = Arc::new(LivenessTracker::new(
            store.clone(),
            Some(liveness_config.clone()),
        ));
        let identity = Arc::new(IdentityResolver::new(
            store.clone(),
            liveness.clone(),
            clock.clone(),
            Some(liveness_config),
        ));
        let rollup = Arc::new(RollupAggregator::new(store.clone(), clock.clone()));
        let lease_manager = Arc::new(LeaseManager::new(
            store.clone(),
            identity.clone(),
            rollup.clone(),
            clock.clone(),
        ));
        let ingestor = ProgressIngestor::new(
            store.clone(),
            identity.clone(),
            lease_manager.clone(),
            rollup,
            clock.clone(),
        );
        let reconciliation = ReconciliationEngine::new(
            store.clone(),
            lease_manager.clone(),
            liveness.policy().clone(),
            clock.clone(),
            reconciliation_config,
        );

        Self {
            store,
            clock,
            liveness,
            identity,
            lease_manager,
            ingestor,
            reconciliation,
        }
    }

    #[instrument(skip(self, hardware))]
    pub async fn heartbeat(
        &self,
        network_id: &str,
        hostname: Option<&str>,
        hardware: Option<&HardwareInfo>,
    ) -> CoordinatorResult<SessionSummary> {
        let network_id = require_network_id(network_id)?;
        let resolution = self
            .identity
            .resolve(Contact::heartbeat(network_id, hostname, hardware))
            .await?;
        counter!("coordinator_heartbeats_total").increment(1);

        let session = resolution.session;
        Ok(SessionSummary {
            session_id: session.id,
            network_id: session.network_id,
            hostname: session.hostname,
            status: session.status,
            is_new_session: resolution.is_new,
            superseded_sessions: resolution.retired_sessions,
            transferred_assignments: resolution.transferred_assignments,
            timestamp: self.clock.now(),
        })
    }

    /// 只读查询，不刷新联系时间
    pub async fn lookup_heartbeat(
        &self,
        network_id: &str,
    ) -> CoordinatorResult<Option<HeartbeatLookup>> {
        let network_id = require_network_id(network_id)?;
        let Some(session) = self
            .store
            .workers
            .find_active_by_network_id(network_id)
            .await?
        else {
            return Ok(None);
        };

        let running_assignments = self
            .store
            .assignments
            .find_running_by_worker(&session.id)
            .await?;
        let is_offline = self.liveness.policy().is_offline(&session, self.clock.now());

        Ok(Some(HeartbeatLookup {
            session,
            running_assignments,
            is_offline,
        }))
    }

    pub async fn claim(&self, assignment_id: &str, network_id: &str) -> CoordinatorResult<Assignment> {
        let network_id = require_network_id(network_id)?;
        self.lease_manager.claim(assignment_id, network_id).await
    }

    pub async fn report_progress(
        &self,
        network_id: &str,
        report: &ProgressReport,
        reported_at: Option<DateTime<Utc>>,
    ) -> CoordinatorResult<IngestOutcome> {
        let network_id = require_network_id(network_id)?;
        self.ingestor.ingest(network_id, report, reported_at).await
    }

    pub async fn assignment_status(&self, super_study_id: &str) -> CoordinatorResult<StudyStatusView> {
        self.reconciliation.study_status(super_study_id).await
    }

    pub async fn worker_status(&self, session_id: &str) -> CoordinatorResult<WorkerStatusView> {
        let session = self
            .store
            .workers
            .get_by_id(session_id)
            .await?
            .ok_or_else(|| CoordinatorError::WorkerNotFound {
                id: session_id.to_string(),
            })?;

        let live_state = self.store.live_states.get(session_id).await?;
        let assignments = self.store.assignments.list_by_worker(session_id).await?;
        let recent_events = self
            .store
            .events
            .list_by_worker(session_id, RECENT_EVENT_LIMIT)
            .await?;
        let is_alive = self.liveness.is_alive(&session, self.clock.now()).await?;

        Ok(WorkerStatusView {
            session,
            live_state,
            assignments,
            recent_events,
            is_alive,
        })
    }

    pub async fn delete_worker(&self, session_id: &str) -> CoordinatorResult<DeletedWorker> {
        let reset_assignments = self.lease_manager.delete_worker(session_id).await?;
        Ok(DeletedWorker {
            session_id: session_id.to_string(),
            reset_assignments,
        })
    }

    /// 会话列表，附带其待处理和运行中的作业
    pub async fn list_workers(&self, include_stale: bool) -> CoordinatorResult<Vec<WorkerOverview>> {
        let now = self.clock.now();
        let sessions = self.store.workers.list(include_stale).await?;
        let mut overviews = Vec::with_capacity(sessions.len());

        for session in sessions {
            let assignments: Vec<Assignment> = self
                .store
                .assignments
                .list_by_worker(&session.id)
                .await?
                .into_iter()
                .filter(|a| {
                    matches!(a.status, AssignmentStatus::Pending | AssignmentStatus::Running)
                })
                .collect();
            let is_alive = self.liveness.is_alive(&session, now).await?;
            overviews.push(WorkerOverview {
                session,
                assignments,
                is_alive,
            });
        }

        Ok(overviews)
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_super_study(
        &self,
        request: NewSuperStudy,
    ) -> CoordinatorResult<CreatedSuperStudy> {
        request.validate()?;
        let now = self.clock.now();
        let total = i32::try_from(request.assignments.len())
            .map_err(|_| CoordinatorError::validation("作业数量过多"))?;

        let super_study = SuperStudy::new(
            request.name.trim(),
            request.description.as_deref().unwrap_or_default(),
            request.base_config,
            total,
            now,
        );
        let assignments: Vec<Assignment> = request
            .assignments
            .into_iter()
            .zip(0..)
            .map(|(config, index)| Assignment::new(&super_study.id, index, config))
            .collect();

        self.store
            .super_studies
            .create_with_assignments(&super_study, &assignments)
            .await?;
        info!(
            "创建研究批次 {} ({})，共 {} 个作业",
            super_study.name, super_study.id, total
        );

        Ok(CreatedSuperStudy {
            super_study,
            assignments,
        })
    }

    pub async fn list_super_studies(
        &self,
        name_filter: Option<&str>,
    ) -> CoordinatorResult<Vec<SuperStudy>> {
        let filter = name_filter.map(str::trim).filter(|f| !f.is_empty());
        self.store.super_studies.list(filter).await
    }

    pub async fn delete_super_study(&self, super_study_id: &str) -> CoordinatorResult<()> {
        if !self.store.super_studies.delete(super_study_id).await? {
            return Err(CoordinatorError::SuperStudyNotFound {
                id: super_study_id.to_string(),
            });
        }
        info!("研究批次 {} 已删除", super_study_id);
        Ok(())
    }

    pub async fn health_check(&self) -> CoordinatorResult<()> {
        self.store.health.ping().await
    }
}
