use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use coordinator_core::{
    models::percent, Assignment, Clock, CoordinatorError, CoordinatorResult, CoordinatorStore,
    LiveState, LogEntry, ProgressEvent, ProgressReport, WorkerStatus,
};

use crate::identity::{Contact, IdentityResolver};
use crate::lease_manager::LeaseManager;
use crate::rollup::RollupAggregator;

/// 一次进度上报的处理结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    pub session_id: String,
    pub assignment_id: Option<String>,
    pub status: WorkerStatus,
    pub report_type: &'static str,
}

/// 剩余秒数换算为预计完成时刻，超出可表示范围时返回 `None`
fn eta_after(now: DateTime<Utc>, eta_seconds: f64) -> Option<DateTime<Utc>> {
    if !eta_seconds.is_finite() || eta_seconds < 0.0 {
        return None;
    }
    let remaining = Duration::try_milliseconds((eta_seconds * 1000.0) as i64)?;
    now.checked_add_signed(remaining)
}

/// 将一条上报合并进实时状态
///
/// `logged_at` 是日志条目使用的时间，上报自带时间戳时以它为准。
pub fn merge_report(
    live: &mut LiveState,
    report: &ProgressReport,
    now: DateTime<Utc>,
    logged_at: DateTime<Utc>,
) {
    match report {
        ProgressReport::OverallProgress { current, total } => {
            if let Some(progress) = percent(*current, *total) {
                live.progress = progress;
            }
        }
        ProgressReport::StageProgress {
            name,
            current,
            total,
        } => {
            if let Some(name) = name.as_deref().filter(|n| !n.is_empty()) {
                live.stage = name.to_string();
            }
            if let (Some(current), Some(total)) = (current, total) {
                if let Some(progress) = percent(*current, *total) {
                    live.stage_progress = progress;
                }
            }
        }
        ProgressReport::Status { message, log_type } => {
            live.push_log(LogEntry::new(message, log_type.as_deref(), logged_at));
        }
        ProgressReport::ProfilerUpdate { eta_seconds } => {
            if let Some(eta) = eta_after(now, *eta_seconds) {
                live.eta = Some(eta);
            }
        }
        ProgressReport::Finished { .. } => {}
        ProgressReport::FatalError { message } => {
            if let Some(message) = message.as_deref().filter(|m| !m.is_empty()) {
                live.push_log(LogEntry::new(message, Some("fatal"), logged_at));
            }
        }
    }

    if let Some(status) = report.implied_status() {
        live.status = status;
    }
    live.updated_at = now;
}

/// 把实时状态投影到会话当前运行的作业上，返回是否有变化
pub fn project_into_assignment(
    assignment: &mut Assignment,
    report: &ProgressReport,
    live: &LiveState,
) -> bool {
    match report {
        ProgressReport::OverallProgress { .. } => {
            let changed = assignment.progress != live.progress;
            assignment.progress = live.progress;
            changed
        }
        ProgressReport::StageProgress { name: Some(_), .. } if !live.stage.is_empty() => {
            let changed = assignment.current_stage.as_deref() != Some(live.stage.as_str());
            assignment.current_stage = Some(live.stage.clone());
            changed
        }
        ProgressReport::ProfilerUpdate { .. } => {
            let changed = assignment.eta != live.eta;
            assignment.eta = live.eta;
            changed
        }
        _ => false,
    }
}

/// 进度上报处理
pub struct ProgressIngestor {
    store: CoordinatorStore,
    identity: Arc<IdentityResolver>,
    lease_manager: Arc<LeaseManager>,
    rollup: Arc<RollupAggregator>,
    clock: Arc<dyn Clock>,
}

impl ProgressIngestor {
    pub fn new(
        store: CoordinatorStore,
        identity: Arc<IdentityResolver>,
        lease_manager: Arc<LeaseManager>,
        rollup: Arc<RollupAggregator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            identity,
            lease_manager,
            rollup,
            clock,
        }
    }

    #[instrument(skip(self, report), fields(report_type = report.type_name()))]
    pub async fn ingest(
        &self,
        network_id: &str,
        report: &ProgressReport,
        reported_at: Option<DateTime<Utc>>,
    ) -> CoordinatorResult<IngestOutcome> {
        if network_id.trim().is_empty() {
            return Err(CoordinatorError::validation("networkId 不能为空"));
        }

        let resolution = self.identity.resolve(Contact::progress(network_id)).await?;
        let mut session = resolution.session;
        let now = self.clock.now();

        let mut running = self
            .store
            .assignments
            .find_running_by_worker(&session.id)
            .await?
            .into_iter()
            .next();

        let mut live = match self.store.live_states.get(&session.id).await {
            Ok(Some(live)) => live,
            Ok(None) => LiveState::new(&session.id, now),
            Err(e) => {
                warn!("读取会话 {} 的实时状态失败，按空状态处理: {}", session.id, e);
                LiveState::new(&session.id, now)
            }
        };
        merge_report(&mut live, report, now, reported_at.unwrap_or(now));

        if let Err(e) = self.store.live_states.upsert(&live).await {
            warn!("写入会话 {} 的实时状态失败: {}", session.id, e);
        }

        match report {
            ProgressReport::Finished { .. } => {
                self.lease_manager.report_finished(&session.id).await?;
            }
            ProgressReport::FatalError { .. } => {
                self.lease_manager.report_fatal_error(&session.id).await?;
            }
            _ => {
                if let Some(status) = report.implied_status() {
                    if session.status != status {
                        session.status = status;
                        self.store.workers.update(&session).await?;
                    }
                }

                if let Some(assignment) = running.as_mut() {
                    if project_into_assignment(assignment, report, &live) {
                        self.store.assignments.update(assignment).await?;
                    }
                    if let Err(e) = self.rollup.recompute(&assignment.super_study_id).await {
                        warn!(
                            "重新计算研究批次 {} 的汇总失败: {}",
                            assignment.super_study_id, e
                        );
                    }
                }
            }
        }

        let assignment_id = running.as_ref().map(|a| a.id.clone());
        self.record_event(&live, assignment_id.as_deref(), report, now)
            .await;

        counter!("coordinator_progress_reports_total", "type" => report.type_name()).increment(1);
        debug!(
            "会话 {} 的 {} 上报已处理 (进度 {:.1}%)",
            session.id,
            report.type_name(),
            live.progress
        );

        Ok(IngestOutcome {
            session_id: session.id,
            assignment_id,
            status: live.status,
            report_type: report.type_name(),
        })
    }

    async fn record_event(
        &self,
        live: &LiveState,
        assignment_id: Option<&str>,
        report: &ProgressReport,
        now: DateTime<Utc>,
    ) {
        let mut event = ProgressEvent::from_report(&live.worker_id, assignment_id, report, now);
        event.stage = Some(live.stage.clone()).filter(|s| !s.is_empty());
        event.progress = Some(live.progress);
        event.eta = live.eta;

        if let Err(e) = self.store.events.record(&event).await {
            warn!("记录会话 {} 的进度事件失败: {}", live.worker_id, e);
        }
    }
}
