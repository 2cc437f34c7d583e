use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::{debug, info, instrument, warn};

use coordinator_core::{
    config::LivenessConfig, Clock, CoordinatorResult, CoordinatorStore, HardwareInfo,
    WorkerSession, WorkerStatus,
};

use crate::liveness::LivenessTracker;

/// 联系的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactKind {
    Heartbeat,
    Claim,
    Progress,
}

/// 一次入站联系
#[derive(Debug, Clone)]
pub struct Contact<'a> {
    pub network_id: &'a str,
    pub hostname: Option<&'a str>,
    pub hardware: Option<&'a HardwareInfo>,
    pub kind: ContactKind,
}

impl<'a> Contact<'a> {
    pub fn heartbeat(
        network_id: &'a str,
        hostname: Option<&'a str>,
        hardware: Option<&'a HardwareInfo>,
    ) -> Self {
        Self {
            network_id,
            hostname,
            hardware,
            kind: ContactKind::Heartbeat,
        }
    }

    pub fn claim(network_id: &'a str) -> Self {
        Self {
            network_id,
            hostname: None,
            hardware: None,
            kind: ContactKind::Claim,
        }
    }

    pub fn progress(network_id: &'a str) -> Self {
        Self {
            network_id,
            hostname: None,
            hardware: None,
            kind: ContactKind::Progress,
        }
    }

    fn named_host(&self) -> Option<&'a str> {
        self.hostname.filter(|h| !h.trim().is_empty())
    }
}

/// 身份解析结果
#[derive(Debug, Clone)]
pub struct Resolution {
    pub session: WorkerSession,
    pub is_new: bool,
    /// 本次联系使之过期的旧会话
    pub retired_sessions: Vec<String>,
    /// 转移到新会话的运行中作业
    pub transferred_assignments: Vec<String>,
}

impl Resolution {
    fn existing(session: WorkerSession, retired_sessions: Vec<String>) -> Self {
        Self {
            session,
            is_new: false,
            retired_sessions,
            transferred_assignments: Vec::new(),
        }
    }
}

/// Worker身份解析器
///
/// 按优先级把入站联系归属到一个会话：
/// 1. 同网络标识的活跃会话（超时则标记过期并继续）
/// 2. 近期由领取创建、无主机名且持有运行中作业的会话
/// 3. 同主机名近期联系过的会话
/// 4. 新建会话，并把同网络标识或同主机名的过期会话上的运行中作业转移过来
pub struct IdentityResolver {
    store: CoordinatorStore,
    liveness: Arc<LivenessTracker>,
    clock: Arc<dyn Clock>,
    config: LivenessConfig,
}

impl IdentityResolver {
    pub fn new(
        store: CoordinatorStore,
        liveness: Arc<LivenessTracker>,
        clock: Arc<dyn Clock>,
        config: Option<LivenessConfig>,
    ) -> Self {
        Self {
            store,
            liveness,
            clock,
            config: config.unwrap_or_default(),
        }
    }

    #[instrument(skip(self, contact), fields(network_id = %contact.network_id, kind = ?contact.kind))]
    pub async fn resolve(&self, contact: Contact<'_>) -> CoordinatorResult<Resolution> {
        let now = self.clock.now();
        let mut retired = Vec::new();

        if let Some(session) = self
            .store
            .workers
            .find_active_by_network_id(contact.network_id)
            .await?
        {
            if self.liveness.expire_if_silent(&session, now).await? {
                retired.push(session.id.clone());
            } else {
                let session = self.touch(session, &contact, now).await?;
                debug!("联系归属到已有会话 {}", session.id);
                return Ok(Resolution::existing(session, retired));
            }
        }

        if let Some(hostname) = contact.named_host() {
            if let Some(session) = self.adopt_unnamed_claimant(&contact, hostname, now).await? {
                return Ok(Resolution::existing(session, retired));
            }

            if let Some(session) = self.adopt_by_hostname(&contact, hostname, now).await? {
                return Ok(Resolution::existing(session, retired));
            }
        }

        self.create_session(&contact, now, retired).await
    }

    /// 刷新联系时间；心跳和进度上报还会合并主机信息并清除临时标记
    async fn touch(
        &self,
        mut session: WorkerSession,
        contact: &Contact<'_>,
        now: DateTime<Utc>,
    ) -> CoordinatorResult<WorkerSession> {
        match contact.kind {
            ContactKind::Claim => session.last_seen = now,
            ContactKind::Heartbeat | ContactKind::Progress => {
                let hardware = contact.hardware.cloned().unwrap_or_default();
                session.record_heartbeat(contact.named_host(), &hardware, now);
            }
        }
        self.store.workers.update(&session).await?;
        Ok(session)
    }

    async fn adopt_unnamed_claimant(
        &self,
        contact: &Contact<'_>,
        hostname: &str,
        now: DateTime<Utc>,
    ) -> CoordinatorResult<Option<WorkerSession>> {
        let since = now - self.config.claimant_adoption_window();
        let candidates = self.store.workers.find_unnamed_created_since(since).await?;

        for mut candidate in candidates {
            let running = self
                .store
                .assignments
                .find_running_by_worker(&candidate.id)
                .await?;
            if running.is_empty() {
                continue;
            }

            info!(
                "主机 {} ({}) 接管领取时创建的会话 {} ({})",
                hostname, contact.network_id, candidate.id, candidate.network_id
            );
            candidate.network_id = contact.network_id.to_string();
            candidate.hostname = Some(hostname.to_string());
            let session = self.touch(candidate, contact, now).await?;
            return Ok(Some(session));
        }

        Ok(None)
    }

    async fn adopt_by_hostname(
        &self,
        contact: &Contact<'_>,
        hostname: &str,
        now: DateTime<Utc>,
    ) -> CoordinatorResult<Option<WorkerSession>> {
        let since = now - self.config.hostname_adoption_window();
        let Some(mut session) = self
            .store
            .workers
            .find_active_by_hostname_seen_since(hostname, since)
            .await?
        else {
            return Ok(None);
        };

        info!(
            "主机 {} 的网络标识变更: {} -> {}，沿用会话 {}",
            hostname, session.network_id, contact.network_id, session.id
        );
        session.network_id = contact.network_id.to_string();
        let session = self.touch(session, contact, now).await?;
        Ok(Some(session))
    }

    async fn create_session(
        &self,
        contact: &Contact<'_>,
        now: DateTime<Utc>,
        mut retired: Vec<String>,
    ) -> CoordinatorResult<Resolution> {
        let mut session = match contact.kind {
            ContactKind::Claim => WorkerSession::provisional(contact.network_id, now),
            ContactKind::Heartbeat | ContactKind::Progress => {
                let mut session = WorkerSession::new(contact.network_id, contact.named_host(), now);
                if let Some(hardware) = contact.hardware {
                    session.hardware.merge(hardware);
                }
                session
            }
        };
        let session_id = session.id.clone();

        self.store.workers.create(&session).await?;
        counter!("coordinator_sessions_created_total").increment(1);
        info!(
            "为 {} 创建新会话 {} (provisional: {})",
            contact.network_id, session_id, session.provisional
        );

        let superseded = self
            .store
            .workers
            .supersede(contact.network_id, &session_id)
            .await?;
        if !superseded.is_empty() {
            info!("新会话 {} 取代了旧会话 {:?}", session_id, superseded);
        }
        for id in superseded {
            if !retired.contains(&id) {
                retired.push(id);
            }
        }

        for id in &retired {
            if let Err(e) = self.store.live_states.delete(id).await {
                warn!("清理旧会话 {} 的实时状态失败: {}", id, e);
            }
        }

        let stale_ids: Vec<String> = self
            .store
            .workers
            .find_stale_by_network_or_hostname(contact.network_id, session.hostname.as_deref())
            .await?
            .into_iter()
            .map(|s| s.id)
            .filter(|id| id != &session_id)
            .collect();

        let transferred = if stale_ids.is_empty() {
            Vec::new()
        } else {
            self.store
                .assignments
                .transfer_running(&stale_ids, &session_id)
                .await?
        };

        if !transferred.is_empty() {
            info!(
                "租约转移: {} 个运行中作业转移到新会话 {}: {:?}",
                transferred.len(),
                session_id,
                transferred
            );
            counter!("coordinator_lease_transfers_total").increment(transferred.len() as u64);
            session.status = WorkerStatus::Running;
            self.store.workers.update(&session).await?;
        }

        Ok(Resolution {
            session,
            is_new: true,
            retired_sessions: retired,
            transferred_assignments: transferred,
        })
    }
}
