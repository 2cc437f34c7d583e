use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use coordinator_core::{
    config::LivenessConfig, CoordinatorResult, CoordinatorStore, WorkerSession, WorkerStatus,
};

/// 会话适用的超时档位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessTier {
    /// 无运行中作业且状态不是 RUNNING
    Idle,
    /// 持有运行中作业或状态为 RUNNING
    Running,
    /// 由领取创建、从未收到心跳
    Provisional,
}

/// 纯粹的存活判定规则
#[derive(Debug, Clone)]
pub struct LivenessPolicy {
    config: LivenessConfig,
}

impl LivenessPolicy {
    pub fn new(config: LivenessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LivenessConfig {
        &self.config
    }

    /// 越具体的档位优先：临时会话 > 运行中 > 空闲
    pub fn tier(&self, session: &WorkerSession, running_assignments: usize) -> LivenessTier {
        if session.provisional {
            LivenessTier::Provisional
        } else if running_assignments > 0 || session.status == WorkerStatus::Running {
            LivenessTier::Running
        } else {
            LivenessTier::Idle
        }
    }

    pub fn timeout(&self, tier: LivenessTier) -> Duration {
        match tier {
            LivenessTier::Idle => self.config.idle_timeout(),
            LivenessTier::Running => self.config.running_timeout(),
            LivenessTier::Provisional => self.config.provisional_timeout(),
        }
    }

    /// 最后联系时间是否已超出所在档位的超时
    pub fn is_expired(
        &self,
        session: &WorkerSession,
        running_assignments: usize,
        now: DateTime<Utc>,
    ) -> bool {
        let tier = self.tier(session, running_assignments);
        session.silence(now) > self.timeout(tier)
    }

    /// 心跳查询使用的离线判定
    pub fn is_offline(&self, session: &WorkerSession, now: DateTime<Utc>) -> bool {
        session.silence(now) > self.config.offline_after()
    }
}

/// 存活跟踪：在联系路径上惰性地判定并持久化过期
pub struct LivenessTracker {
    store: CoordinatorStore,
    policy: LivenessPolicy,
}

impl LivenessTracker {
    pub fn new(store: CoordinatorStore, config: Option<LivenessConfig>) -> Self {
        Self {
            store,
            policy: LivenessPolicy::new(config.unwrap_or_default()),
        }
    }

    pub fn policy(&self) -> &LivenessPolicy {
        &self.policy
    }

    async fn running_count(&self, session_id: &str) -> CoordinatorResult<usize> {
        Ok(self
            .store
            .assignments
            .find_running_by_worker(session_id)
            .await?
            .len())
    }

    /// 会话超时则标记为过期，返回是否已过期
    ///
    /// 只改会话的过期标记，不触碰其持有的作业。
    pub async fn expire_if_silent(
        &self,
        session: &WorkerSession,
        now: DateTime<Utc>,
    ) -> CoordinatorResult<bool> {
        if session.is_stale {
            return Ok(true);
        }

        let running = self.running_count(&session.id).await?;
        if !self.policy.is_expired(session, running, now) {
            return Ok(false);
        }

        let tier = self.policy.tier(session, running);
        info!(
            "会话 {} ({}) 已超时 {} 秒 ({:?})，标记为过期",
            session.id,
            session.network_id,
            session.silence(now).num_seconds(),
            tier
        );
        self.store.workers.mark_stale(&session.id).await?;
        Ok(true)
    }

    /// 读路径上的存活判定，不写存储
    pub async fn is_alive(
        &self,
        session: &WorkerSession,
        now: DateTime<Utc>,
    ) -> CoordinatorResult<bool> {
        if session.is_stale {
            return Ok(false);
        }
        let running = self.running_count(&session.id).await?;
        let alive = !self.policy.is_expired(session, running, now);
        debug!("会话 {} 存活判定: {}", session.id, alive);
        Ok(alive)
    }
}
