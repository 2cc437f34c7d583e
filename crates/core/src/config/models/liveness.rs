use chrono::Duration;
use serde::{Deserialize, Serialize};

/// 会话存活判定与身份接管窗口
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// 空闲会话超时（秒）
    pub idle_timeout_seconds: i64,
    /// 持有运行中作业的会话超时（秒）
    pub running_timeout_seconds: i64,
    /// 仅由领取创建、从未心跳的临时会话超时（秒）
    pub provisional_timeout_seconds: i64,
    /// 接管无主机名领取会话的时间窗口（秒）
    pub claimant_adoption_window_seconds: i64,
    /// 按主机名接管会话的时间窗口（秒）
    pub hostname_adoption_window_seconds: i64,
    /// 心跳查询中判定离线的静默时长（秒）
    pub offline_after_seconds: i64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            idle_timeout_seconds: 15,
            running_timeout_seconds: 60,
            provisional_timeout_seconds: 300,
            claimant_adoption_window_seconds: 120,
            hostname_adoption_window_seconds: 300,
            offline_after_seconds: 30,
        }
    }
}

impl LivenessConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::seconds(self.idle_timeout_seconds)
    }

    pub fn running_timeout(&self) -> Duration {
        Duration::seconds(self.running_timeout_seconds)
    }

    pub fn provisional_timeout(&self) -> Duration {
        Duration::seconds(self.provisional_timeout_seconds)
    }

    pub fn claimant_adoption_window(&self) -> Duration {
        Duration::seconds(self.claimant_adoption_window_seconds)
    }

    pub fn hostname_adoption_window(&self) -> Duration {
        Duration::seconds(self.hostname_adoption_window_seconds)
    }

    pub fn offline_after(&self) -> Duration {
        Duration::seconds(self.offline_after_seconds)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let windows = [
            ("idle_timeout_seconds", self.idle_timeout_seconds),
            ("running_timeout_seconds", self.running_timeout_seconds),
            ("provisional_timeout_seconds", self.provisional_timeout_seconds),
            (
                "claimant_adoption_window_seconds",
                self.claimant_adoption_window_seconds,
            ),
            (
                "hostname_adoption_window_seconds",
                self.hostname_adoption_window_seconds,
            ),
            ("offline_after_seconds", self.offline_after_seconds),
        ];
        for (name, value) in windows {
            if value <= 0 {
                return Err(anyhow::anyhow!("{} 必须大于0", name));
            }
        }

        if self.running_timeout_seconds < self.idle_timeout_seconds {
            return Err(anyhow::anyhow!("运行中会话超时不能小于空闲会话超时"));
        }

        Ok(())
    }
}

/// 读路径对账配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// 是否把对账得出的修正写回存储
    pub write_back: bool,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self { write_back: true }
    }
}
