use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Worker机器硬件描述
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareInfo {
    pub gpu_name: Option<String>,
    pub cpu_cores: Option<i32>,
    #[serde(rename = "totalRamGB")]
    pub total_ram_gb: Option<f64>,
}

impl HardwareInfo {
    pub fn is_empty(&self) -> bool {
        self.gpu_name.is_none() && self.cpu_cores.is_none() && self.total_ram_gb.is_none()
    }

    /// 合并新上报的硬件信息，缺失字段保留原值
    pub fn merge(&mut self, reported: &HardwareInfo) {
        if let Some(gpu) = reported.gpu_name.as_ref().filter(|g| !g.is_empty()) {
            self.gpu_name = Some(gpu.clone());
        }
        if reported.cpu_cores.is_some() {
            self.cpu_cores = reported.cpu_cores;
        }
        if reported.total_ram_gb.is_some() {
            self.total_ram_gb = reported.total_ram_gb;
        }
    }
}

/// Worker会话的执行状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum WorkerStatus {
    #[serde(rename = "IDLE")]
    Idle,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "ERROR")]
    Error,
    #[serde(rename = "OFFLINE")]
    Offline,
}

impl_text_enum!(WorkerStatus, "Worker状态", {
    Idle => "IDLE",
    Running => "RUNNING",
    Error => "ERROR",
    Offline => "OFFLINE",
});

/// Worker会话：一台机器的一个连接周期
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSession {
    pub id: String,
    pub network_id: String,
    pub hostname: Option<String>,
    #[serde(flatten)]
    pub hardware: HardwareInfo,
    pub status: WorkerStatus,
    pub is_stale: bool,
    /// 由领取请求创建、尚未收到心跳的临时会话
    pub provisional: bool,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl WorkerSession {
    /// 创建新的会话
    pub fn new(network_id: &str, hostname: Option<&str>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            network_id: network_id.to_string(),
            hostname: hostname.filter(|h| !h.is_empty()).map(str::to_string),
            hardware: HardwareInfo::default(),
            status: WorkerStatus::Idle,
            is_stale: false,
            provisional: false,
            last_seen: now,
            created_at: now,
        }
    }

    /// 创建领取路径上的临时会话
    pub fn provisional(network_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            provisional: true,
            ..Self::new(network_id, None, now)
        }
    }

    pub fn has_hostname(&self) -> bool {
        self.hostname.as_deref().is_some_and(|h| !h.is_empty())
    }

    /// 距离上次联系经过的时间
    pub fn silence(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_seen
    }

    /// 记录一次心跳：刷新最后联系时间并合并主机信息
    pub fn record_heartbeat(
        &mut self,
        hostname: Option<&str>,
        hardware: &HardwareInfo,
        now: DateTime<Utc>,
    ) {
        if let Some(hostname) = hostname.filter(|h| !h.is_empty()) {
            self.hostname = Some(hostname.to_string());
        }
        self.hardware.merge(hardware);
        self.provisional = false;
        self.last_seen = now;
    }
}

/// 心跳响应摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub network_id: String,
    pub hostname: Option<String>,
    pub status: WorkerStatus,
    pub is_new_session: bool,
    pub superseded_sessions: Vec<String>,
    pub transferred_assignments: Vec<String>,
    pub timestamp: DateTime<Utc>,
}
