use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::WorkerStatus;

/// 实时日志保留条数
pub const LIVE_LOG_CAPACITY: usize = 100;

/// 默认日志类型
pub const DEFAULT_LOG_TYPE: &str = "default";

/// 一条实时日志
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub message: String,
    pub log_type: String,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(message: &str, log_type: Option<&str>, timestamp: DateTime<Utc>) -> Self {
        Self {
            message: message.to_string(),
            log_type: log_type
                .filter(|t| !t.is_empty())
                .unwrap_or(DEFAULT_LOG_TYPE)
                .to_string(),
            timestamp,
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self.log_type.as_str(), "warning" | "highlight")
    }

    pub fn is_error(&self) -> bool {
        matches!(self.log_type.as_str(), "error" | "fatal")
    }
}

/// 活跃会话的实时状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveState {
    pub worker_id: String,
    pub status: WorkerStatus,
    pub stage: String,
    pub progress: f64,
    pub stage_progress: f64,
    pub log_messages: VecDeque<LogEntry>,
    /// 累计告警数，不随日志淘汰而减少
    pub warning_count: i64,
    /// 累计错误数，不随日志淘汰而减少
    pub error_count: i64,
    pub eta: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl LiveState {
    pub fn new(worker_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            worker_id: worker_id.to_string(),
            status: WorkerStatus::Idle,
            stage: String::new(),
            progress: 0.0,
            stage_progress: 0.0,
            log_messages: VecDeque::with_capacity(LIVE_LOG_CAPACITY),
            warning_count: 0,
            error_count: 0,
            eta: None,
            updated_at: now,
        }
    }

    /// 追加日志，超过容量时淘汰最旧的条目
    pub fn push_log(&mut self, entry: LogEntry) {
        if entry.is_warning() {
            self.warning_count += 1;
        }
        if entry.is_error() {
            self.error_count += 1;
        }
        self.log_messages.push_back(entry);
        while self.log_messages.len() > LIVE_LOG_CAPACITY {
            self.log_messages.pop_front();
        }
    }
}
