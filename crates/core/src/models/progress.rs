use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::WorkerStatus;

/// 审计事件消息的最大字符数
pub const EVENT_MESSAGE_MAX_CHARS: usize = 500;

/// Worker上报的进度消息
///
/// 以 `type` 字段区分变体，例如 `{"type":"overall_progress","current":50,"total":100}`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressReport {
    OverallProgress {
        current: f64,
        total: f64,
    },
    StageProgress {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        current: Option<f64>,
        #[serde(default)]
        total: Option<f64>,
    },
    Status {
        message: String,
        #[serde(default)]
        log_type: Option<String>,
    },
    ProfilerUpdate {
        eta_seconds: f64,
    },
    Finished {
        #[serde(default)]
        message: Option<String>,
    },
    FatalError {
        #[serde(default)]
        message: Option<String>,
    },
}

/// 计算百分比，分母非法时返回 `None`
pub fn percent(current: f64, total: f64) -> Option<f64> {
    if !current.is_finite() || !total.is_finite() || total <= 0.0 {
        return None;
    }
    Some((100.0 * current / total).clamp(0.0, 100.0))
}

impl ProgressReport {
    /// 该上报隐含的会话状态，日志和ETA上报不改变状态
    pub fn implied_status(&self) -> Option<WorkerStatus> {
        match self {
            ProgressReport::OverallProgress { .. } | ProgressReport::StageProgress { .. } => {
                Some(WorkerStatus::Running)
            }
            ProgressReport::Finished { .. } => Some(WorkerStatus::Idle),
            ProgressReport::FatalError { .. } => Some(WorkerStatus::Error),
            ProgressReport::Status { .. } | ProgressReport::ProfilerUpdate { .. } => None,
        }
    }

    pub fn event_type(&self) -> ProgressEventType {
        match self {
            ProgressReport::OverallProgress { .. } => ProgressEventType::Progress,
            ProgressReport::StageProgress { .. } => ProgressEventType::StageChange,
            ProgressReport::Status { .. } => ProgressEventType::Log,
            ProgressReport::ProfilerUpdate { .. } => ProgressEventType::EtaUpdate,
            ProgressReport::Finished { .. } => ProgressEventType::Finished,
            ProgressReport::FatalError { .. } => ProgressEventType::Error,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ProgressReport::OverallProgress { .. } => "overall_progress",
            ProgressReport::StageProgress { .. } => "stage_progress",
            ProgressReport::Status { .. } => "status",
            ProgressReport::ProfilerUpdate { .. } => "profiler_update",
            ProgressReport::Finished { .. } => "finished",
            ProgressReport::FatalError { .. } => "fatal_error",
        }
    }

    /// 用于审计记录的可读描述
    pub fn describe(&self) -> String {
        match self {
            ProgressReport::OverallProgress { current, total } => {
                format!("总体进度 {current}/{total}")
            }
            ProgressReport::StageProgress { name, .. } => match name {
                Some(name) => format!("阶段: {name}"),
                None => "阶段进度更新".to_string(),
            },
            ProgressReport::Status { message, .. } => message.clone(),
            ProgressReport::ProfilerUpdate { eta_seconds } => {
                format!("预计剩余 {eta_seconds} 秒")
            }
            ProgressReport::Finished { message } => {
                message.clone().unwrap_or_else(|| "作业完成".to_string())
            }
            ProgressReport::FatalError { message } => {
                message.clone().unwrap_or_else(|| "致命错误".to_string())
            }
        }
    }
}

/// 审计事件类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProgressEventType {
    #[serde(rename = "PROGRESS")]
    Progress,
    #[serde(rename = "STAGE_CHANGE")]
    StageChange,
    #[serde(rename = "LOG")]
    Log,
    #[serde(rename = "ETA_UPDATE")]
    EtaUpdate,
    #[serde(rename = "FINISHED")]
    Finished,
    #[serde(rename = "ERROR")]
    Error,
}

impl_text_enum!(ProgressEventType, "进度事件类型", {
    Progress => "PROGRESS",
    StageChange => "STAGE_CHANGE",
    Log => "LOG",
    EtaUpdate => "ETA_UPDATE",
    Finished => "FINISHED",
    Error => "ERROR",
});

/// 进度审计记录，仅追加
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub id: String,
    pub worker_id: String,
    pub assignment_id: Option<String>,
    pub event_type: ProgressEventType,
    pub message: String,
    pub stage: Option<String>,
    pub progress: Option<f64>,
    pub eta: Option<DateTime<Utc>>,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn from_report(
        worker_id: &str,
        assignment_id: Option<&str>,
        report: &ProgressReport,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            worker_id: worker_id.to_string(),
            assignment_id: assignment_id.map(str::to_string),
            event_type: report.event_type(),
            message: report.describe().chars().take(EVENT_MESSAGE_MAX_CHARS).collect(),
            stage: None,
            progress: None,
            eta: None,
            data: serde_json::to_value(report).unwrap_or(serde_json::Value::Null),
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_tagged_reports() {
        let report: ProgressReport =
            serde_json::from_value(json!({"type": "overall_progress", "current": 5, "total": 10}))
                .unwrap();
        assert_eq!(
            report,
            ProgressReport::OverallProgress {
                current: 5.0,
                total: 10.0
            }
        );

        let report: ProgressReport =
            serde_json::from_value(json!({"type": "status", "message": "hi", "log_type": "warning"}))
                .unwrap();
        assert_eq!(report.event_type(), ProgressEventType::Log);
        assert_eq!(report.implied_status(), None);

        let report: ProgressReport = serde_json::from_value(json!({"type": "finished"})).unwrap();
        assert_eq!(report.implied_status(), Some(WorkerStatus::Idle));

        assert!(serde_json::from_value::<ProgressReport>(json!({"type": "bogus"})).is_err());
    }

    #[test]
    fn test_percent_clamps() {
        assert_eq!(percent(50.0, 100.0), Some(50.0));
        assert_eq!(percent(150.0, 100.0), Some(100.0));
        assert_eq!(percent(-1.0, 100.0), Some(0.0));
        assert_eq!(percent(1.0, 0.0), None);
        assert_eq!(percent(f64::NAN, 10.0), None);
    }

    #[test]
    fn test_event_message_truncated() {
        let long = "x".repeat(800);
        let report = ProgressReport::Status {
            message: long,
            log_type: None,
        };
        let event = ProgressEvent::from_report("w", None, &report, Utc::now());
        assert_eq!(event.message.chars().count(), EVENT_MESSAGE_MAX_CHARS);
    }
}
