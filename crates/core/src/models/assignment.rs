use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 作业生命周期状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AssignmentStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
}

impl_text_enum!(AssignmentStatus, "作业状态", {
    Pending => "PENDING",
    Running => "RUNNING",
    Completed => "COMPLETED",
    Failed => "FAILED",
});

/// 研究批次中的一个作业
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub super_study_id: String,
    pub index: i32,
    pub status: AssignmentStatus,
    pub worker_id: Option<String>,
    pub progress: f64,
    pub current_stage: Option<String>,
    pub eta: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// 作业专属配置，协调器不解析
    pub config: serde_json::Value,
}

impl Assignment {
    pub fn new(super_study_id: &str, index: i32, config: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            super_study_id: super_study_id.to_string(),
            index,
            status: AssignmentStatus::Pending,
            worker_id: None,
            progress: 0.0,
            current_stage: None,
            eta: None,
            started_at: None,
            completed_at: None,
            config,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status, AssignmentStatus::Running)
    }

    pub fn is_owned_by(&self, worker_id: &str) -> bool {
        self.worker_id.as_deref() == Some(worker_id)
    }

    /// 将作业租给指定会话
    pub fn claim(&mut self, worker_id: &str, now: DateTime<Utc>) {
        self.status = AssignmentStatus::Running;
        self.worker_id = Some(worker_id.to_string());
        self.started_at = Some(now);
    }

    pub fn complete(&mut self, completed_at: DateTime<Utc>) {
        self.status = AssignmentStatus::Completed;
        self.completed_at = Some(completed_at);
        self.progress = 100.0;
    }

    pub fn fail(&mut self) {
        self.status = AssignmentStatus::Failed;
    }

    /// 解除分配：清空Worker引用并回到初始状态
    pub fn reset(&mut self) {
        self.status = AssignmentStatus::Pending;
        self.worker_id = None;
        self.progress = 0.0;
        self.current_stage = None;
        self.eta = None;
        self.started_at = None;
        self.completed_at = None;
    }
}
