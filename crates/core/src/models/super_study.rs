use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CoordinatorError;

/// 研究批次状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SuperStudyStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "COMPLETED")]
    Completed,
}

impl_text_enum!(SuperStudyStatus, "研究批次状态", {
    Pending => "PENDING",
    Running => "RUNNING",
    Completed => "COMPLETED",
});

/// 研究批次
///
/// `completed_assignments`、`master_progress`、`status` 只能由汇总计算写入。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperStudy {
    pub id: String,
    pub name: String,
    pub description: String,
    pub base_config: Option<serde_json::Value>,
    pub total_assignments: i32,
    pub completed_assignments: i32,
    pub master_progress: f64,
    pub status: SuperStudyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 创建研究批次的请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSuperStudy {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub base_config: Option<serde_json::Value>,
    /// 按序号排列的作业配置
    pub assignments: Vec<serde_json::Value>,
}

impl NewSuperStudy {
    pub fn validate(&self) -> Result<(), CoordinatorError> {
        if self.name.trim().is_empty() {
            return Err(CoordinatorError::validation("研究批次名称不能为空"));
        }
        Ok(())
    }
}

impl SuperStudy {
    pub fn new(
        name: &str,
        description: &str,
        base_config: Option<serde_json::Value>,
        total_assignments: i32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            base_config,
            total_assignments,
            completed_assignments: 0,
            master_progress: 0.0,
            status: SuperStudyStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status == SuperStudyStatus::Completed
    }
}
