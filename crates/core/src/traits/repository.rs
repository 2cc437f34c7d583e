//! 持久化存储接口
//!
//! 协调引擎只通过这里定义的仓储接口访问存储：
//! - `WorkerRepository` - Worker会话的创建、查找和过期标记
//! - `AssignmentRepository` - 作业租约的读写与转移
//! - `SuperStudyRepository` - 研究批次及其作业的原子创建和汇总字段写入
//! - `LiveStateRepository` - 每个活跃会话的实时状态
//! - `ProgressEventRepository` - 进度审计记录
//!
//! 存储只保证单行原子更新，不提供跨操作的事务。并发请求之间的竞争
//! 采用"最后写入生效"，由读路径上的对账逻辑收敛。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Assignment, LiveState, ProgressEvent, SuperStudy, WorkerSession};
use crate::CoordinatorResult;

/// Worker会话仓储接口
#[async_trait]
pub trait WorkerRepository: Send + Sync {
    async fn create(&self, session: &WorkerSession) -> CoordinatorResult<WorkerSession>;

    async fn get_by_id(&self, id: &str) -> CoordinatorResult<Option<WorkerSession>>;

    /// 整行覆盖更新
    async fn update(&self, session: &WorkerSession) -> CoordinatorResult<()>;

    /// 删除会话，级联删除实时状态和审计记录，作业的会话引用置空
    async fn delete(&self, id: &str) -> CoordinatorResult<bool>;

    /// 按最后联系时间倒序列出会话
    async fn list(&self, include_stale: bool) -> CoordinatorResult<Vec<WorkerSession>>;

    /// 网络标识下最近联系过的非过期会话
    async fn find_active_by_network_id(
        &self,
        network_id: &str,
    ) -> CoordinatorResult<Option<WorkerSession>>;

    /// 指定时间之后创建、尚未记录主机名的非过期会话，按创建时间倒序
    async fn find_unnamed_created_since(
        &self,
        since: DateTime<Utc>,
    ) -> CoordinatorResult<Vec<WorkerSession>>;

    /// 指定时间之后联系过的同主机名非过期会话，取最近一个
    async fn find_active_by_hostname_seen_since(
        &self,
        hostname: &str,
        since: DateTime<Utc>,
    ) -> CoordinatorResult<Option<WorkerSession>>;

    /// 网络标识或主机名相同的过期会话
    async fn find_stale_by_network_or_hostname(
        &self,
        network_id: &str,
        hostname: Option<&str>,
    ) -> CoordinatorResult<Vec<WorkerSession>>;

    async fn mark_stale(&self, id: &str) -> CoordinatorResult<()>;

    /// 将同一网络标识下除 `keep_id` 以外的非过期会话全部标记为过期，返回被取代的会话ID
    async fn supersede(&self, network_id: &str, keep_id: &str) -> CoordinatorResult<Vec<String>>;
}

/// 作业仓储接口
#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    async fn get_by_id(&self, id: &str) -> CoordinatorResult<Option<Assignment>>;

    /// 按序号升序返回研究批次下的全部作业
    async fn list_by_super_study(&self, super_study_id: &str)
        -> CoordinatorResult<Vec<Assignment>>;

    async fn list_by_worker(&self, worker_id: &str) -> CoordinatorResult<Vec<Assignment>>;

    /// 会话持有的 `RUNNING` 作业，最近开始的在前
    async fn find_running_by_worker(&self, worker_id: &str) -> CoordinatorResult<Vec<Assignment>>;

    async fn update(&self, assignment: &Assignment) -> CoordinatorResult<()>;

    /// 把 `from` 中任一会话持有的 `RUNNING` 作业改挂到 `to`，返回被转移的作业ID
    async fn transfer_running(&self, from: &[String], to: &str) -> CoordinatorResult<Vec<String>>;
}

/// 研究批次仓储接口
#[async_trait]
pub trait SuperStudyRepository: Send + Sync {
    /// 在同一事务中创建批次及其全部作业
    async fn create_with_assignments(
        &self,
        study: &SuperStudy,
        assignments: &[Assignment],
    ) -> CoordinatorResult<()>;

    async fn get_by_id(&self, id: &str) -> CoordinatorResult<Option<SuperStudy>>;

    /// 按创建时间倒序列出，可选按名称模糊过滤
    async fn list(&self, name_filter: Option<&str>) -> CoordinatorResult<Vec<SuperStudy>>;

    async fn update(&self, study: &SuperStudy) -> CoordinatorResult<()>;

    /// 删除批次，级联删除其作业
    async fn delete(&self, id: &str) -> CoordinatorResult<bool>;

    /// 批次处于 `PENDING` 时置为 `RUNNING`，返回是否发生了变更
    async fn mark_running_if_pending(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> CoordinatorResult<bool>;
}

/// 实时状态仓储接口
#[async_trait]
pub trait LiveStateRepository: Send + Sync {
    async fn get(&self, worker_id: &str) -> CoordinatorResult<Option<LiveState>>;

    async fn upsert(&self, state: &LiveState) -> CoordinatorResult<()>;

    async fn delete(&self, worker_id: &str) -> CoordinatorResult<()>;
}

/// 进度审计仓储接口
#[async_trait]
pub trait ProgressEventRepository: Send + Sync {
    async fn record(&self, event: &ProgressEvent) -> CoordinatorResult<()>;

    /// 最新的在前，最多 `limit` 条
    async fn list_by_worker(
        &self,
        worker_id: &str,
        limit: i64,
    ) -> CoordinatorResult<Vec<ProgressEvent>>;
}

/// 存储连通性探测
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn ping(&self) -> CoordinatorResult<()>;
}

/// 存储句柄，显式传入每个引擎组件
#[derive(Clone)]
pub struct CoordinatorStore {
    pub workers: Arc<dyn WorkerRepository>,
    pub assignments: Arc<dyn AssignmentRepository>,
    pub super_studies: Arc<dyn SuperStudyRepository>,
    pub live_states: Arc<dyn LiveStateRepository>,
    pub events: Arc<dyn ProgressEventRepository>,
    pub health: Arc<dyn HealthProbe>,
}
