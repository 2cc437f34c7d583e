//! 协调引擎
//!
//! 入站的心跳、领取和进度上报依次经过身份解析、存活跟踪、租约管理或进度处理，
//! 最后触发批次汇总。状态读取只经过对账引擎。
//!
//! 组件之间不共享进程内可变状态，所有状态都在 [`coordinator_core::CoordinatorStore`] 中。

pub mod controller;
pub mod identity;
pub mod ingestion;
pub mod lease_manager;
pub mod liveness;
pub mod reconciliation;
pub mod rollup;

pub use controller::*;
pub use identity::{Contact, ContactKind, IdentityResolver, Resolution};
pub use ingestion::{IngestOutcome, ProgressIngestor};
pub use lease_manager::LeaseManager;
pub use liveness::{LivenessPolicy, LivenessTier, LivenessTracker};
pub use reconciliation::{
    reconcile, Reconciled, ReconciledAssignment, ReconciliationEngine, RepairCommand,
    StatusCounts, StudyStatusView, WorkerContext,
};
pub use rollup::{Rollup, RollupAggregator};
