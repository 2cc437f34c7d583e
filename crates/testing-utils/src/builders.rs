//! Test data builders for creating test entities
//!
//! Builders start from sensible defaults and take an explicit `now` where
//! timestamps matter, so they line up with a [`crate::ManualClock`].

use chrono::{DateTime, Utc};
use coordinator_core::{
    Assignment, AssignmentStatus, HardwareInfo, SuperStudy, SuperStudyStatus, WorkerSession,
    WorkerStatus,
};

/// Builder for creating test WorkerSession entities
pub struct WorkerSessionBuilder {
    session: WorkerSession,
}

impl WorkerSessionBuilder {
    pub fn new(network_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            session: WorkerSession::new(network_id, None, now),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.session.id = id.to_string();
        self
    }

    pub fn with_hostname(mut self, hostname: &str) -> Self {
        self.session.hostname = Some(hostname.to_string());
        self
    }

    pub fn with_hardware(mut self, hardware: HardwareInfo) -> Self {
        self.session.hardware = hardware;
        self
    }

    pub fn with_status(mut self, status: WorkerStatus) -> Self {
        self.session.status = status;
        self
    }

    pub fn stale(mut self) -> Self {
        self.session.is_stale = true;
        self
    }

    pub fn provisional(mut self) -> Self {
        self.session.provisional = true;
        self
    }

    pub fn last_seen(mut self, at: DateTime<Utc>) -> Self {
        self.session.last_seen = at;
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.session.created_at = at;
        self
    }

    pub fn build(self) -> WorkerSession {
        self.session
    }
}

/// Builder for creating test Assignment entities
pub struct AssignmentBuilder {
    assignment: Assignment,
}

impl AssignmentBuilder {
    pub fn new(super_study_id: &str, index: i32) -> Self {
        Self {
            assignment: Assignment::new(super_study_id, index, serde_json::json!({})),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.assignment.id = id.to_string();
        self
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.assignment.config = config;
        self
    }

    /// RUNNING under `worker_id`, started at `at`
    pub fn running_on(mut self, worker_id: &str, at: DateTime<Utc>) -> Self {
        self.assignment.claim(worker_id, at);
        self
    }

    pub fn with_status(mut self, status: AssignmentStatus) -> Self {
        self.assignment.status = status;
        self
    }

    pub fn with_worker(mut self, worker_id: &str) -> Self {
        self.assignment.worker_id = Some(worker_id.to_string());
        self
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.assignment.progress = progress;
        self
    }

    pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.assignment.completed_at = Some(at);
        self
    }

    pub fn build(self) -> Assignment {
        self.assignment
    }
}

/// Builder for creating test SuperStudy entities
pub struct SuperStudyBuilder {
    study: SuperStudy,
}

impl SuperStudyBuilder {
    pub fn new(name: &str, total_assignments: i32, now: DateTime<Utc>) -> Self {
        Self {
            study: SuperStudy::new(name, "", None, total_assignments, now),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.study.id = id.to_string();
        self
    }

    pub fn with_status(mut self, status: SuperStudyStatus) -> Self {
        self.study.status = status;
        self
    }

    pub fn with_completed(mut self, completed: i32) -> Self {
        self.study.completed_assignments = completed;
        self
    }

    pub fn build(self) -> SuperStudy {
        self.study
    }
}
