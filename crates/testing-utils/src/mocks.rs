//! Mock implementations for all repository traits
//!
//! Every mock shares one [`MockState`], so deleting a worker clears its live
//! state and nulls assignment references the same way the SQLite schema does.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coordinator_core::{
    Assignment, AssignmentRepository, AssignmentStatus, CoordinatorError, CoordinatorResult,
    CoordinatorStore, HealthProbe, LiveState, LiveStateRepository, ProgressEvent,
    ProgressEventRepository, SuperStudy, SuperStudyRepository, SuperStudyStatus,
    WorkerRepository, WorkerSession,
};

/// Switches that make selected writes fail, for best-effort paths
#[derive(Debug, Default, Clone)]
pub struct FailureSwitches {
    pub health: bool,
    pub event_writes: bool,
    pub study_updates: bool,
    pub live_state_writes: bool,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub workers: HashMap<String, WorkerSession>,
    pub assignments: HashMap<String, Assignment>,
    pub studies: HashMap<String, SuperStudy>,
    pub live_states: HashMap<String, LiveState>,
    pub events: Vec<ProgressEvent>,
    pub failures: FailureSwitches,
}

type Shared = Arc<Mutex<MockState>>;

fn injected(what: &str) -> CoordinatorError {
    CoordinatorError::DatabaseOperation(format!("injected failure: {what}"))
}

/// Owner of the shared state, hands out a [`CoordinatorStore`]
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    state: Shared,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> CoordinatorStore {
        CoordinatorStore {
            workers: Arc::new(MockWorkerRepository {
                state: self.state.clone(),
            }),
            assignments: Arc::new(MockAssignmentRepository {
                state: self.state.clone(),
            }),
            super_studies: Arc::new(MockSuperStudyRepository {
                state: self.state.clone(),
            }),
            live_states: Arc::new(MockLiveStateRepository {
                state: self.state.clone(),
            }),
            events: Arc::new(MockProgressEventRepository {
                state: self.state.clone(),
            }),
            health: Arc::new(MockHealthProbe {
                state: self.state.clone(),
            }),
        }
    }

    pub fn insert_worker(&self, session: WorkerSession) {
        let mut state = self.state.lock().unwrap();
        state.workers.insert(session.id.clone(), session);
    }

    pub fn insert_assignment(&self, assignment: Assignment) {
        let mut state = self.state.lock().unwrap();
        state.assignments.insert(assignment.id.clone(), assignment);
    }

    pub fn insert_study(&self, study: SuperStudy) {
        let mut state = self.state.lock().unwrap();
        state.studies.insert(study.id.clone(), study);
    }

    pub fn worker(&self, id: &str) -> Option<WorkerSession> {
        self.state.lock().unwrap().workers.get(id).cloned()
    }

    pub fn assignment(&self, id: &str) -> Option<Assignment> {
        self.state.lock().unwrap().assignments.get(id).cloned()
    }

    pub fn study(&self, id: &str) -> Option<SuperStudy> {
        self.state.lock().unwrap().studies.get(id).cloned()
    }

    pub fn live_state(&self, worker_id: &str) -> Option<LiveState> {
        self.state.lock().unwrap().live_states.get(worker_id).cloned()
    }

    pub fn all_workers(&self) -> Vec<WorkerSession> {
        self.state.lock().unwrap().workers.values().cloned().collect()
    }

    /// Non-stale sessions for one network identifier
    pub fn active_workers_for(&self, network_id: &str) -> Vec<WorkerSession> {
        self.state
            .lock()
            .unwrap()
            .workers
            .values()
            .filter(|w| w.network_id == network_id && !w.is_stale)
            .cloned()
            .collect()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn set_failures(&self, failures: FailureSwitches) {
        self.state.lock().unwrap().failures = failures;
    }
}

#[derive(Debug, Clone)]
pub struct MockWorkerRepository {
    state: Shared,
}

#[async_trait]
impl WorkerRepository for MockWorkerRepository {
    async fn create(&self, session: &WorkerSession) -> CoordinatorResult<WorkerSession> {
        let mut state = self.state.lock().unwrap();
        state.workers.insert(session.id.clone(), session.clone());
        Ok(session.clone())
    }

    async fn get_by_id(&self, id: &str) -> CoordinatorResult<Option<WorkerSession>> {
        Ok(self.state.lock().unwrap().workers.get(id).cloned())
    }

    async fn update(&self, session: &WorkerSession) -> CoordinatorResult<()> {
        let mut state = self.state.lock().unwrap();
        match state.workers.get_mut(&session.id) {
            Some(existing) => {
                *existing = session.clone();
                Ok(())
            }
            None => Err(CoordinatorError::WorkerNotFound {
                id: session.id.clone(),
            }),
        }
    }

    async fn delete(&self, id: &str) -> CoordinatorResult<bool> {
        let mut state = self.state.lock().unwrap();
        let removed = state.workers.remove(id).is_some();
        if removed {
            state.live_states.remove(id);
            state.events.retain(|e| e.worker_id != id);
            for assignment in state.assignments.values_mut() {
                if assignment.worker_id.as_deref() == Some(id) {
                    assignment.worker_id = None;
                }
            }
        }
        Ok(removed)
    }

    async fn list(&self, include_stale: bool) -> CoordinatorResult<Vec<WorkerSession>> {
        let state = self.state.lock().unwrap();
        let mut workers: Vec<WorkerSession> = state
            .workers
            .values()
            .filter(|w| include_stale || !w.is_stale)
            .cloned()
            .collect();
        workers.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        Ok(workers)
    }

    async fn find_active_by_network_id(
        &self,
        network_id: &str,
    ) -> CoordinatorResult<Option<WorkerSession>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .workers
            .values()
            .filter(|w| !w.is_stale && w.network_id == network_id)
            .max_by_key(|w| w.last_seen)
            .cloned())
    }

    async fn find_unnamed_created_since(
        &self,
        since: DateTime<Utc>,
    ) -> CoordinatorResult<Vec<WorkerSession>> {
        let state = self.state.lock().unwrap();
        let mut workers: Vec<WorkerSession> = state
            .workers
            .values()
            .filter(|w| !w.is_stale && !w.has_hostname() && w.created_at >= since)
            .cloned()
            .collect();
        workers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(workers)
    }

    async fn find_active_by_hostname_seen_since(
        &self,
        hostname: &str,
        since: DateTime<Utc>,
    ) -> CoordinatorResult<Option<WorkerSession>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .workers
            .values()
            .filter(|w| {
                !w.is_stale && w.hostname.as_deref() == Some(hostname) && w.last_seen >= since
            })
            .max_by_key(|w| w.last_seen)
            .cloned())
    }

    async fn find_stale_by_network_or_hostname(
        &self,
        network_id: &str,
        hostname: Option<&str>,
    ) -> CoordinatorResult<Vec<WorkerSession>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .workers
            .values()
            .filter(|w| {
                w.is_stale
                    && (w.network_id == network_id
                        || (hostname.is_some() && w.hostname.as_deref() == hostname))
            })
            .cloned()
            .collect())
    }

    async fn mark_stale(&self, id: &str) -> CoordinatorResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(worker) = state.workers.get_mut(id) {
            worker.is_stale = true;
        }
        Ok(())
    }

    async fn supersede(&self, network_id: &str, keep_id: &str) -> CoordinatorResult<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        let mut retired = Vec::new();
        for worker in state.workers.values_mut() {
            if !worker.is_stale && worker.network_id == network_id && worker.id != keep_id {
                worker.is_stale = true;
                retired.push(worker.id.clone());
            }
        }
        Ok(retired)
    }
}

#[derive(Debug, Clone)]
pub struct MockAssignmentRepository {
    state: Shared,
}

#[async_trait]
impl AssignmentRepository for MockAssignmentRepository {
    async fn get_by_id(&self, id: &str) -> CoordinatorResult<Option<Assignment>> {
        Ok(self.state.lock().unwrap().assignments.get(id).cloned())
    }

    async fn list_by_super_study(
        &self,
        super_study_id: &str,
    ) -> CoordinatorResult<Vec<Assignment>> {
        let state = self.state.lock().unwrap();
        let mut assignments: Vec<Assignment> = state
            .assignments
            .values()
            .filter(|a| a.super_study_id == super_study_id)
            .cloned()
            .collect();
        assignments.sort_by_key(|a| a.index);
        Ok(assignments)
    }

    async fn list_by_worker(&self, worker_id: &str) -> CoordinatorResult<Vec<Assignment>> {
        let state = self.state.lock().unwrap();
        let mut assignments: Vec<Assignment> = state
            .assignments
            .values()
            .filter(|a| a.is_owned_by(worker_id))
            .cloned()
            .collect();
        assignments.sort_by(|a, b| {
            a.super_study_id
                .cmp(&b.super_study_id)
                .then(a.index.cmp(&b.index))
        });
        Ok(assignments)
    }

    async fn find_running_by_worker(&self, worker_id: &str) -> CoordinatorResult<Vec<Assignment>> {
        let state = self.state.lock().unwrap();
        let mut assignments: Vec<Assignment> = state
            .assignments
            .values()
            .filter(|a| a.is_running() && a.is_owned_by(worker_id))
            .cloned()
            .collect();
        assignments.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(assignments)
    }

    async fn update(&self, assignment: &Assignment) -> CoordinatorResult<()> {
        let mut state = self.state.lock().unwrap();
        match state.assignments.get_mut(&assignment.id) {
            Some(existing) => {
                *existing = assignment.clone();
                Ok(())
            }
            None => Err(CoordinatorError::AssignmentNotFound {
                id: assignment.id.clone(),
            }),
        }
    }

    async fn transfer_running(&self, from: &[String], to: &str) -> CoordinatorResult<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        let mut moved = Vec::new();
        for assignment in state.assignments.values_mut() {
            let owned_by_source = assignment
                .worker_id
                .as_ref()
                .is_some_and(|w| from.contains(w));
            if assignment.status == AssignmentStatus::Running && owned_by_source {
                assignment.worker_id = Some(to.to_string());
                moved.push(assignment.id.clone());
            }
        }
        Ok(moved)
    }
}

#[derive(Debug, Clone)]
pub struct MockSuperStudyRepository {
    state: Shared,
}

#[async_trait]
impl SuperStudyRepository for MockSuperStudyRepository {
    async fn create_with_assignments(
        &self,
        study: &SuperStudy,
        assignments: &[Assignment],
    ) -> CoordinatorResult<()> {
        let mut state = self.state.lock().unwrap();
        state.studies.insert(study.id.clone(), study.clone());
        for assignment in assignments {
            state
                .assignments
                .insert(assignment.id.clone(), assignment.clone());
        }
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> CoordinatorResult<Option<SuperStudy>> {
        Ok(self.state.lock().unwrap().studies.get(id).cloned())
    }

    async fn list(&self, name_filter: Option<&str>) -> CoordinatorResult<Vec<SuperStudy>> {
        let state = self.state.lock().unwrap();
        let mut studies: Vec<SuperStudy> = state
            .studies
            .values()
            .filter(|s| name_filter.map_or(true, |f| s.name.contains(f)))
            .cloned()
            .collect();
        studies.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(studies)
    }

    async fn update(&self, study: &SuperStudy) -> CoordinatorResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.failures.study_updates {
            return Err(injected("super study update"));
        }
        match state.studies.get_mut(&study.id) {
            Some(existing) => {
                *existing = study.clone();
                Ok(())
            }
            None => Err(CoordinatorError::SuperStudyNotFound {
                id: study.id.clone(),
            }),
        }
    }

    async fn delete(&self, id: &str) -> CoordinatorResult<bool> {
        let mut state = self.state.lock().unwrap();
        let removed = state.studies.remove(id).is_some();
        if removed {
            state.assignments.retain(|_, a| a.super_study_id != id);
        }
        Ok(removed)
    }

    async fn mark_running_if_pending(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> CoordinatorResult<bool> {
        let mut state = self.state.lock().unwrap();
        match state.studies.get_mut(id) {
            Some(study) if study.status == SuperStudyStatus::Pending => {
                study.status = SuperStudyStatus::Running;
                study.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockLiveStateRepository {
    state: Shared,
}

#[async_trait]
impl LiveStateRepository for MockLiveStateRepository {
    async fn get(&self, worker_id: &str) -> CoordinatorResult<Option<LiveState>> {
        Ok(self.state.lock().unwrap().live_states.get(worker_id).cloned())
    }

    async fn upsert(&self, live_state: &LiveState) -> CoordinatorResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.failures.live_state_writes {
            return Err(injected("live state upsert"));
        }
        state
            .live_states
            .insert(live_state.worker_id.clone(), live_state.clone());
        Ok(())
    }

    async fn delete(&self, worker_id: &str) -> CoordinatorResult<()> {
        self.state.lock().unwrap().live_states.remove(worker_id);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MockProgressEventRepository {
    state: Shared,
}

#[async_trait]
impl ProgressEventRepository for MockProgressEventRepository {
    async fn record(&self, event: &ProgressEvent) -> CoordinatorResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.failures.event_writes {
            return Err(injected("progress event"));
        }
        state.events.push(event.clone());
        Ok(())
    }

    async fn list_by_worker(
        &self,
        worker_id: &str,
        limit: i64,
    ) -> CoordinatorResult<Vec<ProgressEvent>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .events
            .iter()
            .rev()
            .filter(|e| e.worker_id == worker_id)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct MockHealthProbe {
    state: Shared,
}

#[async_trait]
impl HealthProbe for MockHealthProbe {
    async fn ping(&self) -> CoordinatorResult<()> {
        if self.state.lock().unwrap().failures.health {
            return Err(injected("ping"));
        }
        Ok(())
    }
}
