pub mod sqlite_assignment_repository;
pub mod sqlite_health_probe;
pub mod sqlite_live_state_repository;
pub mod sqlite_progress_event_repository;
pub mod sqlite_super_study_repository;
pub mod sqlite_worker_repository;

pub use sqlite_assignment_repository::SqliteAssignmentRepository;
pub use sqlite_health_probe::SqliteHealthProbe;
pub use sqlite_live_state_repository::SqliteLiveStateRepository;
pub use sqlite_progress_event_repository::SqliteProgressEventRepository;
pub use sqlite_super_study_repository::SqliteSuperStudyRepository;
pub use sqlite_worker_repository::SqliteWorkerRepository;
