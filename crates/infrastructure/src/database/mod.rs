pub mod manager;
pub mod mapping;
pub mod sqlite;

pub use manager::DatabaseManager;
pub use sqlite::{
    SqliteAssignmentRepository, SqliteHealthProbe, SqliteLiveStateRepository,
    SqliteProgressEventRepository, SqliteSuperStudyRepository, SqliteWorkerRepository,
};
