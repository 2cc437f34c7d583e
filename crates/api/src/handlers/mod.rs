pub mod assignments;
pub mod health;
pub mod heartbeat;
pub mod metrics;
pub mod progress;
pub mod super_studies;
pub mod workers;
