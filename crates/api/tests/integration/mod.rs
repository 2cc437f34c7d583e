pub mod heartbeat_api_tests;
pub mod progress_api_tests;
pub mod super_study_api_tests;
pub mod system_api_tests;
pub mod test_utils;
pub mod worker_api_tests;
