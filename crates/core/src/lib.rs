pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use errors::{CoordinatorError, ErrorKind};
pub use models::*;
pub use traits::*;

pub type CoordinatorResult<T> = std::result::Result<T, CoordinatorError>;
