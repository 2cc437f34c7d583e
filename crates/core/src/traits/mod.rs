pub mod clock;
pub mod repository;

pub use clock::*;
pub use repository::*;
