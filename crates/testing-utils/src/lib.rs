//! # Coordinator Testing Utils
//!
//! Shared testing utilities for the study coordinator workspace.
//!
//! ## Features
//!
//! - **Mock Repositories**: In-memory implementations of every repository trait,
//!   sharing one state so cascading deletes behave like the SQLite store
//! - **Manual Clock**: A settable, advanceable time source for liveness tests
//! - **Test Data Builders**: Utilities for creating sessions, assignments and studies
//!
//! ## Usage
//!
//! ```toml
//! [dev-dependencies]
//! coordinator-testing-utils = { path = "../testing-utils" }
//! ```
//!
//! ```rust
//! use coordinator_testing_utils::{ManualClock, MockStore};
//!
//! let mocks = MockStore::new();
//! let store = mocks.store();
//! let clock = ManualClock::starting_now();
//! ```

pub mod builders;
pub mod clock;
pub mod mocks;

pub use builders::*;
pub use clock::*;
pub use mocks::*;
