//! Tasklist Common Library
//!
//! The task model and the fixture data set shared by the E2E harness.

pub mod error;
pub mod fixtures;
pub mod task;

pub use error::{Error, Result};
pub use fixtures::{keys, FixtureSet};
pub use task::Task;
