//! Error types for tasklist fixtures

use thiserror::Error;

/// Result type alias using the tasklist-common Error
pub type Result<T> = std::result::Result<T, Error>;

/// Fixture and model errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Fixture not found: {0}")]
    MissingFixture(String),

    #[error("Fixtures '{first}' and '{second}' share the task name '{name}'")]
    NameConflict {
        name: String,
        first: String,
        second: String,
    },

    #[error("Task name '{inner}' of fixture '{inner_key}' is contained in '{outer}' of fixture '{outer_key}'")]
    NameOverlap {
        inner: String,
        inner_key: String,
        outer: String,
        outer_key: String,
    },

    #[error("Unsupported fixture format: {0}")]
    UnsupportedFormat(String),
}
