//! Task model

use serde::{Deserialize, Serialize};

/// A task as seen by the application: typed into the UI and posted to the API.
///
/// `name` is the identity of a task from the application's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,

    #[serde(default)]
    pub is_done: bool,
}

impl Task {
    /// Create an open task with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_done: false,
        }
    }

    /// Whether the name is empty once surrounding whitespace is ignored
    pub fn is_blank(&self) -> bool {
        self.name.trim().is_empty()
    }
}
