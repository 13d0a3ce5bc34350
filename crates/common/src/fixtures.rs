//! Fixture data: named, immutable task inputs for scenarios
//!
//! A fixture file maps a scenario key to a task:
//!
//! ```json
//! { "success": { "name": "Buy milk", "is_done": false } }
//! ```
//!
//! Scenarios running concurrently share one backend, so every non-blank
//! name must appear under exactly one key and must not contain another
//! fixture's name. [`FixtureSet::validate`] checks that before a run starts.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::task::Task;

/// Well-known fixture keys
pub mod keys {
    pub const SUCCESS: &str = "success";
    pub const DUPLICATE: &str = "duplicate";
    pub const REQUIRED: &str = "required";
    pub const UPDATE: &str = "update";
    pub const REOPEN: &str = "reopen";
    pub const DELETE: &str = "delete";
}

const BUILTIN: &str = include_str!("../fixtures/tasks.json");

/// Scenario key to task mapping, loaded once per run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixtureSet {
    entries: BTreeMap<String, Task>,
}

impl FixtureSet {
    /// Parse fixtures from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse fixtures from a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load fixtures from a `.json`, `.yaml` or `.yml` file
    pub fn load(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let content = match ext.as_str() {
            "json" | "yaml" | "yml" => std::fs::read_to_string(path)?,
            _ => return Err(Error::UnsupportedFormat(path.display().to_string())),
        };

        debug!("Loading fixtures from {}", path.display());

        if ext == "json" {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    /// The fixtures bundled with this crate
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN)
    }

    /// Look up the task for a scenario key
    pub fn get(&self, key: &str) -> Result<&Task> {
        self.entries
            .get(key)
            .ok_or_else(|| Error::MissingFixture(key.to_string()))
    }

    /// Add or replace an entry
    pub fn insert(&mut self, key: impl Into<String>, task: Task) {
        self.entries.insert(key.into(), task);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check that no two entries address the same task.
    ///
    /// Rows are located by substring, so a name contained in another one
    /// would match both rows and is rejected too. Blank names never reach
    /// the backend and are skipped.
    pub fn validate(&self) -> Result<()> {
        let named: Vec<(&String, &Task)> = self
            .entries
            .iter()
            .filter(|(_, task)| !task.is_blank())
            .collect();

        for (i, (first_key, first)) in named.iter().enumerate() {
            for (second_key, second) in &named[i + 1..] {
                if first.name == second.name {
                    return Err(Error::NameConflict {
                        name: first.name.clone(),
                        first: first_key.to_string(),
                        second: second_key.to_string(),
                    });
                }

                let overlap = if second.name.contains(first.name.as_str()) {
                    Some(((first_key, first), (second_key, second)))
                } else if first.name.contains(second.name.as_str()) {
                    Some(((second_key, second), (first_key, first)))
                } else {
                    None
                };
                if let Some(((inner_key, inner), (outer_key, outer))) = overlap {
                    return Err(Error::NameOverlap {
                        inner: inner.name.clone(),
                        inner_key: inner_key.to_string(),
                        outer: outer.name.clone(),
                        outer_key: outer_key.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}
