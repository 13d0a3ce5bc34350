//! Error types for E2E testing

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Bridge protocol error: {0}")]
    Bridge(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("{method} {url} returned {status}: {body}")]
    Api {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("Assertion failed: {0}")]
    Mismatch(Mismatch),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Scenario aborted: {0}")]
    Aborted(String),

    #[error("Fixture error: {0}")]
    Fixture(#[from] tasklist_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

pub type E2eResult<T> = Result<T, E2eError>;

impl From<Mismatch> for E2eError {
    fn from(m: Mismatch) -> Self {
        E2eError::Mismatch(m)
    }
}

/// An expectation that never held within its polling budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    /// What was being checked
    pub what: String,

    pub expected: String,

    /// Last value read, or the last read error
    pub last_observed: String,

    pub elapsed_ms: u64,
}

impl Mismatch {
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, last observed {} (after {} ms)",
            self.what, self.expected, self.last_observed, self.elapsed_ms
        )
    }
}

/// Stage of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// API setup before the UI is touched
    Precondition,
    /// UI interaction under test
    Action,
    /// Polling assertions on the outcome
    Assertion,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Precondition => "precondition",
            Phase::Action => "action",
            Phase::Assertion => "assertion",
        })
    }
}

/// A scenario error tagged with the phase it happened in
#[derive(Error, Debug)]
#[error("{phase} failed: {error}")]
pub struct ScenarioFailure {
    pub phase: Phase,
    #[source]
    pub error: E2eError,
}

impl ScenarioFailure {
    pub fn new(phase: Phase, error: impl Into<E2eError>) -> Self {
        Self {
            phase,
            error: error.into(),
        }
    }

    /// The mismatch details, for assertion failures
    pub fn mismatch(&self) -> Option<&Mismatch> {
        match &self.error {
            E2eError::Mismatch(m) => Some(m),
            _ => None,
        }
    }
}

/// Tag a fallible step with the scenario phase it belongs to
pub trait PhaseExt<T> {
    fn during(self, phase: Phase) -> Result<T, ScenarioFailure>;
}

impl<T, E: Into<E2eError>> PhaseExt<T> for Result<T, E> {
    fn during(self, phase: Phase) -> Result<T, ScenarioFailure> {
        self.map_err(|e| ScenarioFailure::new(phase, e))
    }
}
