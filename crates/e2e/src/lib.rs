//! Tasklist E2E Test Framework
//!
//! This crate verifies the task list web application end to end:
//! - Drives a real browser through a long-lived Playwright bridge process
//! - Seeds and clears backend state through the REST API, bypassing the UI
//! - Wraps the task list screen in a page object with polling assertions
//! - Runs the scenarios concurrently, one isolated page each
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── validate fixtures (disjoint task names)              │
//! │    ├── per scenario: PageLauncher::open_page()              │
//! │    └── Scenario::run(ctx) -> Result<(), ScenarioFailure>    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scenario: Precondition -> Action -> Assertion              │
//! │    ├── TaskApi     delete_task_by_helper, post_task         │
//! │    └── TasksPage   go, create, toggle, delete,              │
//! │                    should_have_text, should_be_done,        │
//! │                    should_not_exist, alert_have_text        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  PageDriver (trait)                                         │
//! │    └── PlaywrightPage: node bridge, JSON lines on stdio     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The API helpers and the page object never call each other; only the
//! scenarios combine them.

pub mod api;
pub mod config;
pub mod driver;
pub mod error;
pub mod page;
pub mod playwright;
pub mod runner;
pub mod scenario;
pub mod wait;

pub use api::TaskApi;
pub use config::{ConfigOverrides, HarnessConfig};
pub use driver::{Locator, PageDriver, PageLauncher};
pub use error::{E2eError, E2eResult, Mismatch, Phase, ScenarioFailure};
pub use page::{TaskSelectors, TasksPage};
pub use runner::{TestResult, TestRunner, TestSuiteResult};
pub use scenario::{Scenario, ScenarioContext};
pub use wait::Poller;
