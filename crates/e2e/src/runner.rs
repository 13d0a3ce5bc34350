//! Main test runner that orchestrates pages, API helpers and scenarios

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use tasklist_common::FixtureSet;

use crate::api::TaskApi;
use crate::config::HarnessConfig;
use crate::driver::PageLauncher;
use crate::error::{E2eError, E2eResult, Mismatch, Phase, PhaseExt, ScenarioFailure};
use crate::page::TasksPage;
use crate::scenario::{Scenario, ScenarioContext};

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub group: String,
    pub success: bool,
    pub duration_ms: u64,

    /// Phase that failed, if any
    pub phase: Option<Phase>,
    pub error: Option<String>,
    pub mismatch: Option<Mismatch>,
}

/// Result of running all tests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Main E2E test runner
pub struct TestRunner {
    config: Arc<HarnessConfig>,
    launcher: Arc<dyn PageLauncher>,
    fixtures: Arc<FixtureSet>,
    api: TaskApi,
}

impl TestRunner {
    /// Create a runner.
    ///
    /// Fails when the configuration is invalid or when two fixtures share
    /// a task name, since concurrent scenarios would then interfere.
    pub fn with_config(
        config: HarnessConfig,
        launcher: Arc<dyn PageLauncher>,
        fixtures: FixtureSet,
    ) -> E2eResult<Self> {
        config.validate()?;
        fixtures.validate()?;

        let api = TaskApi::new(&config.app, &config.timeouts)?;
        Ok(Self {
            config: Arc::new(config),
            launcher,
            fixtures: Arc::new(fixtures),
            api,
        })
    }

    /// Fixtures from `config.fixtures_path`, or the bundled ones
    pub fn load_fixtures(config: &HarnessConfig) -> E2eResult<FixtureSet> {
        let fixtures = match &config.fixtures_path {
            Some(path) => FixtureSet::load(path)?,
            None => FixtureSet::builtin()?,
        };
        Ok(fixtures)
    }

    pub fn api(&self) -> &TaskApi {
        &self.api
    }

    /// Run every scenario
    pub async fn run_all(&self) -> E2eResult<TestSuiteResult> {
        self.run_scenarios(&Scenario::ALL).await
    }

    /// Run scenarios of one group
    pub async fn run_tagged(&self, tag: &str) -> E2eResult<TestSuiteResult> {
        let selected: Vec<Scenario> = Scenario::ALL
            .into_iter()
            .filter(|s| s.group() == tag)
            .collect();
        if selected.is_empty() {
            warn!("No scenario tagged '{}'", tag);
        }
        self.run_scenarios(&selected).await
    }

    /// Run a specific scenario by name or id
    pub async fn run_test(&self, name: &str) -> E2eResult<TestResult> {
        let scenario = Scenario::find(name)
            .ok_or_else(|| E2eError::Config(format!("Test not found: {}", name)))?;

        let suite = self.run_scenarios(&[scenario]).await?;
        suite
            .results
            .into_iter()
            .next()
            .ok_or_else(|| E2eError::Config(format!("Test produced no result: {}", name)))
    }

    /// Run scenarios concurrently, at most `parallelism` at a time
    pub async fn run_scenarios(&self, scenarios: &[Scenario]) -> E2eResult<TestSuiteResult> {
        let started_at = Utc::now();
        let start = Instant::now();
        let permits = Arc::new(Semaphore::new(self.config.parallelism));
        let mut set = JoinSet::new();

        info!("Running {} test(s)...", scenarios.len());

        for (index, scenario) in scenarios.iter().copied().enumerate() {
            let permits = permits.clone();
            let config = self.config.clone();
            let launcher = self.launcher.clone();
            let fixtures = self.fixtures.clone();
            let api = self.api.clone();

            set.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => {
                        execute(scenario, &config, launcher.as_ref(), &fixtures, &api).await
                    }
                    Err(e) => failure_result(
                        scenario,
                        0,
                        ScenarioFailure::new(
                            Phase::Precondition,
                            E2eError::Config(format!("runner shut down: {}", e)),
                        ),
                    ),
                };
                (index, result)
            });
        }

        let mut indexed = Vec::with_capacity(scenarios.len());
        let mut aborted = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(entry) => indexed.push(entry),
                Err(e) => {
                    error!("Scenario task panicked or was cancelled: {}", e);
                    aborted.push(e.to_string());
                }
            }
        }

        // A dead task leaves no entry; report its scenario as failed
        if !aborted.is_empty() {
            let reason = aborted.join("; ");
            for (index, scenario) in scenarios.iter().copied().enumerate() {
                if !indexed.iter().any(|(i, _)| *i == index) {
                    let failure =
                        ScenarioFailure::new(Phase::Action, E2eError::Aborted(reason.clone()));
                    indexed.push((index, failure_result(scenario, 0, failure)));
                }
            }
        }

        indexed.sort_by_key(|(index, _)| *index);
        let results: Vec<TestResult> = indexed.into_iter().map(|(_, r)| r).collect();

        let passed = results.iter().filter(|r| r.success).count();
        let failed = results.len() - passed;
        let skipped = 0;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!("Test Results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms);

        Ok(TestSuiteResult {
            started_at,
            total: scenarios.len(),
            passed,
            failed,
            skipped,
            duration_ms,
            results,
        })
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

/// Run one scenario on a fresh page and close the page afterwards
async fn execute(
    scenario: Scenario,
    config: &HarnessConfig,
    launcher: &dyn PageLauncher,
    fixtures: &FixtureSet,
    api: &TaskApi,
) -> TestResult {
    let start = Instant::now();
    debug!("Running test: {}", scenario.name());

    let outcome = run_on_fresh_page(scenario, config, launcher, fixtures, api).await;

    let duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(()) => {
            info!("✓ {} ({} ms)", scenario.name(), duration_ms);
            TestResult {
                name: scenario.name().to_string(),
                group: scenario.group().to_string(),
                success: true,
                duration_ms,
                phase: None,
                error: None,
                mismatch: None,
            }
        }
        Err(failure) => {
            error!("✗ {} - {}", scenario.name(), failure);
            failure_result(scenario, duration_ms, failure)
        }
    }
}

async fn run_on_fresh_page(
    scenario: Scenario,
    config: &HarnessConfig,
    launcher: &dyn PageLauncher,
    fixtures: &FixtureSet,
    api: &TaskApi,
) -> Result<(), ScenarioFailure> {
    let driver = launcher.open_page().await.during(Phase::Precondition)?;
    let page = TasksPage::new(driver.clone(), config).during(Phase::Precondition)?;
    let ctx = ScenarioContext {
        api,
        page: &page,
        fixtures,
    };

    let outcome = scenario.run(&ctx).await;
    if let Err(e) = driver.close().await {
        warn!("Failed to close page for '{}': {}", scenario.name(), e);
    }
    outcome
}

fn failure_result(scenario: Scenario, duration_ms: u64, failure: ScenarioFailure) -> TestResult {
    TestResult {
        name: scenario.name().to_string(),
        group: scenario.group().to_string(),
        success: false,
        duration_ms,
        phase: Some(failure.phase),
        mismatch: failure.mismatch().cloned(),
        error: Some(failure.to_string()),
    }
}
