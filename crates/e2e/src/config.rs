//! Harness configuration
//!
//! Loaded from a TOML file when one exists, otherwise defaults. Every
//! section is optional:
//!
//! ```toml
//! parallelism = 2
//!
//! [app]
//! base_url = "http://localhost:3000"
//! api_url = "http://localhost:3333"
//!
//! [timeouts]
//! assertion_ms = 8000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};
use crate::page::TaskSelectors;
use crate::playwright::{Browser, PlaywrightConfig};
use crate::wait::Poller;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub app: AppConfig,
    pub timeouts: TimeoutConfig,
    pub playwright: PlaywrightConfig,
    pub selectors: TaskSelectors,

    /// Fixture file; the bundled fixtures are used when unset
    pub fixtures_path: Option<PathBuf>,

    /// Directory for test-results.json
    pub output_dir: PathBuf,

    /// Maximum number of scenarios running at once
    pub parallelism: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            app: AppConfig::default(),
            timeouts: TimeoutConfig::default(),
            playwright: PlaywrightConfig::default(),
            selectors: TaskSelectors::default(),
            fixtures_path: None,
            output_dir: PathBuf::from("test-results"),
            parallelism: 4,
        }
    }
}

/// Where the application under test lives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Web UI origin
    pub base_url: String,

    /// REST API origin
    pub api_url: String,

    /// Path of the task list page, relative to `base_url`
    pub page_path: String,

    /// Task collection endpoint, relative to `api_url`
    pub tasks_path: String,

    /// Delete-by-name endpoint prefix, relative to `api_url`
    pub helper_tasks_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            api_url: "http://localhost:3333".to_string(),
            page_path: "/".to_string(),
            tasks_path: "/tasks".to_string(),
            helper_tasks_path: "/helper/tasks".to_string(),
        }
    }
}

impl AppConfig {
    /// Absolute URL of the task list page
    pub fn page_url(&self) -> E2eResult<Url> {
        Ok(Url::parse(&self.base_url)?.join(&self.page_path)?)
    }

    pub fn api_base(&self) -> E2eResult<Url> {
        Ok(Url::parse(&self.api_url)?)
    }
}

/// Time budgets, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Page load
    pub navigation_ms: u64,

    /// Waiting for a control to become actionable
    pub action_ms: u64,

    /// Polling budget of each assertion
    pub assertion_ms: u64,

    pub poll_interval_ms: u64,

    /// API helper requests
    pub request_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            navigation_ms: 30_000,
            action_ms: 5_000,
            assertion_ms: 5_000,
            poll_interval_ms: 100,
            request_ms: 10_000,
        }
    }
}

impl TimeoutConfig {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn action(&self) -> Duration {
        Duration::from_millis(self.action_ms)
    }

    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }

    pub fn poller(&self) -> Poller {
        Poller::new(
            Duration::from_millis(self.assertion_ms),
            Duration::from_millis(self.poll_interval_ms),
        )
    }
}
/// Settings given on the command line or through the environment.
///
/// Unset fields leave the file value alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub api_url: Option<String>,

    /// Browser name, parsed when applied
    pub browser: Option<String>,
    pub headed: bool,
    pub parallelism: Option<usize>,
    pub fixtures_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when it is absent
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) -> E2eResult<()> {
        if let Some(base_url) = overrides.base_url {
            self.app.base_url = base_url;
        }
        if let Some(api_url) = overrides.api_url {
            self.app.api_url = api_url;
        }
        if let Some(browser) = overrides.browser {
            self.playwright.browser = browser.parse::<Browser>()?;
        }
        if overrides.headed {
            self.playwright.headless = false;
        }
        if let Some(parallelism) = overrides.parallelism {
            self.parallelism = parallelism;
        }
        if overrides.fixtures_path.is_some() {
            self.fixtures_path = overrides.fixtures_path;
        }
        if let Some(output_dir) = overrides.output_dir {
            self.output_dir = output_dir;
        }
        Ok(())
    }

    /// Reject settings the runner cannot work with
    pub fn validate(&self) -> E2eResult<()> {
        if self.parallelism == 0 {
            return Err(E2eError::Config("parallelism must be at least 1".to_string()));
        }

        let t = &self.timeouts;
        for (name, value) in [
            ("navigation_ms", t.navigation_ms),
            ("action_ms", t.action_ms),
            ("assertion_ms", t.assertion_ms),
            ("poll_interval_ms", t.poll_interval_ms),
            ("request_ms", t.request_ms),
        ] {
            if value == 0 {
                return Err(E2eError::Config(format!("timeouts.{} must be positive", name)));
            }
        }
        if t.poll_interval_ms > t.assertion_ms {
            return Err(E2eError::Config(format!(
                "timeouts.poll_interval_ms ({}) exceeds timeouts.assertion_ms ({})",
                t.poll_interval_ms, t.assertion_ms
            )));
        }

        self.app.page_url()?;
        self.app.api_base()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        HarnessConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: HarnessConfig = toml::from_str(
            r#"
parallelism = 2

[app]
base_url = "http://127.0.0.1:8080"

[timeouts]
assertion_ms = 8000

[playwright]
browser = "firefox"

[selectors]
alert = ".toast"
"#,
        )
        .unwrap();

        assert_eq!(config.parallelism, 2);
        assert_eq!(config.app.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.app.api_url, "http://localhost:3333");
        assert_eq!(config.timeouts.assertion_ms, 8000);
        assert_eq!(config.timeouts.action_ms, 5000);
        assert!(matches!(config.playwright.browser, Browser::Firefox));
        assert_eq!(config.selectors.alert, ".toast");
        assert_eq!(config.selectors.task_row, ".task-item");
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.parallelism, 4);
    }

    #[test]
    fn test_page_url_joins_path() {
        let app = AppConfig {
            base_url: "http://localhost:3000".to_string(),
            page_path: "/tasks/board".to_string(),
            ..Default::default()
        };
        assert_eq!(app.page_url().unwrap().as_str(), "http://localhost:3000/tasks/board");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = HarnessConfig::default();
        config.parallelism = 0;
        assert!(matches!(config.validate(), Err(E2eError::Config(_))));

        let mut config = HarnessConfig::default();
        config.timeouts.poll_interval_ms = 10_000;
        assert!(matches!(config.validate(), Err(E2eError::Config(_))));

        let mut config = HarnessConfig::default();
        config.app.api_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(E2eError::Url(_))));
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasklist-e2e.toml");
        std::fs::write(
            &path,
            r#"
parallelism = 2

[app]
base_url = "http://127.0.0.1:8080"
api_url = "http://127.0.0.1:8081"

[playwright]
browser = "firefox"
"#,
        )
        .unwrap();
        let mut config = HarnessConfig::load(&path).unwrap();

        config
            .apply_overrides(ConfigOverrides {
                api_url: Some("http://api.test:9000".to_string()),
                browser: Some("safari".to_string()),
                headed: true,
                parallelism: Some(3),
                fixtures_path: Some(PathBuf::from("fixtures.yaml")),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(config.app.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.app.api_url, "http://api.test:9000");
        assert_eq!(config.playwright.browser, Browser::Webkit);
        assert!(!config.playwright.headless);
        assert_eq!(config.parallelism, 3);
        assert_eq!(config.fixtures_path, Some(PathBuf::from("fixtures.yaml")));
        assert_eq!(config.output_dir, PathBuf::from("test-results"));
    }

    #[test]
    fn test_empty_overrides_keep_config() {
        let mut config = HarnessConfig::default();
        config.fixtures_path = Some(PathBuf::from("mine.json"));

        config.apply_overrides(ConfigOverrides::default()).unwrap();

        assert_eq!(config.fixtures_path, Some(PathBuf::from("mine.json")));
        assert!(config.playwright.headless);
        assert_eq!(config.parallelism, 4);
    }

    #[test]
    fn test_unknown_browser_override_is_rejected() {
        let mut config = HarnessConfig::default();
        let err = config
            .apply_overrides(ConfigOverrides {
                browser: Some("netscape".to_string()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, E2eError::Config(_)));
    }
}
