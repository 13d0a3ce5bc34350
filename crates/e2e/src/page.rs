//! Page object for the task list screen
//!
//! Scenarios call intention-revealing operations here instead of touching
//! selectors. Actions return as soon as the browser has dispatched them;
//! assertions poll until the UI catches up or the budget runs out.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use tasklist_common::Task;

use crate::config::HarnessConfig;
use crate::driver::{Locator, PageDriver};
use crate::error::E2eResult;
use crate::wait::Poller;

/// Computed style marking a finished task
const DONE_DECORATION: &str = "line-through";

/// CSS selectors of the task list screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSelectors {
    pub input_task_name: String,
    pub submit_button: String,
    pub task_row: String,

    /// Text element carrying the task name
    pub task_text: String,

    /// Inside a row
    pub toggle_button: String,

    /// Inside a row
    pub delete_button: String,

    /// Notification region for server-side errors
    pub alert: String,
}

impl Default for TaskSelectors {
    fn default() -> Self {
        Self {
            input_task_name: "input[class*=InputNewTask]".to_string(),
            submit_button: "button[class*=ButtonNewTask]".to_string(),
            task_row: ".task-item".to_string(),
            task_text: ".task-item p".to_string(),
            toggle_button: "button[class*=Toggle]".to_string(),
            delete_button: "button[class*=Delete]".to_string(),
            alert: ".swal2-html-container".to_string(),
        }
    }
}

/// The task list / create page, bound to one browser page
pub struct TasksPage {
    driver: Arc<dyn PageDriver>,
    url: String,
    selectors: TaskSelectors,
    poller: Poller,
    navigation_timeout: Duration,
    action_timeout: Duration,
}

impl TasksPage {
    pub fn new(driver: Arc<dyn PageDriver>, config: &HarnessConfig) -> E2eResult<Self> {
        Ok(Self {
            driver,
            url: config.app.page_url()?.to_string(),
            selectors: config.selectors.clone(),
            poller: config.timeouts.poller(),
            navigation_timeout: config.timeouts.navigation(),
            action_timeout: config.timeouts.action(),
        })
    }

    /// Open the task list and wait for it to load
    pub async fn go(&self) -> E2eResult<()> {
        debug!("Opening {}", self.url);
        self.driver.goto(&self.url, self.navigation_timeout).await
    }

    /// Type the task name and submit. Success is not checked here.
    pub async fn create(&self, task: &Task) -> E2eResult<()> {
        debug!("Creating task {:?} through the UI", task.name);
        self.driver
            .fill(&self.input_task_name(), &task.name, self.action_timeout)
            .await?;
        self.driver
            .click(&Locator::css(&self.selectors.submit_button), self.action_timeout)
            .await
    }

    /// The task name input, for inspecting native validation state
    pub fn input_task_name(&self) -> Locator {
        Locator::css(&self.selectors.input_task_name)
    }

    /// The browser's native validation message of the task name input
    pub async fn validation_message(&self) -> E2eResult<String> {
        let value = self
            .driver
            .property(&self.input_task_name(), "validationMessage")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Flip the completion state of the task called `name`
    pub async fn toggle(&self, name: &str) -> E2eResult<()> {
        debug!("Toggling task {:?}", name);
        let target = self.row(name).locator(Locator::css(&self.selectors.toggle_button));
        self.driver.click(&target, self.action_timeout).await
    }

    /// Remove the task called `name` through its delete control
    pub async fn delete(&self, name: &str) -> E2eResult<()> {
        debug!("Deleting task {:?} through the UI", name);
        let target = self.row(name).locator(Locator::css(&self.selectors.delete_button));
        self.driver.click(&target, self.action_timeout).await
    }

    /// A task containing `name` is listed
    pub async fn should_have_text(&self, name: &str) -> E2eResult<()> {
        let target = self.task_text(name);
        self.poller
            .until(
                &format!("task {:?} listed", name),
                "at least 1 visible match",
                || self.driver.count(&target),
                |n| *n > 0,
            )
            .await?;
        Ok(())
    }

    /// No task containing `name` is listed
    pub async fn should_not_exist(&self, name: &str) -> E2eResult<()> {
        let target = self.task_text(name);
        self.poller
            .until(
                &format!("task {:?} removed", name),
                "0 visible matches",
                || self.driver.count(&target),
                |n| *n == 0,
            )
            .await?;
        Ok(())
    }

    /// Exactly `expected` listed tasks contain `name`
    pub async fn should_have_count(&self, name: &str, expected: usize) -> E2eResult<()> {
        let target = self.task_text(name);
        self.poller
            .until(
                &format!("tasks {:?} listed", name),
                format!("{} visible matches", expected),
                || self.driver.count(&target),
                |n| *n == expected,
            )
            .await?;
        Ok(())
    }

    /// The task called `name` is rendered as finished
    pub async fn should_be_done(&self, name: &str) -> E2eResult<()> {
        self.expect_decoration(name, true).await
    }

    /// The task called `name` is rendered as open
    pub async fn should_not_be_done(&self, name: &str) -> E2eResult<()> {
        self.expect_decoration(name, false).await
    }

    /// The alert region shows exactly `message`
    pub async fn alert_have_text(&self, message: &str) -> E2eResult<()> {
        let target = Locator::css(&self.selectors.alert);
        self.poller
            .until(
                "alert text",
                format!("{:?}", message),
                || async {
                    let texts = self.driver.texts(&target).await?;
                    Ok(texts.into_iter().next().map(|t| t.trim().to_string()))
                },
                |text| text.as_deref() == Some(message),
            )
            .await?;
        Ok(())
    }

    /// The task name input reports exactly `message` as its validation message
    pub async fn should_have_validation_message(&self, message: &str) -> E2eResult<()> {
        self.poller
            .until(
                "task name validation message",
                format!("{:?}", message),
                || self.validation_message(),
                |text| text == message,
            )
            .await?;
        Ok(())
    }

    async fn expect_decoration(&self, name: &str, done: bool) -> E2eResult<()> {
        let target = self.task_text(name);
        let (what, expected) = if done {
            (format!("task {:?} done", name), format!("text-decoration-line {}", DONE_DECORATION))
        } else {
            (format!("task {:?} not done", name), format!("text-decoration-line other than {}", DONE_DECORATION))
        };

        self.poller
            .until(
                &what,
                expected,
                || self.driver.css_value(&target, "text-decoration-line"),
                |value| match value {
                    Some(v) => v.contains(DONE_DECORATION) == done,
                    None => false,
                },
            )
            .await?;
        Ok(())
    }

    fn row(&self, name: &str) -> Locator {
        Locator::css(&self.selectors.task_row).has_text(name)
    }

    fn task_text(&self, name: &str) -> Locator {
        Locator::css(&self.selectors.task_text).has_text(name)
    }
}
