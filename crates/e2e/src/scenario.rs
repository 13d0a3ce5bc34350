//! The task list scenarios
//!
//! Every scenario is a straight line: API preconditions, then UI actions,
//! then polling assertions. Failures are tagged with the phase they
//! happened in so reports can tell "environment not ready" apart from
//! "behavior wrong".

use serde::{Deserialize, Serialize};
use tracing::debug;

use tasklist_common::{keys, FixtureSet, Task};

use crate::api::TaskApi;
use crate::error::{E2eError, Mismatch, Phase, PhaseExt, ScenarioFailure};
use crate::page::TasksPage;

/// Alert shown when creating a task whose name is taken
pub const DUPLICATE_ALERT: &str = "Task already exists!";

/// Native validation message of the empty task name input
pub const REQUIRED_FIELD_MESSAGE: &str = "This is a required field";

/// Everything a scenario may touch
pub struct ScenarioContext<'a> {
    pub api: &'a TaskApi,
    pub page: &'a TasksPage,
    pub fixtures: &'a FixtureSet,
}

impl ScenarioContext<'_> {
    fn fixture(&self, key: &str) -> Result<&Task, ScenarioFailure> {
        self.fixtures.get(key).during(Phase::Precondition)
    }

    /// Remove any leftover with the fixture's name, then create it via the API
    async fn seed(&self, task: &Task) -> Result<(), ScenarioFailure> {
        self.api
            .delete_task_by_helper(&task.name)
            .await
            .during(Phase::Precondition)?;
        self.api.post_task(task).await.during(Phase::Precondition)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Create,
    Duplicate,
    RequiredField,
    Finish,
    Reopen,
    Delete,
}

impl Scenario {
    /// Declaration order, which is also report order
    pub const ALL: [Scenario; 6] = [
        Scenario::Create,
        Scenario::Duplicate,
        Scenario::RequiredField,
        Scenario::Finish,
        Scenario::Reopen,
        Scenario::Delete,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Create => "should be able to create new task",
            Scenario::Duplicate => "should not allow duplicate tasks",
            Scenario::RequiredField => "should not allow empty task field",
            Scenario::Finish => "should finish a task",
            Scenario::Reopen => "should reopen a finished task",
            Scenario::Delete => "should delete a task",
        }
    }

    /// Group tag used for filtering
    pub fn group(&self) -> &'static str {
        match self {
            Scenario::Create | Scenario::Duplicate | Scenario::RequiredField => "taskInput",
            Scenario::Finish | Scenario::Reopen => "taskUpdate",
            Scenario::Delete => "taskDelete",
        }
    }

    pub fn fixture_key(&self) -> &'static str {
        match self {
            Scenario::Create => keys::SUCCESS,
            Scenario::Duplicate => keys::DUPLICATE,
            Scenario::RequiredField => keys::REQUIRED,
            Scenario::Finish => keys::UPDATE,
            Scenario::Reopen => keys::REOPEN,
            Scenario::Delete => keys::DELETE,
        }
    }

    /// Short identifier, as used on the command line
    pub fn id(&self) -> &'static str {
        match self {
            Scenario::Create => "create",
            Scenario::Duplicate => "duplicate",
            Scenario::RequiredField => "required_field",
            Scenario::Finish => "finish",
            Scenario::Reopen => "reopen",
            Scenario::Delete => "delete",
        }
    }

    /// Look a scenario up by its name or its id
    pub fn find(name: &str) -> Option<Scenario> {
        Self::ALL
            .into_iter()
            .find(|s| s.name() == name || s.id() == name)
    }

    pub async fn run(&self, ctx: &ScenarioContext<'_>) -> Result<(), ScenarioFailure> {
        debug!("Scenario '{}' starting", self.name());
        let task = ctx.fixture(self.fixture_key())?;

        match self {
            Scenario::Create => create(ctx, task).await,
            Scenario::Duplicate => duplicate(ctx, task).await,
            Scenario::RequiredField => required_field(ctx, task).await,
            Scenario::Finish => finish(ctx, task).await,
            Scenario::Reopen => reopen(ctx, task).await,
            Scenario::Delete => delete(ctx, task).await,
        }
    }
}

async fn create(ctx: &ScenarioContext<'_>, task: &Task) -> Result<(), ScenarioFailure> {
    // GIVEN no task with this name exists
    ctx.api
        .delete_task_by_helper(&task.name)
        .await
        .during(Phase::Precondition)?;

    // WHEN it is created on the task page
    ctx.page.go().await.during(Phase::Action)?;
    ctx.page.create(task).await.during(Phase::Action)?;

    // THEN it is listed
    ctx.page
        .should_have_text(&task.name)
        .await
        .during(Phase::Assertion)
}

async fn duplicate(ctx: &ScenarioContext<'_>, task: &Task) -> Result<(), ScenarioFailure> {
    // GIVEN the task already exists
    ctx.seed(task).await?;

    // WHEN the same task is created again on the task page
    ctx.page.go().await.during(Phase::Action)?;
    ctx.page.create(task).await.during(Phase::Action)?;

    // THEN the duplicate is reported, and neither listed nor stored
    ctx.page
        .alert_have_text(DUPLICATE_ALERT)
        .await
        .during(Phase::Assertion)?;
    ctx.page
        .should_have_count(&task.name, 1)
        .await
        .during(Phase::Assertion)?;
    expect_stored(ctx, &task.name, 1).await
}

async fn required_field(ctx: &ScenarioContext<'_>, task: &Task) -> Result<(), ScenarioFailure> {
    ctx.page.go().await.during(Phase::Action)?;
    ctx.page.create(task).await.during(Phase::Action)?;

    // Client-side validation only; the alert channel is not involved
    ctx.page
        .should_have_validation_message(REQUIRED_FIELD_MESSAGE)
        .await
        .during(Phase::Assertion)?;
    expect_stored(ctx, &task.name, 0).await
}

async fn finish(ctx: &ScenarioContext<'_>, task: &Task) -> Result<(), ScenarioFailure> {
    ctx.seed(task).await?;

    ctx.page.go().await.during(Phase::Action)?;
    ctx.page.toggle(&task.name).await.during(Phase::Action)?;

    ctx.page
        .should_be_done(&task.name)
        .await
        .during(Phase::Assertion)
}

async fn reopen(ctx: &ScenarioContext<'_>, task: &Task) -> Result<(), ScenarioFailure> {
    ctx.seed(task).await?;

    ctx.page.go().await.during(Phase::Action)?;
    ctx.page.toggle(&task.name).await.during(Phase::Action)?;
    // The second click must hit the finished row, not a stale one
    ctx.page
        .should_be_done(&task.name)
        .await
        .during(Phase::Assertion)?;
    ctx.page.toggle(&task.name).await.during(Phase::Action)?;

    ctx.page
        .should_not_be_done(&task.name)
        .await
        .during(Phase::Assertion)
}

async fn delete(ctx: &ScenarioContext<'_>, task: &Task) -> Result<(), ScenarioFailure> {
    ctx.seed(task).await?;

    ctx.page.go().await.during(Phase::Action)?;
    ctx.page.delete(&task.name).await.during(Phase::Action)?;

    ctx.page
        .should_not_exist(&task.name)
        .await
        .during(Phase::Assertion)
}

/// The backend holds exactly `expected` tasks called `name`
async fn expect_stored(
    ctx: &ScenarioContext<'_>,
    name: &str,
    expected: usize,
) -> Result<(), ScenarioFailure> {
    let stored = ctx
        .api
        .count_by_name(name)
        .await
        .during(Phase::Assertion)?;

    if stored != expected {
        return Err(ScenarioFailure::new(
            Phase::Assertion,
            E2eError::Mismatch(Mismatch {
                what: format!("stored tasks named {:?}", name),
                expected: expected.to_string(),
                last_observed: stored.to_string(),
                elapsed_ms: 0,
            }),
        ));
    }
    Ok(())
}
