//! In-process stand-in for the task list application
//!
//! `TaskApp` serves the REST endpoints with axum. `FakeBrowser` opens pages
//! that interpret the harness locators against the same task collection,
//! rendering UI changes after a configurable delay the way a real frontend
//! re-renders after its API call returns.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use tasklist_common::Task;
use tasklist_e2e::driver::{Locator, PageDriver, PageLauncher};
use tasklist_e2e::{E2eError, E2eResult, HarnessConfig, TaskSelectors};

pub const DUPLICATE_ALERT: &str = "Task already exists!";
pub const REQUIRED_FIELD_MESSAGE: &str = "This is a required field";

#[derive(Debug, Default)]
pub struct Behavior {
    /// Answer 409 when a name is taken
    pub reject_duplicates: bool,

    /// Answer 500 on delete-by-name
    pub fail_deletes: bool,

    /// Answer 404 instead of 204 when nothing matched a delete
    pub missing_is_404: bool,

    /// Render a rejected task as a row anyway, next to the alert
    pub show_rejected_rows: bool,

    /// Delay between a UI action and its rendered effect
    pub render_delay: Duration,
}

#[derive(Debug, Default)]
struct Backend {
    tasks: Vec<Task>,
    behavior: Behavior,
}

type Shared = Arc<Mutex<Backend>>;

pub struct TaskApp {
    backend: Shared,
    pub addr: SocketAddr,
    server: JoinHandle<()>,
}

impl TaskApp {
    pub async fn start() -> Self {
        let backend: Shared = Arc::new(Mutex::new(Backend {
            behavior: Behavior {
                reject_duplicates: true,
                render_delay: Duration::from_millis(50),
                ..Default::default()
            },
            ..Default::default()
        }));

        let router = Router::new()
            .route("/tasks", get(list_tasks).post(create_task))
            .route("/helper/tasks/:name", delete(delete_by_name))
            .with_state(backend.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            backend,
            addr,
            server,
        }
    }

    /// Harness configuration pointing at this app, with short budgets
    pub fn config(&self) -> HarnessConfig {
        let mut config = HarnessConfig::default();
        config.app.api_url = format!("http://{}", self.addr);
        config.app.base_url = "http://tasklist.test".to_string();
        config.timeouts.assertion_ms = 2_000;
        config.timeouts.poll_interval_ms = 20;
        config.timeouts.request_ms = 2_000;
        config.output_dir = std::env::temp_dir().join("tasklist-e2e-tests");
        config
    }

    pub fn browser(&self) -> Arc<FakeBrowser> {
        Arc::new(FakeBrowser {
            backend: self.backend.clone(),
            selectors: TaskSelectors::default(),
        })
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.backend.lock().unwrap().tasks.clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.tasks().iter().filter(|t| t.name == name).count()
    }

    pub fn insert(&self, task: Task) {
        self.backend.lock().unwrap().tasks.push(task);
    }

    pub fn configure(&self, f: impl FnOnce(&mut Behavior)) {
        f(&mut self.backend.lock().unwrap().behavior);
    }
}

impl Drop for TaskApp {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn list_tasks(State(backend): State<Shared>) -> Json<Vec<Task>> {
    Json(backend.lock().unwrap().tasks.clone())
}

async fn create_task(
    State(backend): State<Shared>,
    Json(task): Json<Task>,
) -> (StatusCode, Json<Value>) {
    let mut backend = backend.lock().unwrap();
    match insert_task(&mut backend, task) {
        Ok(task) => (StatusCode::CREATED, Json(json!(task))),
        Err((status, message)) => (status, Json(json!({ "message": message }))),
    }
}

async fn delete_by_name(State(backend): State<Shared>, Path(name): Path<String>) -> StatusCode {
    let mut backend = backend.lock().unwrap();
    if backend.behavior.fail_deletes {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    let before = backend.tasks.len();
    backend.tasks.retain(|t| t.name != name);

    if backend.tasks.len() == before && backend.behavior.missing_is_404 {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::NO_CONTENT
    }
}

fn insert_task(backend: &mut Backend, task: Task) -> Result<Task, (StatusCode, &'static str)> {
    if task.is_blank() {
        return Err((StatusCode::BAD_REQUEST, "Task name is required"));
    }
    if backend.behavior.reject_duplicates && backend.tasks.iter().any(|t| t.name == task.name) {
        return Err((StatusCode::CONFLICT, DUPLICATE_ALERT));
    }
    backend.tasks.push(task.clone());
    Ok(task)
}

/// Opens fake pages over a `TaskApp` backend
pub struct FakeBrowser {
    backend: Shared,
    selectors: TaskSelectors,
}

#[async_trait]
impl PageLauncher for FakeBrowser {
    async fn open_page(&self) -> E2eResult<Arc<dyn PageDriver>> {
        Ok(Arc::new(FakePage {
            backend: self.backend.clone(),
            selectors: self.selectors.clone(),
            ui: Arc::new(Mutex::new(Ui::default())),
        }))
    }
}

#[derive(Debug, Default)]
struct Ui {
    loaded: bool,
    input: String,
    validation_message: String,
    alert: Option<String>,
    rendered: Vec<Task>,
}

/// A page that understands the default task list selectors
pub struct FakePage {
    backend: Shared,
    selectors: TaskSelectors,
    ui: Arc<Mutex<Ui>>,
}

impl FakePage {
    fn not_found(&self, op: &str, target: &Locator) -> E2eError {
        E2eError::Timeout(format!("{}:{} (no actionable element)", op, target))
    }

    fn require_loaded(&self, op: &str, target: &Locator) -> E2eResult<()> {
        if self.ui.lock().unwrap().loaded {
            Ok(())
        } else {
            Err(self.not_found(op, target))
        }
    }

    /// Re-render the list, and optionally show an alert, after the render delay
    fn schedule_render(&self, alert: Option<String>, rejected: Option<Task>) {
        let backend = self.backend.clone();
        let ui = self.ui.clone();
        let delay = backend.lock().unwrap().behavior.render_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut tasks = backend.lock().unwrap().tasks.clone();
            tasks.extend(rejected);
            let mut ui = ui.lock().unwrap();
            ui.rendered = tasks;
            if alert.is_some() {
                ui.alert = alert;
            }
        });
    }

    fn submit(&self) {
        let input = self.ui.lock().unwrap().input.clone();

        if input.trim().is_empty() {
            // Native validation: the form never reaches the backend
            self.ui.lock().unwrap().validation_message = REQUIRED_FIELD_MESSAGE.to_string();
            return;
        }

        let task = Task::new(input);
        let (result, show_rejected) = {
            let mut backend = self.backend.lock().unwrap();
            let show_rejected = backend.behavior.show_rejected_rows;
            (insert_task(&mut backend, task.clone()), show_rejected)
        };
        match result {
            Ok(_) => {
                self.ui.lock().unwrap().input.clear();
                self.schedule_render(None, None);
            }
            Err((_, message)) => {
                let rejected = show_rejected.then_some(task);
                self.schedule_render(Some(message.to_string()), rejected);
            }
        }
    }

    /// Name of the first rendered row matching a row locator
    fn rendered_row(&self, target: &Locator) -> Option<String> {
        let text = target.has_text.as_deref()?;
        self.ui
            .lock()
            .unwrap()
            .rendered
            .iter()
            .find(|t| t.name.contains(text))
            .map(|t| t.name.clone())
    }

    fn matching_tasks(&self, target: &Locator) -> Vec<Task> {
        if target.selector != self.selectors.task_text {
            return Vec::new();
        }
        let ui = self.ui.lock().unwrap();
        ui.rendered
            .iter()
            .filter(|t| match &target.has_text {
                Some(text) => t.name.contains(text.as_str()),
                None => true,
            })
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&self, _url: &str, _timeout: Duration) -> E2eResult<()> {
        let tasks = self.backend.lock().unwrap().tasks.clone();
        let mut ui = self.ui.lock().unwrap();
        *ui = Ui {
            loaded: true,
            rendered: tasks,
            ..Default::default()
        };
        Ok(())
    }

    async fn fill(&self, target: &Locator, value: &str, _timeout: Duration) -> E2eResult<()> {
        self.require_loaded("fill", target)?;
        if target.selector != self.selectors.input_task_name {
            return Err(self.not_found("fill", target));
        }
        let mut ui = self.ui.lock().unwrap();
        ui.input = value.to_string();
        ui.validation_message.clear();
        Ok(())
    }

    async fn click(&self, target: &Locator, _timeout: Duration) -> E2eResult<()> {
        self.require_loaded("click", target)?;

        if target.selector == self.selectors.submit_button && target.child.is_none() {
            self.submit();
            return Ok(());
        }

        if target.selector != self.selectors.task_row {
            return Err(self.not_found("click", target));
        }
        let name = self
            .rendered_row(target)
            .ok_or_else(|| self.not_found("click", target))?;
        let control = target.leaf().selector.as_str();

        {
            let mut backend = self.backend.lock().unwrap();
            if control == self.selectors.toggle_button {
                for task in backend.tasks.iter_mut().filter(|t| t.name == name) {
                    task.is_done = !task.is_done;
                }
            } else if control == self.selectors.delete_button {
                backend.tasks.retain(|t| t.name != name);
            } else {
                return Err(self.not_found("click", target));
            }
        }

        self.schedule_render(None, None);
        Ok(())
    }

    async fn count(&self, target: &Locator) -> E2eResult<usize> {
        if target.selector == self.selectors.alert {
            return Ok(self.ui.lock().unwrap().alert.iter().count());
        }
        Ok(self.matching_tasks(target).len())
    }

    async fn texts(&self, target: &Locator) -> E2eResult<Vec<String>> {
        if target.selector == self.selectors.alert {
            return Ok(self.ui.lock().unwrap().alert.iter().cloned().collect());
        }
        Ok(self.matching_tasks(target).into_iter().map(|t| t.name).collect())
    }

    async fn property(&self, target: &Locator, name: &str) -> E2eResult<Value> {
        if target.selector == self.selectors.input_task_name && name == "validationMessage" {
            return Ok(Value::String(self.ui.lock().unwrap().validation_message.clone()));
        }
        Ok(Value::Null)
    }

    async fn css_value(&self, target: &Locator, property: &str) -> E2eResult<Option<String>> {
        if property != "text-decoration-line" {
            return Ok(None);
        }
        Ok(self.matching_tasks(target).first().map(|t| {
            if t.is_done { "line-through" } else { "none" }.to_string()
        }))
    }

    async fn close(&self) -> E2eResult<()> {
        self.ui.lock().unwrap().loaded = false;
        Ok(())
    }
}
