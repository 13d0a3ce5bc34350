//! Out-of-band API helpers for scenario setup and cleanup
//!
//! These calls bypass the UI so a scenario can start from a known backend
//! state. They never touch the page.

use reqwest::{Client, Method, Response, StatusCode, Url};
use tracing::debug;

use tasklist_common::Task;

use crate::config::{AppConfig, TimeoutConfig};
use crate::error::{E2eError, E2eResult};

/// Client for the application's task endpoints
#[derive(Debug, Clone)]
pub struct TaskApi {
    client: Client,
    tasks_url: Url,
    helper_url: Url,
}

impl TaskApi {
    /// Build a client from the app and timeout settings
    pub fn new(app: &AppConfig, timeouts: &TimeoutConfig) -> E2eResult<Self> {
        let client = Client::builder().timeout(timeouts.request()).build()?;
        Self::with_client(client, app)
    }

    /// Use an existing HTTP client
    pub fn with_client(client: Client, app: &AppConfig) -> E2eResult<Self> {
        let base = app.api_base()?;
        Ok(Self {
            client,
            tasks_url: base.join(&app.tasks_path)?,
            helper_url: base.join(&app.helper_tasks_path)?,
        })
    }

    /// Create a task directly in the backend.
    ///
    /// Any non-success status, including a conflict for an existing name,
    /// is returned as an error.
    pub async fn post_task(&self, task: &Task) -> E2eResult<()> {
        debug!("POST {} name={:?}", self.tasks_url, task.name);

        let resp = self
            .client
            .post(self.tasks_url.clone())
            .json(task)
            .send()
            .await?;

        ensure_success(Method::POST, resp).await?;
        Ok(())
    }

    /// Delete every task called `name`. Succeeds when there is none.
    pub async fn delete_task_by_helper(&self, name: &str) -> E2eResult<()> {
        let url = self.helper_url_for(name)?;
        debug!("DELETE {}", url);

        let resp = self.client.delete(url).send().await?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!("No task named {:?} to delete", name);
            return Ok(());
        }
        ensure_success(Method::DELETE, resp).await?;
        Ok(())
    }

    /// All tasks currently stored
    pub async fn list_tasks(&self) -> E2eResult<Vec<Task>> {
        let resp = self.client.get(self.tasks_url.clone()).send().await?;
        let resp = ensure_success(Method::GET, resp).await?;
        Ok(resp.json().await?)
    }

    /// Number of stored tasks called exactly `name`
    pub async fn count_by_name(&self, name: &str) -> E2eResult<usize> {
        let tasks = self.list_tasks().await?;
        Ok(tasks.iter().filter(|t| t.name == name).count())
    }

    /// Whether the task endpoint answers at all
    pub async fn health(&self) -> bool {
        match self.client.get(self.tasks_url.clone()).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("API health check failed: {}", e);
                false
            }
        }
    }

    /// `{helper}/{name}` with the name encoded as one path segment
    fn helper_url_for(&self, name: &str) -> E2eResult<Url> {
        let mut url = self.helper_url.clone();
        url.path_segments_mut()
            .map_err(|_| E2eError::Config(format!("cannot append a path to {}", self.helper_url)))?
            .pop_if_empty()
            .push(name);
        Ok(url)
    }
}

async fn ensure_success(method: Method, resp: Response) -> E2eResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let url = resp.url().to_string();
    let body = resp.text().await.unwrap_or_default();
    Err(E2eError::Api {
        method: method.to_string(),
        url,
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> TaskApi {
        TaskApi::new(&AppConfig::default(), &TimeoutConfig::default()).unwrap()
    }

    #[test]
    fn test_endpoint_urls() {
        let api = api();
        assert_eq!(api.tasks_url.as_str(), "http://localhost:3333/tasks");
        assert_eq!(api.helper_url.as_str(), "http://localhost:3333/helper/tasks");
    }

    #[test]
    fn test_name_is_one_encoded_segment() {
        let url = api().helper_url_for("Buy milk/eggs?").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:3333/helper/tasks/Buy%20milk%2Feggs%3F"
        );
    }

    #[test]
    fn test_trailing_slash_in_helper_path() {
        let app = AppConfig {
            helper_tasks_path: "/helper/tasks/".to_string(),
            ..Default::default()
        };
        let api = TaskApi::new(&app, &TimeoutConfig::default()).unwrap();
        assert_eq!(
            api.helper_url_for("x").unwrap().as_str(),
            "http://localhost:3333/helper/tasks/x"
        );
    }
}
