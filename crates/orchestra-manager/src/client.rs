//! HTTP client for the worker task API.

use reqwest::StatusCode;
use tracing::debug;
use uuid::Uuid;

use orchestra_api::ResponseError;
use orchestra_task::{Task, TaskEvent};

use crate::error::{ManagerError, ManagerResult};
use crate::retry::{with_retry, RetryOptions};

/// Client side of the manager → worker hand-off.
#[derive(Clone)]
pub struct WorkerClient {
    http: reqwest::Client,
    retry: RetryOptions,
}

impl WorkerClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            retry: RetryOptions::default(),
        }
    }

    /// Override the retry policy used for idempotent calls.
    pub fn with_retry_options(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    /// GET a worker's task list. Idempotent, so wrapped in the retry
    /// helper.
    pub async fn get_tasks(&self, worker: &str) -> ManagerResult<Vec<Task>> {
        let url = format!("http://{worker}/tasks");
        let resp = with_retry(self.retry, || self.http.get(&url).send()).await?;

        if !resp.status().is_success() {
            return Err(self.remote_error(worker, resp).await);
        }

        resp.json::<Vec<Task>>().await.map_err(|e| ManagerError::Decode {
            worker: worker.to_string(),
            details: e.to_string(),
        })
    }

    /// POST an event to a worker. Never retried here — the dispatcher's
    /// re-enqueue is the retry path for hand-offs.
    pub async fn send_event(&self, worker: &str, event: &TaskEvent) -> ManagerResult<Task> {
        let url = format!("http://{worker}/tasks");
        let resp = self.http.post(&url).json(event).send().await?;

        if resp.status() != StatusCode::OK && resp.status() != StatusCode::CREATED {
            return Err(self.remote_error(worker, resp).await);
        }

        let task = resp.json::<Task>().await.map_err(|e| ManagerError::Decode {
            worker: worker.to_string(),
            details: e.to_string(),
        })?;
        debug!(task_id = %task.id, %worker, "event delivered");
        Ok(task)
    }

    /// DELETE a task on a worker.
    pub async fn stop_task(&self, worker: &str, task_id: Uuid) -> ManagerResult<()> {
        let url = format!("http://{worker}/tasks/{task_id}");
        let resp = self.http.delete(&url).send().await?;

        if resp.status() != StatusCode::NO_CONTENT {
            return Err(self.remote_error(worker, resp).await);
        }
        debug!(%task_id, %worker, "stop delivered");
        Ok(())
    }

    /// Decode the worker's error envelope out of a failed response.
    async fn remote_error(&self, worker: &str, resp: reqwest::Response) -> ManagerError {
        let status = resp.status();
        match resp.json::<ResponseError>().await {
            Ok(error) => ManagerError::Remote {
                worker: worker.to_string(),
                error,
            },
            Err(e) => ManagerError::Decode {
                worker: worker.to_string(),
                details: format!("error body for status {status} was unreadable: {e}"),
            },
        }
    }
}

impl Default for WorkerClient {
    fn default() -> Self {
        Self::new()
    }
}
