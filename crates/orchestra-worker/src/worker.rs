//! The worker core and its two loops.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use sysinfo::System;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use orchestra_node::NodeStats;
use orchestra_runtime::{ContainerRuntime, ContainerStatus};
use orchestra_store::{PendingQueue, Store, StoreError};
use orchestra_task::{state::can_transition_to, Config, State, Task};

use crate::error::{WorkerError, WorkerResult};

/// A worker node: a task queue, a task store, and a container runtime.
///
/// Shared between the HTTP handlers (producers) and the runner/updater
/// loops (consumers) behind an `Arc`; all interior state is synchronized.
pub struct Worker {
    name: String,
    queue: PendingQueue<Task>,
    store: Store<Task>,
    runtime: Arc<dyn ContainerRuntime>,
    accepted: AtomicU64,
    sys: Mutex<System>,
}

impl Worker {
    pub fn new(name: impl Into<String>, store: Store<Task>, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            name: name.into(),
            queue: PendingQueue::new(),
            store,
            runtime,
            accepted: AtomicU64::new(0),
            sys: Mutex::new(System::new_all()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a task for the runner loop.
    pub fn add_task(&self, task: Task) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.queue.enqueue(task);
    }

    /// Snapshot of every task this worker knows about.
    pub fn get_tasks(&self) -> WorkerResult<Vec<Task>> {
        Ok(self.store.list()?)
    }

    /// Look up a task by id.
    pub fn get_task(&self, key: &str) -> Result<Task, StoreError> {
        self.store.get(key)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// A fresh resource snapshot for the `/stats` endpoint.
    pub fn stats(&self) -> NodeStats {
        let mut sys = self.sys.lock().expect("sysinfo lock poisoned");
        sys.refresh_all();
        NodeStats::gather(&sys, self.accepted.load(Ordering::Relaxed))
    }

    /// One runner cycle: dequeue a task and apply its desired state.
    ///
    /// A task seen for the first time seeds the store. The transition from
    /// the persisted state to the dequeued state must be legal, otherwise
    /// nothing is touched and the violation is reported.
    pub async fn run_next_task(&self) -> WorkerResult<()> {
        let Some(task) = self.queue.dequeue() else {
            debug!(worker = %self.name, "no tasks in queue");
            return Ok(());
        };

        let key = task.id.to_string();
        let persisted = match self.store.get(&key) {
            Ok(t) => t,
            Err(StoreError::NotFound(_)) => {
                self.store.put(&key, &task)?;
                task.clone()
            }
            Err(e) => return Err(e.into()),
        };

        if !can_transition_to(persisted.state, task.state) {
            return Err(WorkerError::TransitionViolation {
                id: task.id,
                from: persisted.state,
                to: task.state,
            });
        }

        match task.state {
            State::Scheduled => self.start_task(task).await,
            State::Completed => self.stop_task(task).await,
            other => Err(WorkerError::TransitionViolation {
                id: task.id,
                from: persisted.state,
                to: other,
            }),
        }
    }

    /// Start a task's container and promote it to `Running`.
    async fn start_task(&self, mut task: Task) -> WorkerResult<()> {
        task.start_time = Some(Utc::now());
        let key = task.id.to_string();
        let config = Config::from(&task);

        match self.runtime.run(&config).await {
            Ok(container_id) => {
                info!(worker = %self.name, task_id = %task.id, %container_id, "task started");
                task.container_id = Some(container_id);
                task.state = State::Running;
                self.store.put(&key, &task)?;
                Ok(())
            }
            Err(e) => {
                task.state = State::Failed;
                task.end_time = Some(Utc::now());
                self.store.put(&key, &task)?;
                Err(e.into())
            }
        }
    }

    /// Stop a task's container and mark it `Completed`.
    ///
    /// The task goes to `Completed` whether or not the engine cooperates;
    /// a stop error is still surfaced to the caller.
    async fn stop_task(&self, mut task: Task) -> WorkerResult<()> {
        let Some(container_id) = task.container_id.clone() else {
            return Err(WorkerError::MissingContainerId(task.id));
        };

        let stop_result = self.runtime.stop(&container_id).await;

        task.state = State::Completed;
        task.end_time = Some(Utc::now());
        self.store.put(&task.id.to_string(), &task)?;
        info!(worker = %self.name, task_id = %task.id, %container_id, "task stopped");

        stop_result.map_err(Into::into)
    }

    /// One updater cycle: inspect every running task's container and
    /// demote tasks whose container has exited.
    pub async fn update_tasks(&self) -> WorkerResult<()> {
        for mut task in self.store.list()? {
            if task.state != State::Running {
                continue;
            }
            let Some(container_id) = task.container_id.clone() else {
                continue;
            };

            match self.runtime.inspect(&container_id).await {
                Ok(ContainerStatus::Exited) => {
                    warn!(task_id = %task.id, %container_id, "container exited, marking task failed");
                    task.state = State::Failed;
                    task.end_time = Some(Utc::now());
                    self.store.put(&task.id.to_string(), &task)?;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(task_id = %task.id, %container_id, error = %e, "inspect failed, skipping");
                }
            }
        }
        Ok(())
    }
}

/// The runner loop: one [`Worker::run_next_task`] per wake.
pub async fn run_loop(worker: Arc<Worker>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    info!(worker = %worker.name(), ?interval, "runner loop started");
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                if let Err(e) = worker.run_next_task().await {
                    warn!(worker = %worker.name(), error = %e, "task run failed");
                }
            }
            _ = shutdown.changed() => {
                info!(worker = %worker.name(), "runner loop shutting down");
                break;
            }
        }
    }
}

/// The updater loop: one [`Worker::update_tasks`] pass per wake.
pub async fn update_loop(worker: Arc<Worker>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    info!(worker = %worker.name(), ?interval, "updater loop started");
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                if let Err(e) = worker.update_tasks().await {
                    warn!(worker = %worker.name(), error = %e, "task update failed");
                }
            }
            _ = shutdown.changed() => {
                info!(worker = %worker.name(), "updater loop shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestra_runtime::FakeRuntime;
    use orchestra_store::Storage;

    fn test_worker(runtime: FakeRuntime) -> (Worker, Arc<FakeRuntime>) {
        let runtime = Arc::new(runtime);
        let store = Storage::open_in_memory().unwrap().store("tasks").unwrap();
        (
            Worker::new("w1:5556", store, runtime.clone()),
            runtime,
        )
    }

    fn scheduled_task() -> Task {
        let mut task = Task::new("web", "nginx:1");
        task.state = State::Scheduled;
        task
    }

    #[tokio::test]
    async fn scheduled_task_is_started_and_promoted_to_running() {
        let (worker, runtime) = test_worker(FakeRuntime::new());
        let task = scheduled_task();
        worker.add_task(task.clone());

        worker.run_next_task().await.unwrap();

        let stored = worker.get_task(&task.id.to_string()).unwrap();
        assert_eq!(stored.state, State::Running);
        assert_eq!(stored.container_id.as_deref(), Some("fake-1"));
        assert!(stored.start_time.is_some());
        assert!(stored.end_time.is_none());
        assert_eq!(runtime.run_calls(), 1);
    }

    #[tokio::test]
    async fn runtime_failure_marks_the_task_failed() {
        let (worker, _) = test_worker(FakeRuntime::new().fail_run());
        let task = scheduled_task();
        worker.add_task(task.clone());

        let err = worker.run_next_task().await.unwrap_err();
        assert!(matches!(err, WorkerError::Runtime(_)));

        let stored = worker.get_task(&task.id.to_string()).unwrap();
        assert_eq!(stored.state, State::Failed);
        assert!(stored.end_time.is_some());
    }

    #[tokio::test]
    async fn illegal_transition_is_refused_without_touching_the_runtime() {
        let (worker, runtime) = test_worker(FakeRuntime::new());

        // Persist a completed task, then ask for it to be scheduled again.
        let mut done = Task::new("web", "nginx:1");
        done.state = State::Completed;
        worker.store.put(&done.id.to_string(), &done).unwrap();

        let mut retry = done.clone();
        retry.state = State::Scheduled;
        worker.add_task(retry);

        let err = worker.run_next_task().await.unwrap_err();
        assert!(matches!(
            err,
            WorkerError::TransitionViolation {
                from: State::Completed,
                to: State::Scheduled,
                ..
            }
        ));
        assert_eq!(runtime.run_calls(), 0);
        assert_eq!(
            worker.get_task(&done.id.to_string()).unwrap().state,
            State::Completed
        );
    }

    #[tokio::test]
    async fn redelivery_while_still_scheduled_is_tolerated() {
        let (worker, runtime) = test_worker(FakeRuntime::new());
        let task = scheduled_task();

        // The store already saw this placement but the container never
        // started; a manager retry must pass the Scheduled -> Scheduled
        // self-transition and start it.
        worker.store.put(&task.id.to_string(), &task).unwrap();
        worker.add_task(task.clone());
        worker.run_next_task().await.unwrap();

        assert_eq!(runtime.run_calls(), 1);
        assert_eq!(
            worker.get_task(&task.id.to_string()).unwrap().state,
            State::Running
        );
    }

    #[tokio::test]
    async fn duplicate_delivery_after_promotion_is_refused() {
        let (worker, runtime) = test_worker(FakeRuntime::new());
        let task = scheduled_task();

        worker.add_task(task.clone());
        worker.run_next_task().await.unwrap();

        // The persisted task is now Running; Running -> Scheduled is
        // illegal, so the duplicate is refused without a runtime call.
        worker.add_task(task.clone());
        let err = worker.run_next_task().await.unwrap_err();
        assert!(matches!(err, WorkerError::TransitionViolation { .. }));
        assert_eq!(runtime.run_calls(), 1);
    }

    #[tokio::test]
    async fn first_sighting_seeds_the_store() {
        let (worker, _) = test_worker(FakeRuntime::new());
        let task = scheduled_task();

        assert!(worker.get_task(&task.id.to_string()).is_err());
        worker.add_task(task.clone());
        worker.run_next_task().await.unwrap();
        assert!(worker.get_task(&task.id.to_string()).is_ok());
    }

    #[tokio::test]
    async fn completed_request_stops_the_container() {
        let (worker, runtime) = test_worker(FakeRuntime::new());
        let task = scheduled_task();
        worker.add_task(task.clone());
        worker.run_next_task().await.unwrap();

        let mut stop = worker.get_task(&task.id.to_string()).unwrap();
        stop.state = State::Completed;
        worker.add_task(stop);
        worker.run_next_task().await.unwrap();

        let stored = worker.get_task(&task.id.to_string()).unwrap();
        assert_eq!(stored.state, State::Completed);
        assert!(stored.end_time.is_some());
        assert!(stored.end_time.unwrap() >= stored.start_time.unwrap());
        assert_eq!(runtime.stopped(), vec!["fake-1"]);
    }

    #[tokio::test]
    async fn stop_error_still_completes_the_task() {
        let (worker, _) = test_worker(FakeRuntime::new().fail_stop());
        let mut task = Task::new("web", "nginx:1");
        task.state = State::Running;
        task.container_id = Some("c1".to_string());
        worker.store.put(&task.id.to_string(), &task).unwrap();

        let mut stop = task.clone();
        stop.state = State::Completed;
        worker.add_task(stop);

        let err = worker.run_next_task().await.unwrap_err();
        assert!(matches!(err, WorkerError::Runtime(_)));
        assert_eq!(
            worker.get_task(&task.id.to_string()).unwrap().state,
            State::Completed
        );
    }

    #[tokio::test]
    async fn empty_queue_is_a_quiet_no_op() {
        let (worker, runtime) = test_worker(FakeRuntime::new());
        worker.run_next_task().await.unwrap();
        assert_eq!(runtime.run_calls(), 0);
    }

    #[tokio::test]
    async fn updater_demotes_exited_containers() {
        let (worker, runtime) = test_worker(FakeRuntime::new());
        let task = scheduled_task();
        worker.add_task(task.clone());
        worker.run_next_task().await.unwrap();

        runtime.set_inspect_status(ContainerStatus::Exited);
        worker.update_tasks().await.unwrap();

        let stored = worker.get_task(&task.id.to_string()).unwrap();
        assert_eq!(stored.state, State::Failed);
        assert!(stored.end_time.is_some());
    }

    #[tokio::test]
    async fn updater_leaves_healthy_containers_alone() {
        let (worker, runtime) = test_worker(FakeRuntime::new());
        let task = scheduled_task();
        worker.add_task(task.clone());
        worker.run_next_task().await.unwrap();

        worker.update_tasks().await.unwrap();

        assert_eq!(
            worker.get_task(&task.id.to_string()).unwrap().state,
            State::Running
        );
        assert_eq!(runtime.inspect_calls(), 1);
    }

    #[tokio::test]
    async fn updater_ignores_tasks_that_are_not_running() {
        let (worker, runtime) = test_worker(FakeRuntime::new());
        let mut task = Task::new("web", "nginx:1");
        task.state = State::Completed;
        task.container_id = Some("c1".to_string());
        worker.store.put(&task.id.to_string(), &task).unwrap();

        runtime.set_inspect_status(ContainerStatus::Exited);
        worker.update_tasks().await.unwrap();

        assert_eq!(runtime.inspect_calls(), 0);
        assert_eq!(
            worker.get_task(&task.id.to_string()).unwrap().state,
            State::Completed
        );
    }

    #[tokio::test]
    async fn accepted_tasks_show_up_in_stats() {
        let (worker, _) = test_worker(FakeRuntime::new());
        worker.add_task(scheduled_task());
        worker.add_task(scheduled_task());

        assert_eq!(worker.stats().task_count, 2);
        assert_eq!(worker.queue_len(), 2);
    }
}
