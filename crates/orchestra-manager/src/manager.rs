//! The manager core and its two loops.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use orchestra_node::Node;
use orchestra_scheduler::{new_scheduler, Policy, Scheduler};
use orchestra_store::{PendingQueue, Storage, Store, StoreError, StoreResult};
use orchestra_task::{state::can_transition_to, State, Task, TaskEvent};

use crate::client::WorkerClient;
use crate::error::{ManagerError, ManagerResult};

/// The manager's record of which task runs where.
#[derive(Default)]
struct Placements {
    task_worker: HashMap<Uuid, String>,
    worker_tasks: HashMap<String, Vec<Uuid>>,
}

/// The control-plane node: accepts events, places them on workers, and
/// reconciles observed state.
///
/// Shared between the HTTP handlers and the dispatcher/reconciliation
/// loops behind an `Arc`; the scheduler cursor is only ever driven from
/// the dispatcher.
pub struct Manager {
    workers: Vec<String>,
    nodes: Vec<Node>,
    pending: PendingQueue<TaskEvent>,
    task_store: Store<Task>,
    event_store: Store<TaskEvent>,
    placements: Mutex<Placements>,
    scheduler: Mutex<Box<dyn Scheduler>>,
    client: WorkerClient,
}

impl Manager {
    /// Build a manager over a static worker address list.
    pub fn new(workers: Vec<String>, policy: Policy, storage: &Storage) -> StoreResult<Self> {
        let nodes = workers
            .iter()
            .map(|w| Node::new(w.clone(), format!("http://{w}/tasks"), "worker"))
            .collect();

        let mut placements = Placements::default();
        for w in &workers {
            placements.worker_tasks.insert(w.clone(), Vec::new());
        }

        Ok(Self {
            workers,
            nodes,
            pending: PendingQueue::new(),
            task_store: storage.store("tasks")?,
            event_store: storage.store("events")?,
            placements: Mutex::new(placements),
            scheduler: Mutex::new(new_scheduler(policy)),
            client: WorkerClient::new(),
        })
    }

    /// Override the worker client (tests shorten its retry policy).
    pub fn with_client(mut self, client: WorkerClient) -> Self {
        self.client = client;
        self
    }

    /// Queue an event for the dispatcher.
    ///
    /// A task seen for the first time is also seeded into the task store
    /// as submitted, so it is listable before the dispatcher acts. A
    /// repost never overwrites the stored task.
    pub fn add_task(&self, event: TaskEvent) {
        let key = event.task.id.to_string();
        if matches!(self.task_store.get(&key), Err(StoreError::NotFound(_))) {
            if let Err(e) = self.task_store.put(&key, &event.task) {
                warn!(task_id = %event.task.id, error = %e, "failed to seed task store");
            }
        }
        self.pending.enqueue(event);
    }

    /// Snapshot of every task the manager knows about.
    pub fn get_tasks(&self) -> ManagerResult<Vec<Task>> {
        Ok(self.task_store.list()?)
    }

    /// Look up a task by id.
    pub fn get_task(&self, key: &str) -> Result<Task, StoreError> {
        self.task_store.get(key)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// The worker a task is bound to, if any.
    pub fn worker_for(&self, task_id: Uuid) -> Option<String> {
        self.placements
            .lock()
            .expect("placements lock poisoned")
            .task_worker
            .get(&task_id)
            .cloned()
    }

    /// Task ids bound to a worker.
    pub fn tasks_on(&self, worker: &str) -> Vec<Uuid> {
        self.placements
            .lock()
            .expect("placements lock poisoned")
            .worker_tasks
            .get(worker)
            .cloned()
            .unwrap_or_default()
    }

    /// Run the scheduler's three stages over the known nodes.
    fn select_worker(&self, task: &Task) -> ManagerResult<Node> {
        let mut scheduler = self.scheduler.lock().expect("scheduler lock poisoned");
        let candidates = scheduler.select_candidates(task, &self.nodes);
        let scores = scheduler.score(task, &candidates);
        scheduler
            .pick(&scores, &candidates)
            .ok_or(ManagerError::NoCandidates(task.id))
    }

    fn record_placement(&self, task_id: Uuid, worker: &str) {
        let mut placements = self.placements.lock().expect("placements lock poisoned");
        placements.task_worker.insert(task_id, worker.to_string());
        placements
            .worker_tasks
            .entry(worker.to_string())
            .or_default()
            .push(task_id);
    }

    fn forget_placement(&self, task_id: Uuid, worker: &str) {
        let mut placements = self.placements.lock().expect("placements lock poisoned");
        placements.task_worker.remove(&task_id);
        if let Some(tasks) = placements.worker_tasks.get_mut(worker) {
            tasks.retain(|id| *id != task_id);
        }
    }

    /// One dispatcher cycle: dequeue one event and act on it.
    ///
    /// An event for an already-placed task is a mutation — only a legal
    /// move to `Completed` is honored, as a DELETE to the bound worker.
    /// A new task goes through the scheduler, gets its placement
    /// recorded, and is handed off with a POST; if the transport fails,
    /// the placement is rolled back and the event re-enqueued so the next
    /// cycle retries (at-least-once).
    pub async fn send_work(&self) -> ManagerResult<()> {
        let Some(mut event) = self.pending.dequeue() else {
            return Err(ManagerError::NoPendingTasks);
        };

        self.event_store.put(&event.id.to_string(), &event)?;
        let task_id = event.task.id;

        if let Some(worker) = self.worker_for(task_id) {
            let persisted = self.task_store.get(&task_id.to_string())?;
            if event.state == State::Completed
                && can_transition_to(persisted.state, State::Completed)
            {
                info!(%task_id, %worker, "stopping placed task");
                return self.client.stop_task(&worker, task_id).await;
            }
            return Err(ManagerError::InvalidMutation {
                id: task_id,
                state: persisted.state,
                requested: event.state,
            });
        }

        let node = self.select_worker(&event.task)?;
        self.record_placement(task_id, &node.name);

        event.task.state = State::Scheduled;
        self.task_store.put(&task_id.to_string(), &event.task)?;

        match self.client.send_event(&node.name, &event).await {
            Ok(_) => {
                info!(%task_id, worker = %node.name, "task placed");
                Ok(())
            }
            Err(ManagerError::Transport(e)) => {
                warn!(%task_id, worker = %node.name, error = %e, "hand-off failed, requeueing");
                self.forget_placement(task_id, &node.name);
                self.pending.enqueue(event);
                Err(ManagerError::Transport(e))
            }
            Err(e) => Err(e),
        }
    }

    /// One reconciliation cycle: poll every worker and merge what it
    /// reports into the task store. Unknown tasks are ignored, and a
    /// merge never moves a task against the transition table.
    pub async fn update_tasks(&self) {
        for worker in &self.workers {
            debug!(%worker, "polling worker for task updates");
            let tasks = match self.client.get_tasks(worker).await {
                Ok(tasks) => tasks,
                Err(e) => {
                    warn!(%worker, error = %e, "failed to poll worker");
                    continue;
                }
            };

            for observed in tasks {
                if let Err(e) = self.merge_observed(&observed) {
                    warn!(task_id = %observed.id, error = %e, "failed to merge task update");
                }
            }
        }
    }

    fn merge_observed(&self, observed: &Task) -> ManagerResult<()> {
        let key = observed.id.to_string();
        let mut local = match self.task_store.get(&key) {
            Ok(task) => task,
            Err(StoreError::NotFound(_)) => {
                debug!(task_id = %observed.id, "ignoring task the manager never placed");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        // Terminal tasks are retained for audit; no report may touch
        // them, timestamps included.
        if local.state.is_terminal() {
            debug!(task_id = %observed.id, state = %local.state, "ignoring report for terminal task");
            return Ok(());
        }

        if local.state != observed.state && !can_transition_to(local.state, observed.state) {
            debug!(
                task_id = %observed.id,
                from = %local.state,
                to = %observed.state,
                "ignoring stale state report"
            );
            return Ok(());
        }

        local.state = observed.state;
        local.start_time = observed.start_time;
        local.end_time = observed.end_time;
        if local.container_id.is_none() {
            local.container_id = observed.container_id.clone();
        }
        self.task_store.put(&key, &local)?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn task_store(&self) -> &Store<Task> {
        &self.task_store
    }

    /// Re-dispatch a task to the worker it is bound to.
    pub async fn restart_task(&self, task: &Task) -> ManagerResult<()> {
        let worker = self
            .worker_for(task.id)
            .ok_or(ManagerError::NotPlaced(task.id))?;

        let mut restarted = task.clone();
        restarted.state = State::Scheduled;
        self.task_store.put(&restarted.id.to_string(), &restarted)?;

        let event = TaskEvent::new(State::Running, restarted);
        self.client.send_event(&worker, &event).await?;
        info!(task_id = %task.id, %worker, "task restarted");
        Ok(())
    }
}

/// The dispatcher loop: one [`Manager::send_work`] per wake.
pub async fn dispatch_loop(
    manager: Arc<Manager>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(?interval, "dispatcher loop started");
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                match manager.send_work().await {
                    Ok(()) => {}
                    Err(ManagerError::NoPendingTasks) => debug!("no pending tasks"),
                    Err(e) => warn!(error = %e, "dispatch failed"),
                }
            }
            _ = shutdown.changed() => {
                info!("dispatcher loop shutting down");
                break;
            }
        }
    }
}

/// The reconciliation loop: one [`Manager::update_tasks`] pass per wake.
pub async fn reconcile_loop(
    manager: Arc<Manager>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(?interval, "reconciliation loop started");
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                manager.update_tasks().await;
            }
            _ = shutdown.changed() => {
                info!("reconciliation loop shutting down");
                break;
            }
        }
    }
}
