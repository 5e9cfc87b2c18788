//! End-to-end control-plane scenarios: a real manager talking to real
//! workers over HTTP, with the container engine faked out.

use std::sync::Arc;
use std::time::Duration;

use orchestra_manager::{Manager, RetryOptions, WorkerClient};
use orchestra_runtime::FakeRuntime;
use orchestra_scheduler::Policy;
use orchestra_store::Storage;
use orchestra_task::{State, Task, TaskEvent};
use orchestra_worker::Worker;

/// A worker serving its task API on an ephemeral port. Returns the
/// `host:port` name the manager should register it under.
async fn spawn_worker(runtime: Arc<FakeRuntime>) -> (String, Arc<Worker>) {
    let store = Storage::open_in_memory().unwrap().store("tasks").unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let name = listener.local_addr().unwrap().to_string();

    let worker = Arc::new(Worker::new(name.clone(), store, runtime));
    let app = orchestra_worker::router(worker.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (name, worker)
}

/// A manager serving its task API on an ephemeral port.
async fn spawn_manager(workers: Vec<String>) -> (String, Arc<Manager>) {
    let storage = Storage::open_in_memory().unwrap();
    let client = WorkerClient::new().with_retry_options(RetryOptions {
        max_attempts: 2,
        wait: Duration::from_millis(10),
    });
    let manager = Arc::new(
        Manager::new(workers, Policy::RoundRobin, &storage)
            .unwrap()
            .with_client(client),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let app = orchestra_manager::router(manager.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, manager)
}

fn submit_event(task: &Task) -> TaskEvent {
    TaskEvent::new(State::Scheduled, task.clone())
}

#[tokio::test(flavor = "multi_thread")]
async fn happy_start_places_runs_and_reconciles() {
    let runtime = Arc::new(FakeRuntime::new());
    let (w1, worker) = spawn_worker(runtime.clone()).await;
    let (addr, manager) = spawn_manager(vec![w1.clone()]).await;

    let task = Task::new("web", "nginx:1");
    let http = reqwest::Client::new();

    // Submit over the wire.
    let resp = http
        .post(format!("http://{addr}/tasks"))
        .json(&submit_event(&task))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let echoed: Task = resp.json().await.unwrap();
    assert_eq!(echoed.id, task.id);

    // Before the dispatcher acts the task lists as submitted.
    let listed: Vec<Task> = http
        .get(format!("http://{addr}/tasks"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].state, State::Pending);

    // One dispatcher cycle: placed on w1 and handed off.
    manager.send_work().await.unwrap();
    assert_eq!(manager.worker_for(task.id).as_deref(), Some(w1.as_str()));
    assert_eq!(manager.tasks_on(&w1), vec![task.id]);
    assert_eq!(worker.queue_len(), 1);
    assert_eq!(
        manager.get_task(&task.id.to_string()).unwrap().state,
        State::Scheduled
    );

    // One worker runner cycle: container started.
    worker.run_next_task().await.unwrap();
    let on_worker = worker.get_task(&task.id.to_string()).unwrap();
    assert_eq!(on_worker.state, State::Running);
    assert_eq!(on_worker.container_id.as_deref(), Some("fake-1"));

    // One reconciliation cycle: the manager sees it running.
    manager.update_tasks().await;
    let merged = manager.get_task(&task.id.to_string()).unwrap();
    assert_eq!(merged.state, State::Running);
    assert_eq!(merged.container_id.as_deref(), Some("fake-1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_flows_from_manager_delete_to_the_container() {
    let runtime = Arc::new(FakeRuntime::new());
    let (w1, worker) = spawn_worker(runtime.clone()).await;
    let (addr, manager) = spawn_manager(vec![w1.clone()]).await;

    let task = Task::new("web", "nginx:1");
    let http = reqwest::Client::new();
    http.post(format!("http://{addr}/tasks"))
        .json(&submit_event(&task))
        .send()
        .await
        .unwrap();
    manager.send_work().await.unwrap();
    worker.run_next_task().await.unwrap();
    manager.update_tasks().await;

    // Client asks the manager to stop it.
    let resp = http
        .delete(format!("http://{addr}/tasks/{}", task.id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    // Dispatcher observes the placement and relays a DELETE to w1.
    manager.send_work().await.unwrap();
    assert_eq!(worker.queue_len(), 1);

    // Worker runner stops the container and completes the task.
    worker.run_next_task().await.unwrap();
    assert_eq!(runtime.stopped(), vec!["fake-1"]);
    let stopped = worker.get_task(&task.id.to_string()).unwrap();
    assert_eq!(stopped.state, State::Completed);
    assert!(stopped.end_time.is_some());

    // Reconciliation carries the terminal state back.
    manager.update_tasks().await;
    assert_eq!(
        manager.get_task(&task.id.to_string()).unwrap().state,
        State::Completed
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn transport_failure_requeues_and_the_next_cycle_succeeds() {
    // Reserve a port, then close the listener so the first hand-off gets
    // connection refused.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let w1 = listener.local_addr().unwrap().to_string();
    drop(listener);

    let (_, manager) = spawn_manager(vec![w1.clone()]).await;
    let task = Task::new("web", "nginx:1");
    manager.add_task(submit_event(&task));

    let err = manager.send_work().await.unwrap_err();
    assert!(err.to_string().contains("transport"));
    assert_eq!(manager.pending_len(), 1);
    assert!(manager.worker_for(task.id).is_none());

    // The worker comes back on the same address; the retry completes.
    let listener = tokio::net::TcpListener::bind(w1.clone()).await.unwrap();
    let store = Storage::open_in_memory().unwrap().store("tasks").unwrap();
    let worker = Arc::new(Worker::new(w1.clone(), store, Arc::new(FakeRuntime::new())));
    let app = orchestra_worker::router(worker.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    manager.send_work().await.unwrap();
    assert_eq!(manager.pending_len(), 0);
    assert_eq!(manager.worker_for(task.id).as_deref(), Some(w1.as_str()));
    assert_eq!(worker.queue_len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn round_robin_places_three_tasks_on_w2_w3_w1() {
    let runtime = Arc::new(FakeRuntime::new());
    let (w1, _) = spawn_worker(runtime.clone()).await;
    let (w2, _) = spawn_worker(runtime.clone()).await;
    let (w3, _) = spawn_worker(runtime.clone()).await;
    let (_, manager) = spawn_manager(vec![w1.clone(), w2.clone(), w3.clone()]).await;

    let tasks: Vec<Task> = (0..3).map(|i| Task::new(format!("t{i}"), "nginx:1")).collect();
    for task in &tasks {
        manager.add_task(submit_event(task));
    }
    for _ in 0..3 {
        manager.send_work().await.unwrap();
    }

    assert_eq!(manager.worker_for(tasks[0].id).as_deref(), Some(w2.as_str()));
    assert_eq!(manager.worker_for(tasks[1].id).as_deref(), Some(w3.as_str()));
    assert_eq!(manager.worker_for(tasks[2].id).as_deref(), Some(w1.as_str()));
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_submission_yields_exactly_one_placement() {
    let runtime = Arc::new(FakeRuntime::new());
    let (w1, worker) = spawn_worker(runtime.clone()).await;
    let (_, manager) = spawn_manager(vec![w1.clone()]).await;

    let task = Task::new("web", "nginx:1");
    let event = submit_event(&task);
    manager.add_task(event.clone());
    manager.add_task(event);

    manager.send_work().await.unwrap();
    let err = manager.send_work().await.unwrap_err();
    assert!(err.to_string().contains("invalid mutation"));

    assert_eq!(worker.queue_len(), 1);
    assert_eq!(manager.tasks_on(&w1), vec![task.id]);
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_post_bodies_get_the_error_envelope() {
    let (w1, _) = spawn_worker(Arc::new(FakeRuntime::new())).await;
    let (addr, manager) = spawn_manager(vec![w1.clone()]).await;
    let http = reqwest::Client::new();

    // Not JSON at all.
    let resp = http
        .post(format!("http://{addr}/tasks"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let envelope: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(envelope["status_code"], 400);
    assert_eq!(envelope["reason"], "Bad Request");
    assert_eq!(manager.pending_len(), 0);

    // Unknown field on an otherwise valid event, on the worker surface.
    let mut body = serde_json::to_value(submit_event(&Task::new("web", "nginx:1"))).unwrap();
    body["surprise"] = serde_json::json!(1);
    let resp = http
        .post(format!("http://{w1}/tasks"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Unknown field buried inside the embedded task is rejected too.
    let mut body = serde_json::to_value(submit_event(&Task::new("web", "nginx:1"))).unwrap();
    body["task"]["bogus"] = serde_json::json!(1);
    let resp = http
        .post(format!("http://{addr}/tasks"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(manager.pending_len(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn container_exit_is_detected_and_reconciled() {
    let runtime = Arc::new(FakeRuntime::new());
    let (w1, worker) = spawn_worker(runtime.clone()).await;
    let (_, manager) = spawn_manager(vec![w1]).await;

    let task = Task::new("web", "nginx:1");
    manager.add_task(submit_event(&task));
    manager.send_work().await.unwrap();
    worker.run_next_task().await.unwrap();
    manager.update_tasks().await;
    assert_eq!(
        manager.get_task(&task.id.to_string()).unwrap().state,
        State::Running
    );

    // The container dies between updater cycles.
    runtime.set_inspect_status(orchestra_runtime::ContainerStatus::Exited);
    worker.update_tasks().await.unwrap();
    assert_eq!(
        worker.get_task(&task.id.to_string()).unwrap().state,
        State::Failed
    );

    manager.update_tasks().await;
    assert_eq!(
        manager.get_task(&task.id.to_string()).unwrap().state,
        State::Failed
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn restart_redispatches_to_the_bound_worker() {
    let runtime = Arc::new(FakeRuntime::new());
    let (w1, worker) = spawn_worker(runtime.clone()).await;
    let (_, manager) = spawn_manager(vec![w1]).await;

    let task = Task::new("web", "nginx:1");
    manager.add_task(submit_event(&task));
    manager.send_work().await.unwrap();
    worker.run_next_task().await.unwrap();

    // Simulate the container dying, then restart the task in place.
    runtime.set_inspect_status(orchestra_runtime::ContainerStatus::Exited);
    worker.update_tasks().await.unwrap();
    manager.update_tasks().await;

    let failed = manager.get_task(&task.id.to_string()).unwrap();
    assert_eq!(failed.state, State::Failed);
    manager.restart_task(&failed).await.unwrap();

    assert_eq!(
        manager.get_task(&task.id.to_string()).unwrap().state,
        State::Scheduled
    );
    assert_eq!(worker.queue_len(), 1);
}
