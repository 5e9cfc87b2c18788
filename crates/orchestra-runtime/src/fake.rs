//! A scripted engine double for tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use orchestra_task::Config;

use crate::error::{RuntimeError, RuntimeResult};
use crate::{ContainerRuntime, ContainerStatus};

/// [`ContainerRuntime`] that records calls and returns scripted results.
///
/// By default every `run` succeeds with a fresh `fake-N` container id,
/// `stop` succeeds, and `inspect` reports `Running`.
pub struct FakeRuntime {
    next_id: AtomicU64,
    fail_run: AtomicBool,
    fail_stop: AtomicBool,
    inspect_status: Mutex<ContainerStatus>,
    run_calls: AtomicU64,
    inspect_calls: AtomicU64,
    stopped: Mutex<Vec<String>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            fail_run: AtomicBool::new(false),
            fail_stop: AtomicBool::new(false),
            inspect_status: Mutex::new(ContainerStatus::Running),
            run_calls: AtomicU64::new(0),
            inspect_calls: AtomicU64::new(0),
            stopped: Mutex::new(Vec::new()),
        }
    }

    /// Make every subsequent `run` fail.
    pub fn fail_run(self) -> Self {
        self.fail_run.store(true, Ordering::SeqCst);
        self
    }

    /// Make every subsequent `stop` fail.
    pub fn fail_stop(self) -> Self {
        self.fail_stop.store(true, Ordering::SeqCst);
        self
    }

    /// Script what `inspect` reports.
    pub fn set_inspect_status(&self, status: ContainerStatus) {
        *self.inspect_status.lock().unwrap() = status;
    }

    pub fn run_calls(&self) -> u64 {
        self.run_calls.load(Ordering::SeqCst)
    }

    pub fn inspect_calls(&self) -> u64 {
        self.inspect_calls.load(Ordering::SeqCst)
    }

    /// Container ids `stop` was called with, in order.
    pub fn stopped(&self) -> Vec<String> {
        self.stopped.lock().unwrap().clone()
    }
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn run(&self, _config: &Config) -> RuntimeResult<String> {
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_run.load(Ordering::SeqCst) {
            return Err(RuntimeError::Start("scripted failure".to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("fake-{id}"))
    }

    async fn stop(&self, container_id: &str) -> RuntimeResult<()> {
        self.stopped.lock().unwrap().push(container_id.to_string());
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(RuntimeError::Stop("scripted failure".to_string()));
        }
        Ok(())
    }

    async fn inspect(&self, _container_id: &str) -> RuntimeResult<ContainerStatus> {
        self.inspect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.inspect_status.lock().unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_hands_out_sequential_ids() {
        let runtime = FakeRuntime::new();
        let config = Config::default();

        assert_eq!(runtime.run(&config).await.unwrap(), "fake-1");
        assert_eq!(runtime.run(&config).await.unwrap(), "fake-2");
        assert_eq!(runtime.run_calls(), 2);
    }

    #[tokio::test]
    async fn scripted_run_failure() {
        let runtime = FakeRuntime::new().fail_run();
        let err = runtime.run(&Config::default()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Start(_)));
    }

    #[tokio::test]
    async fn stop_records_container_ids() {
        let runtime = FakeRuntime::new();
        runtime.stop("c1").await.unwrap();
        runtime.stop("c2").await.unwrap();
        assert_eq!(runtime.stopped(), vec!["c1", "c2"]);
    }

    #[tokio::test]
    async fn inspect_reports_the_scripted_status() {
        let runtime = FakeRuntime::new();
        assert_eq!(
            runtime.inspect("c1").await.unwrap(),
            ContainerStatus::Running
        );

        runtime.set_inspect_status(ContainerStatus::Exited);
        assert_eq!(
            runtime.inspect("c1").await.unwrap(),
            ContainerStatus::Exited
        );
        assert_eq!(runtime.inspect_calls(), 2);
    }
}
