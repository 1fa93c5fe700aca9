/// Recording `InitSystem` for tests
use crate::{InitSystem, Result, SupervisorError, JOB_DONE};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitCall {
    Reload,
    Restart(String),
    Stop(String),
    Close,
}

/// Mock init system - every job finishes with the configured result
pub struct MockInitSystem {
    calls: Mutex<Vec<InitCall>>,
    job_result: Mutex<String>,
    hang: AtomicBool,
    fail_reload: AtomicBool,
}

impl Default for MockInitSystem {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            job_result: Mutex::new(JOB_DONE.to_string()),
            hang: AtomicBool::new(false),
            fail_reload: AtomicBool::new(false),
        }
    }
}

impl MockInitSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn calls(&self) -> Vec<InitCall> {
        self.calls.lock().await.clone()
    }

    pub async fn set_job_result(&self, result: &str) {
        *self.job_result.lock().await = result.to_string();
    }

    /// Jobs never finish while set.
    pub fn set_hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    pub fn set_fail_reload(&self, fail: bool) {
        self.fail_reload.store(fail, Ordering::SeqCst);
    }

    async fn job(&self, call: InitCall) -> Result<String> {
        self.calls.lock().await.push(call);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(self.job_result.lock().await.clone())
    }
}

#[async_trait]
impl InitSystem for MockInitSystem {
    async fn reload(&self) -> Result<()> {
        self.calls.lock().await.push(InitCall::Reload);
        if self.fail_reload.load(Ordering::SeqCst) {
            return Err(SupervisorError::Internal("mock reload failure".to_string()));
        }
        Ok(())
    }

    async fn restart_unit(&self, unit: &str) -> Result<String> {
        self.job(InitCall::Restart(unit.to_string())).await
    }

    async fn stop_unit(&self, unit: &str) -> Result<String> {
        self.job(InitCall::Stop(unit.to_string())).await
    }

    async fn close(&self) -> Result<()> {
        self.calls.lock().await.push(InitCall::Close);
        Ok(())
    }
}
