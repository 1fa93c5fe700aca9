use async_trait::async_trait;
use podgate_common::PodgateError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub mod systemd;
pub mod units;

#[cfg(any(test, feature = "testing"))]
pub mod test_utils;

pub use systemd::Systemd;
pub use units::{UnitConfig, UnitManager};

/// Job result systemd reports for a job that completed successfully.
pub const JOB_DONE: &str = "done";

// --- Custom Error Type ---
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("D-Bus error: {0}")]
    DBus(#[from] zbus::Error),
    #[error("JobRemoved stream ended before job for {0} finished")]
    SignalStreamClosed(String),
    #[error("could not {op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("job is not done: unit {unit}, result {result}")]
    JobIncomplete { unit: String, result: String },
    #[error("job timed out after {}s: unit {unit}", timeout.as_secs())]
    JobTimeout { unit: String, timeout: Duration },
    #[error("internal supervisor error: {0}")]
    Internal(String),
}

impl From<SupervisorError> for PodgateError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::JobIncomplete { unit, result } => {
                PodgateError::JobIncomplete { unit, result }
            }
            SupervisorError::JobTimeout { unit, timeout } => PodgateError::JobTimeout {
                unit,
                secs: timeout.as_secs(),
            },
            SupervisorError::Io { .. } => PodgateError::Internal(err.to_string()),
            SupervisorError::DBus(_) | SupervisorError::SignalStreamClosed(_) => {
                PodgateError::RuntimeUnavailable(err.to_string())
            }
            SupervisorError::Internal(msg) => PodgateError::Internal(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Control surface of the init system.
///
/// Job calls return once the job has left systemd's queue, with the job
/// result string (`"done"`, `"failed"`, `"canceled"`, ...). They may wait
/// indefinitely; bounding the wait is the caller's concern.
#[async_trait]
pub trait InitSystem: Send + Sync {
    /// Re-reads unit files (`daemon-reload`).
    async fn reload(&self) -> Result<()>;

    /// Restarts `unit`, starting it if it is not running.
    async fn restart_unit(&self, unit: &str) -> Result<String>;

    async fn stop_unit(&self, unit: &str) -> Result<String>;

    /// Releases whatever the connection holds on the manager.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let err: PodgateError = SupervisorError::JobTimeout {
            unit: "phantasma-app1.service".to_string(),
            timeout: Duration::from_secs(90),
        }
        .into();
        assert!(matches!(err, PodgateError::JobTimeout { secs: 90, .. }));

        let err: PodgateError = SupervisorError::JobIncomplete {
            unit: "phantasma-app1.service".to_string(),
            result: "failed".to_string(),
        }
        .into();
        assert!(matches!(err, PodgateError::JobIncomplete { .. }));

        let err: PodgateError =
            SupervisorError::SignalStreamClosed("phantasma-app1.service".to_string()).into();
        assert!(matches!(err, PodgateError::RuntimeUnavailable(_)));
    }
}
