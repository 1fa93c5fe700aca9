//! systemd manager client on the D-Bus system bus.

use crate::{InitSystem, Result, SupervisorError};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info, instrument};
use zbus::zvariant::{ObjectPath, OwnedObjectPath};
use zbus::{proxy, Connection};

/// Mode passed to every job: replace conflicting queued jobs.
const JOB_MODE: &str = "replace";

#[proxy(
    interface = "org.freedesktop.systemd1.Manager",
    default_service = "org.freedesktop.systemd1",
    default_path = "/org/freedesktop/systemd1",
    gen_blocking = false
)]
trait Manager {
    fn subscribe(&self) -> zbus::Result<()>;

    fn unsubscribe(&self) -> zbus::Result<()>;

    fn reload(&self) -> zbus::Result<()>;

    fn restart_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;

    fn stop_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;

    #[zbus(signal)]
    fn job_removed(
        &self,
        id: u32,
        job: ObjectPath<'_>,
        unit: &str,
        result: &str,
    ) -> zbus::Result<()>;
}

#[derive(Debug, Clone, Copy)]
enum JobKind {
    Restart,
    Stop,
}

pub struct Systemd {
    manager: ManagerProxy<'static>,
}

impl Systemd {
    /// Connects to the system bus and subscribes to manager signals, without
    /// which systemd does not emit `JobRemoved`.
    pub async fn connect() -> Result<Self> {
        let connection = Connection::system().await?;
        let manager = ManagerProxy::new(&connection).await?;
        manager.subscribe().await?;
        info!("Connected to systemd on the system bus");
        Ok(Self { manager })
    }

    async fn run_job(&self, unit: &str, kind: JobKind) -> Result<String> {
        // Listen before queueing so the removal cannot slip past.
        let mut removed = self.manager.receive_job_removed().await?;

        let job = match kind {
            JobKind::Restart => self.manager.restart_unit(unit, JOB_MODE).await?,
            JobKind::Stop => self.manager.stop_unit(unit, JOB_MODE).await?,
        };
        debug!(%unit, job = %job.as_str(), ?kind, "Job queued");

        while let Some(signal) = removed.next().await {
            let args = signal.args()?;
            if args.job().as_str() == job.as_str() {
                debug!(%unit, job = %job.as_str(), result = %args.result(), "Job removed");
                return Ok(args.result().to_string());
            }
        }
        Err(SupervisorError::SignalStreamClosed(unit.to_string()))
    }
}

#[async_trait]
impl InitSystem for Systemd {
    #[instrument(skip(self))]
    async fn reload(&self) -> Result<()> {
        self.manager.reload().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn restart_unit(&self, unit: &str) -> Result<String> {
        self.run_job(unit, JobKind::Restart).await
    }

    #[instrument(skip(self))]
    async fn stop_unit(&self, unit: &str) -> Result<String> {
        self.run_job(unit, JobKind::Stop).await
    }

    async fn close(&self) -> Result<()> {
        self.manager.unsubscribe().await?;
        info!("Unsubscribed from systemd");
        Ok(())
    }
}
