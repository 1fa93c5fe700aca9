//! systemd units that run one rkt pod each.
//!
//! A unit is named `{prefix}-{subdomain}.service`. Its `ExecStartPre` drops
//! the pod manifest into the temp directory and `ExecStart` hands that file to
//! `rkt run --store-only`, so rkt never fetches anything at start time.

use crate::{InitSystem, Result, SupervisorError, JOB_DONE};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct UnitConfig {
    /// Prefix of every unit and scratch file name.
    pub prefix: String,
    /// Directory systemd loads unit files from.
    pub service_dir: PathBuf,
    /// Directory for the pod manifests written at start time.
    pub tmp_dir: PathBuf,
    /// Path of the rkt binary.
    pub rkt: PathBuf,
    /// Value of rkt's `--insecure-options`.
    pub insecure_options: String,
    /// Upper bound on waiting for a start or stop job.
    pub job_timeout: Duration,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            prefix: "phantasma".to_string(),
            service_dir: PathBuf::from("/etc/systemd/system"),
            tmp_dir: PathBuf::from("/tmp"),
            rkt: PathBuf::from("/usr/local/bin/rkt"),
            insecure_options: "image".to_string(),
            job_timeout: Duration::from_secs(90),
        }
    }
}

#[derive(Clone)]
pub struct UnitManager {
    init: Arc<dyn InitSystem>,
    config: UnitConfig,
}

impl UnitManager {
    pub fn new(init: Arc<dyn InitSystem>, config: UnitConfig) -> Self {
        Self { init, config }
    }

    pub fn config(&self) -> &UnitConfig {
        &self.config
    }

    fn base_name(&self, subdomain: &str) -> String {
        format!("{}-{}", self.config.prefix, subdomain)
    }

    pub fn service_name(&self, subdomain: &str) -> String {
        format!("{}.service", self.base_name(subdomain))
    }

    pub fn unit_path(&self, subdomain: &str) -> PathBuf {
        self.config.service_dir.join(self.service_name(subdomain))
    }

    pub fn manifest_path(&self, subdomain: &str) -> PathBuf {
        self.config
            .tmp_dir
            .join(format!("{}.manifest", self.base_name(subdomain)))
    }

    /// Unit file content for `subdomain` running `pod_manifest_json`.
    ///
    /// The manifest is embedded base64 encoded: systemd would otherwise
    /// expand `%` specifiers in it and the shell would trip over quotes.
    pub fn render(&self, pod_manifest_json: &str, subdomain: &str) -> String {
        let manifest_path = self.manifest_path(subdomain);
        format!(
            "[Unit]\n\
             Description={service}\n\
             \n\
             [Service]\n\
             ExecStartPre=/bin/sh -c 'echo {encoded} | base64 -d > {manifest}'\n\
             ExecStart={rkt} --insecure-options={insecure} run --store-only --pod-manifest={manifest}\n\
             KillMode=mixed\n",
            service = self.service_name(subdomain),
            encoded = STANDARD.encode(pod_manifest_json),
            manifest = manifest_path.display(),
            rkt = self.config.rkt.display(),
            insecure = self.config.insecure_options,
        )
    }

    /// Writes the unit file for `subdomain`, replacing any previous one.
    ///
    /// The content goes to a temp file in the unit directory first and is
    /// renamed into place, so systemd never sees a partial unit.
    #[instrument(skip(self, pod_manifest_json))]
    pub async fn install(&self, pod_manifest_json: &str, subdomain: &str) -> Result<PathBuf> {
        let content = self.render(pod_manifest_json, subdomain);
        let unit_path = self.unit_path(subdomain);
        let service_dir = self.config.service_dir.clone();
        let temp_prefix = format!(".{}-", self.config.prefix);

        let target = unit_path.clone();
        tokio::task::spawn_blocking(move || {
            write_atomically(&service_dir, &temp_prefix, &target, content.as_bytes())
        })
        .await
        .map_err(|e| SupervisorError::Internal(format!("unit write task failed: {}", e)))??;

        info!(unit = %unit_path.display(), "Installed unit");
        Ok(unit_path)
    }

    /// Reloads systemd and restarts the unit, waiting for the job to finish.
    #[instrument(skip(self))]
    pub async fn start(&self, subdomain: &str) -> Result<()> {
        self.init.reload().await?;
        let unit = self.service_name(subdomain);
        let result = self.wait_job(&unit, self.init.restart_unit(&unit)).await?;
        check_done(unit, result)?;
        info!(%subdomain, "Started unit");
        Ok(())
    }

    /// Reloads systemd and stops the unit, waiting for the job to finish.
    #[instrument(skip(self))]
    pub async fn stop(&self, subdomain: &str) -> Result<()> {
        self.init.reload().await?;
        let unit = self.service_name(subdomain);
        let result = self.wait_job(&unit, self.init.stop_unit(&unit)).await?;
        check_done(unit, result)?;
        info!(%subdomain, "Stopped unit");
        Ok(())
    }

    /// Deletes the unit file and scratch manifest of a stopped unit and
    /// reloads systemd. Files that are already gone are fine.
    #[instrument(skip(self))]
    pub async fn remove(&self, subdomain: &str) -> Result<()> {
        for path in [self.unit_path(subdomain), self.manifest_path(subdomain)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "Removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(SupervisorError::Io {
                        op: "remove",
                        path,
                        source,
                    })
                }
            }
        }
        self.init.reload().await?;
        Ok(())
    }

    async fn wait_job<F>(&self, unit: &str, job: F) -> Result<String>
    where
        F: std::future::Future<Output = Result<String>>,
    {
        match tokio::time::timeout(self.config.job_timeout, job).await {
            Ok(result) => result,
            Err(_) => {
                warn!(%unit, timeout = ?self.config.job_timeout, "Job did not finish in time");
                Err(SupervisorError::JobTimeout {
                    unit: unit.to_string(),
                    timeout: self.config.job_timeout,
                })
            }
        }
    }
}

fn check_done(unit: String, result: String) -> Result<()> {
    if result == JOB_DONE {
        Ok(())
    } else {
        Err(SupervisorError::JobIncomplete { unit, result })
    }
}

fn write_atomically(dir: &Path, prefix: &str, target: &Path, content: &[u8]) -> Result<()> {
    let io_err = |source| SupervisorError::Io {
        op: "write",
        path: target.to_path_buf(),
        source,
    };

    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(io_err)?;
    file.write_all(content).map_err(io_err)?;
    file.as_file().sync_all().map_err(io_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))
            .map_err(io_err)?;
    }

    // A failed persist drops the temp file, which deletes it.
    file.persist(target).map_err(|e| io_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{InitCall, MockInitSystem};
    use tempfile::TempDir;

    fn manager(init: Arc<MockInitSystem>, dirs: &TempDir) -> UnitManager {
        UnitManager::new(
            init,
            UnitConfig {
                service_dir: dirs.path().join("system"),
                tmp_dir: dirs.path().join("tmp"),
                job_timeout: Duration::from_millis(200),
                ..Default::default()
            },
        )
    }

    fn dirs() -> TempDir {
        let dirs = TempDir::new().unwrap();
        std::fs::create_dir_all(dirs.path().join("system")).unwrap();
        std::fs::create_dir_all(dirs.path().join("tmp")).unwrap();
        dirs
    }

    #[test]
    fn test_deterministic_paths() {
        let manager = UnitManager::new(Arc::new(MockInitSystem::new()), UnitConfig::default());
        assert_eq!(manager.service_name("app1"), "phantasma-app1.service");
        assert_eq!(
            manager.unit_path("app1"),
            PathBuf::from("/etc/systemd/system/phantasma-app1.service")
        );
        assert_eq!(
            manager.manifest_path("app1"),
            PathBuf::from("/tmp/phantasma-app1.manifest")
        );
    }

    #[test]
    fn test_render_embeds_manifest() {
        let manager = UnitManager::new(Arc::new(MockInitSystem::new()), UnitConfig::default());
        let json = r#"{"acKind":"PodManifest","annotations":[{"name":"n","value":"100%'s"}]}"#;
        let unit = manager.render(json, "app1");

        assert!(unit.contains("Description=phantasma-app1.service\n"));
        assert!(unit.contains(
            "ExecStart=/usr/local/bin/rkt --insecure-options=image run --store-only \
             --pod-manifest=/tmp/phantasma-app1.manifest\n"
        ));
        assert!(unit.contains("KillMode=mixed\n"));
        assert!(!unit.contains("100%"));

        let line = unit
            .lines()
            .find(|line| line.starts_with("ExecStartPre="))
            .unwrap();
        let encoded = line
            .trim_start_matches("ExecStartPre=/bin/sh -c 'echo ")
            .split(' ')
            .next()
            .unwrap();
        assert_eq!(STANDARD.decode(encoded).unwrap(), json.as_bytes());
        assert!(line.ends_with("> /tmp/phantasma-app1.manifest'"));
    }

    #[tokio::test]
    async fn test_install_replaces_unit_atomically() {
        let dirs = dirs();
        let manager = manager(Arc::new(MockInitSystem::new()), &dirs);

        let path = manager.install("{\"v\":1}", "app1").await.unwrap();
        assert_eq!(path, dirs.path().join("system/phantasma-app1.service"));
        let first = std::fs::read_to_string(&path).unwrap();

        manager.install("{\"v\":2}", "app1").await.unwrap();
        let second = std::fs::read_to_string(&path).unwrap();
        assert_ne!(first, second);

        // Only the unit itself is left behind.
        let entries: Vec<_> = std::fs::read_dir(dirs.path().join("system"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec!["phantasma-app1.service".to_string()]);
    }

    #[tokio::test]
    async fn test_install_fails_without_unit_dir() {
        let dirs = TempDir::new().unwrap();
        let manager = manager(Arc::new(MockInitSystem::new()), &dirs);
        let err = manager.install("{}", "app1").await.unwrap_err();
        assert!(matches!(err, SupervisorError::Io { op: "write", .. }));
    }

    #[tokio::test]
    async fn test_start_reloads_then_restarts() {
        let dirs = dirs();
        let init = Arc::new(MockInitSystem::new());
        let manager = manager(init.clone(), &dirs);

        manager.start("app1").await.unwrap();
        assert_eq!(
            init.calls().await,
            vec![
                InitCall::Reload,
                InitCall::Restart("phantasma-app1.service".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_job_result_other_than_done_is_incomplete() {
        let dirs = dirs();
        let init = Arc::new(MockInitSystem::new());
        init.set_job_result("failed").await;
        let manager = manager(init, &dirs);

        match manager.stop("app1").await {
            Err(SupervisorError::JobIncomplete { unit, result }) => {
                assert_eq!(unit, "phantasma-app1.service");
                assert_eq!(result, "failed");
            }
            other => panic!("expected JobIncomplete, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stuck_job_times_out() {
        let dirs = dirs();
        let init = Arc::new(MockInitSystem::new());
        init.set_hang(true);
        let manager = manager(init, &dirs);

        let err = manager.start("app1").await.unwrap_err();
        assert!(matches!(err, SupervisorError::JobTimeout { .. }));
    }

    #[tokio::test]
    async fn test_reload_failure_aborts_start() {
        let dirs = dirs();
        let init = Arc::new(MockInitSystem::new());
        init.set_fail_reload(true);
        let manager = manager(init.clone(), &dirs);

        assert!(manager.start("app1").await.is_err());
        assert_eq!(init.calls().await, vec![InitCall::Reload]);
    }

    #[tokio::test]
    async fn test_remove_deletes_unit_and_manifest() {
        let dirs = dirs();
        let init = Arc::new(MockInitSystem::new());
        let manager = manager(init.clone(), &dirs);

        let unit = manager.install("{}", "app1").await.unwrap();
        std::fs::write(manager.manifest_path("app1"), "{}").unwrap();

        manager.remove("app1").await.unwrap();
        assert!(!unit.exists());
        assert!(!manager.manifest_path("app1").exists());

        // Removing again is harmless.
        manager.remove("app1").await.unwrap();
        assert_eq!(init.calls().await, vec![InitCall::Reload, InitCall::Reload]);
    }

    #[tokio::test]
    async fn test_remove_failure_names_the_deletion() {
        let dirs = dirs();
        let init = Arc::new(MockInitSystem::new());
        let manager = manager(init.clone(), &dirs);

        let manifest = manager.manifest_path("app1");
        std::fs::create_dir_all(manifest.join("stuck")).unwrap();

        let err = manager.remove("app1").await.unwrap_err();
        assert!(matches!(err, SupervisorError::Io { op: "remove", .. }));
        assert!(err
            .to_string()
            .starts_with(&format!("could not remove {}", manifest.display())));
        assert!(init.calls().await.is_empty());
    }
}
