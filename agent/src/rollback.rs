//! The explicit `fleet-agent rollback <product>` command (spec.md §9): selects the
//! highest-versioned `.bak` for a product, stops the service, backs up the binary that's
//! about to be replaced, restores the backup over the target, commits its version to the
//! version file, and restarts.
//!
//! Backup selection compares the version segment of `<product>.<version>.bak` filenames
//! lexicographically, not as semver. This is the documented limitation of spec.md §9: it
//! is correct for zero-padded numeric versions and wrong for mixed-width ones (`v1.10.0`
//! sorts before `v1.2.0`). The recommended fix — parse as semver, falling back to a
//! sibling `released_at` metadata file — is intentionally not implemented here; see
//! DESIGN.md.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::Paths;
use crate::supervisor::{ServiceController, ServiceControllerError};
use crate::update;
use crate::versions;
use crate::LocalFs;

use fs::file::reader::FileReader;

#[derive(Debug, Error)]
pub enum RollbackError {
    #[error("failed to list backups in {0}: {1}")]
    ListBackups(PathBuf, std::io::Error),

    #[error("no backup found for product {0}")]
    NoBackupAvailable(String),

    #[error("filesystem error: {0}")]
    Io(std::io::Error),

    #[error("service controller error: {0}")]
    Service(#[from] ServiceControllerError),

    #[error("failed to commit rolled-back version: {0}")]
    Commit(#[from] versions::VersionsError),
}

/// Rolls `product` back to its most recent backup. Returns the version rolled back to.
pub fn rollback(
    product: &str,
    paths: &Paths,
    controller: &dyn ServiceController,
    fsops: &impl LocalFs,
) -> Result<String, RollbackError> {
    let backups_dir = paths.backups_dir();
    let entries = fsops
        .dir_entries(&backups_dir)
        .map_err(|e| RollbackError::ListBackups(backups_dir.clone(), e))?;

    let (version, backup_path) =
        latest_backup(product, &entries).ok_or_else(|| RollbackError::NoBackupAvailable(product.to_string()))?;

    info!(product, version, "rolling back");
    controller.stop(product)?;

    let target = paths.product_binary(product);
    if target.is_file() {
        let current_version = versions::current(fsops, &paths.version_file(product));
        let current_backup = backups_dir.join(format!("{product}.{current_version}.current.bak"));
        std::fs::copy(&target, &current_backup).map_err(RollbackError::Io)?;
    }

    std::fs::copy(&backup_path, &target).map_err(RollbackError::Io)?;
    update::set_executable(&target).map_err(RollbackError::Io)?;

    versions::commit(fsops, fsops, &paths.version_file(product), &version)?;

    if let Err(err) = controller.start(product) {
        warn!(product, error = %err, "rollback restored the binary but the service failed to start");
        return Err(RollbackError::Service(err));
    }

    Ok(version)
}

/// Excludes the `<product>.<version>.current.bak` safety copies `rollback` itself writes
/// — those are not candidates, only the release-time backups `update::apply` produces are.
fn latest_backup(product: &str, entries: &[PathBuf]) -> Option<(String, PathBuf)> {
    let prefix = format!("{product}.");
    let mut best: Option<(String, PathBuf)> = None;

    for path in entries {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
        let Some(rest) = name.strip_prefix(&prefix) else { continue };
        let Some(version) = rest.strip_suffix(".bak") else { continue };
        if version.ends_with(".current") {
            continue;
        }

        let better = match &best {
            Some((best_version, _)) => version > best_version.as_str(),
            None => true,
        };
        if better {
            best = Some((version.to_string(), path.clone()));
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::supervisor::ServiceStatus;
    use fs::directory_manager::{DirectoryManager, DirectoryManagerFs};
    use fs::file::LocalFile;

    struct StubController;
    impl ServiceController for StubController {
        fn start(&self, _service: &str) -> Result<(), ServiceControllerError> {
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

    #[test]
    fn test_latest_backup_picks_lexicographic_max_and_ignores_current_bak() {
        let entries = vec![
            PathBuf::from("/x/siemcore-api.v1.2.0.bak"),
            PathBuf::from("/x/siemcore-api.v1.10.0.bak"),
            PathBuf::from("/x/siemcore-api.v1.9.current.bak"),
            PathBuf::from("/x/other-product.v9.0.0.bak"),
        ];
        // Lexicographic, not semver: "v1.2.0" > "v1.10.0" because '2' > '1' at that byte.
        let (version, path) = latest_backup("siemcore-api", &entries).unwrap();
        assert_eq!(version, "v1.2.0");
        assert_eq!(path, PathBuf::from("/x/siemcore-api.v1.2.0.bak"));
    }

    #[test]
    fn test_latest_backup_none_when_no_match() {
        let entries = vec![PathBuf::from("/x/other-product.v1.0.0.bak")];
        assert!(latest_backup("siemcore-api", &entries).is_none());
    }

    #[test]
    fn test_rollback_restores_backup_and_commits_version() {
        let tempdir = tempfile::tempdir().unwrap();
        let paths = Paths::new(tempdir.path());

        DirectoryManagerFs.create(&paths.backups_dir()).unwrap();
        DirectoryManagerFs.create(&paths.versions_dir()).unwrap();
        DirectoryManagerFs.create(&paths.bin_dir()).unwrap();

        std::fs::write(paths.backup_file("siemcore-api", "v1.4.0"), b"v1.4.0 bytes").unwrap();
        std::fs::write(paths.product_binary("siemcore-api"), b"v1.5.0 bytes").unwrap();
        versions::commit(&LocalFile, &DirectoryManagerFs, &paths.version_file("siemcore-api"), "v1.5.0").unwrap();

        let version = rollback("siemcore-api", &paths, &StubController, &LocalFile).unwrap();

        assert_eq!(version, "v1.4.0");
        assert_eq!(versions::current(&LocalFile, &paths.version_file("siemcore-api")), "v1.4.0");
        assert_eq!(std::fs::read(paths.product_binary("siemcore-api")).unwrap(), b"v1.4.0 bytes");
        assert!(paths.backups_dir().join("siemcore-api.v1.5.0.current.bak").exists());
    }

    #[test]
    fn test_rollback_errors_when_no_backup_exists() {
        let tempdir = tempfile::tempdir().unwrap();
        let paths = Paths::new(tempdir.path());
        DirectoryManagerFs.create(&paths.backups_dir()).unwrap();

        let err = rollback("siemcore-api", &paths, &StubController, &LocalFile).unwrap_err();
        assert_matches!(err, RollbackError::NoBackupAvailable(_));
    }
}
