//! `<base>/updater/versions/<product>.version`: the locally-installed version string
//! the update loop compares against the server's `latest` response (§4.7 step 1).

use std::path::{Path, PathBuf};

use fs::directory_manager::DirectoryManager;
use fs::file::reader::FileReader;
use fs::file::writer::{FileWriter, WriteError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VersionsError {
    #[error("failed to create {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: WriteError,
    },
}

/// Reads the current installed version for `product`, or `""` if the product has never
/// been installed — callers treat an empty current version the same way the server's
/// `latest_info` does (first check-in always offers an update).
pub fn current(reader: &impl FileReader, path: &Path) -> String {
    reader.read(path).map(|s| s.trim().to_string()).unwrap_or_default()
}

pub fn commit(
    writer: &impl FileWriter,
    dirs: &impl DirectoryManager,
    path: &Path,
    version: &str,
) -> Result<(), VersionsError> {
    if let Some(parent) = path.parent() {
        dirs.create(parent)
            .map_err(|source| VersionsError::CreateDir(parent.to_path_buf(), source))?;
    }
    writer
        .write(path, version.to_string())
        .map_err(|source| VersionsError::Write { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fs::directory_manager::DirectoryManagerFs;
    use fs::file::LocalFile;

    #[test]
    fn test_current_is_empty_when_never_installed() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("siemcore-api.version");
        assert_eq!(current(&LocalFile, &path), "");
    }

    #[test]
    fn test_commit_then_current_roundtrip() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("versions").join("siemcore-api.version");

        commit(&LocalFile, &DirectoryManagerFs, &path, "v1.5.0").unwrap();
        assert_eq!(current(&LocalFile, &path), "v1.5.0");

        commit(&LocalFile, &DirectoryManagerFs, &path, "v1.6.0").unwrap();
        assert_eq!(current(&LocalFile, &path), "v1.6.0");
    }
}
