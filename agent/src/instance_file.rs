//! `<base>/updater/.instance`: the two credentials issued once at activation (§4.3 step
//! 10), persisted as `KEY=VALUE` lines at mode 0600 via the `fs` crate's writer.

use std::path::{Path, PathBuf};

use fs::directory_manager::DirectoryManager;
use fs::file::reader::FileReader;
use fs::file::writer::{FileWriter, WriteError};
use thiserror::Error;

const INSTANCE_ID_KEY: &str = "INSTANCE_ID";
const API_KEY_KEY: &str = "API_KEY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceCredentials {
    pub instance_id: String,
    pub api_key: String,
}

#[derive(Debug, Error)]
pub enum InstanceFileError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is missing required key {key}")]
    MissingKey { path: PathBuf, key: &'static str },

    #[error("failed to create {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: WriteError,
    },
}

/// Parses the `KEY=VALUE` lines written by [`write`]. Unknown keys are ignored so the
/// format can grow without breaking older agents reading a newer file.
pub fn read(
    reader: &impl FileReader,
    path: &Path,
) -> Result<InstanceCredentials, InstanceFileError> {
    let contents = reader
        .read(path)
        .map_err(|source| InstanceFileError::Read { path: path.to_path_buf(), source })?;

    let mut instance_id = None;
    let mut api_key = None;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            match key {
                INSTANCE_ID_KEY => instance_id = Some(value.to_string()),
                API_KEY_KEY => api_key = Some(value.to_string()),
                _ => {}
            }
        }
    }

    Ok(InstanceCredentials {
        instance_id: instance_id.ok_or_else(|| InstanceFileError::MissingKey {
            path: path.to_path_buf(),
            key: INSTANCE_ID_KEY,
        })?,
        api_key: api_key.ok_or_else(|| InstanceFileError::MissingKey {
            path: path.to_path_buf(),
            key: API_KEY_KEY,
        })?,
    })
}

/// Overwrites `path` with `credentials`, creating the parent directory if needed.
/// `fs::file::writer::FileWriter::write` sets mode 0600 on unix.
pub fn write(
    writer: &impl FileWriter,
    dirs: &impl DirectoryManager,
    path: &Path,
    credentials: &InstanceCredentials,
) -> Result<(), InstanceFileError> {
    if let Some(parent) = path.parent() {
        dirs.create(parent)
            .map_err(|source| InstanceFileError::CreateDir(parent.to_path_buf(), source))?;
    }

    let contents = format!(
        "{INSTANCE_ID_KEY}={}\n{API_KEY_KEY}={}\n",
        credentials.instance_id, credentials.api_key
    );

    writer
        .write(path, contents)
        .map_err(|source| InstanceFileError::Write { path: path.to_path_buf(), source })
}

pub fn exists(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fs::directory_manager::DirectoryManagerFs;
    use fs::file::LocalFile;

    #[test]
    fn test_write_then_read_roundtrip() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("updater").join(".instance");

        let creds = InstanceCredentials {
            instance_id: "siemcore-acme-corp-local".to_string(),
            api_key: "sk_inst_deadbeef".to_string(),
        };

        write(&LocalFile, &DirectoryManagerFs, &path, &creds).unwrap();
        let read_back = read(&LocalFile, &path).unwrap();
        assert_eq!(read_back, creds);
    }

    #[test]
    #[cfg(target_family = "unix")]
    fn test_written_file_is_mode_0600() {
        use std::os::unix::fs::PermissionsExt;

        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("updater").join(".instance");
        let creds = InstanceCredentials { instance_id: "x".into(), api_key: "y".into() };
        write(&LocalFile, &DirectoryManagerFs, &path, &creds).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn test_read_missing_key_errors() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join(".instance");
        std::fs::write(&path, "INSTANCE_ID=only-this\n").unwrap();

        let err = read(&LocalFile, &path).unwrap_err();
        assert!(matches!(err, InstanceFileError::MissingKey { key: API_KEY_KEY, .. }));
    }

    #[test]
    fn test_read_missing_file_errors() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("does-not-exist");
        let err = read(&LocalFile, &path).unwrap_err();
        assert!(matches!(err, InstanceFileError::Read { .. }));
    }
}
