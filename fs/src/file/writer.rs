use super::super::utils::{FsError, validate_path};
use super::LocalFile;
use std::io::Write;
use std::path::Path;
use std::{fs, io};
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("error creating file: {0}")]
    ErrorCreatingFile(#[from] io::Error),

    #[error("invalid path: {0}")]
    InvalidPath(#[from] FsError),

    #[error("{0}")]
    GenericError(String),
}

pub trait FileWriter {
    /// Write `buf` to `path` with permissions suitable for a regular, non-executable file (0600 on unix).
    fn write(&self, path: &Path, buf: String) -> Result<(), WriteError>;

    /// Write raw bytes to `path` and mark the resulting file executable (0755 on unix).
    /// Used to stage downloaded update artifacts before they are swapped into place.
    fn write_executable(&self, path: &Path, buf: &[u8]) -> Result<(), WriteError>;
}

impl FileWriter for LocalFile {
    /// write a file to disk given a path and content.
    /// On Unix it sets the file permissions to 600.
    /// On Windows it removes inheritance and adds Read/Write only to administrators.
    #[instrument(skip_all, fields(path = %path.display()))]
    fn write(&self, path: &Path, content: String) -> Result<(), WriteError> {
        validate_path(path)?;

        let mut file_options = fs::OpenOptions::new();
        file_options.create(true).write(true).truncate(true);

        #[cfg(target_family = "unix")]
        {
            use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

            file_options.mode(crate::utils::get_file_permissions().mode());
        }

        file_options.open(path)?.write_all(content.as_bytes())?;

        #[cfg(target_family = "windows")]
        crate::win_permissions::set_file_permissions_for_administrator(path)
            .map_err(|err| WriteError::GenericError(err.to_string()))?;

        Ok(())
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    fn write_executable(&self, path: &Path, content: &[u8]) -> Result<(), WriteError> {
        validate_path(path)?;

        let mut file_options = fs::OpenOptions::new();
        file_options.create(true).write(true).truncate(true);

        #[cfg(target_family = "unix")]
        {
            use std::os::unix::fs::OpenOptionsExt;

            file_options.mode(0o755);
        }

        file_options.open(path)?.write_all(content)?;

        #[cfg(target_family = "unix")]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
        }

        #[cfg(target_family = "windows")]
        crate::win_permissions::set_file_permissions_for_administrator(path)
            .map_err(|err| WriteError::GenericError(err.to_string()))?;

        Ok(())
    }
}

#[cfg(feature = "mocks")]
pub mod mock {
    ////////////////////////////////////////////////////////////////////////////////////
    // Mock
    ////////////////////////////////////////////////////////////////////////////////////
    use super::*;
    use crate::mock::MockLocalFile;
    use mockall::predicate;
    use std::io::{Error, ErrorKind};
    use std::path::PathBuf;

    impl MockLocalFile {
        pub fn should_write(&mut self, path: &Path, content: String) {
            let path_clone = PathBuf::from(path.to_str().unwrap().to_string().as_str());
            self.expect_write()
                .with(predicate::eq(path_clone), predicate::eq(content))
                .once()
                .returning(|_, _| Ok(()));
        }

        pub fn should_not_write(&mut self, path: &Path, content: String) {
            let path_clone = PathBuf::from(path.to_str().unwrap().to_string().as_str());
            self.expect_write()
                .with(predicate::eq(path_clone), predicate::eq(content))
                .once()
                .returning(|_, _| {
                    Err(WriteError::ErrorCreatingFile(io::Error::from(
                        ErrorKind::PermissionDenied,
                    )))
                });
        }

        pub fn should_write_any(&mut self, times: usize) {
            self.expect_write().times(times).returning(|_, _| Ok(()));
        }

        pub fn should_not_write_any(&mut self, times: usize, io_err_kind: ErrorKind) {
            self.expect_write().times(times).returning(move |_, _| {
                Err(WriteError::ErrorCreatingFile(Error::from(io_err_kind)))
            });
        }

        pub fn should_write_executable_any(&mut self, times: usize) {
            self.expect_write_executable()
                .times(times)
                .returning(|_, _| Ok(()));
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////
// TESTS
////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
pub mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn test_file_writer_content() {
        let file_name = "some_file";
        let content = "some content";
        let tempdir = tempfile::tempdir().unwrap();
        let mut path = PathBuf::from(&tempdir.path());
        path.push(file_name);

        let writer = LocalFile;
        let write_result = writer.write(path.as_path(), content.to_string());
        assert!(write_result.is_ok());

        assert_eq!(fs::read_to_string(path.clone()).unwrap(), "some content");
        assert!(path.exists());
    }

    #[test]
    fn test_file_writer_should_not_return_error_if_file_already_exists() {
        let file_name = "some_file";
        let content = "some content";
        let tempdir = tempfile::tempdir().unwrap();
        let mut path = PathBuf::from(&tempdir.path());
        path.push(file_name);

        let writer = LocalFile;
        let write_result = writer.write(path.as_path(), content.to_string());
        assert!(write_result.is_ok());
        let write_result = writer.write(path.as_path(), content.to_string());
        assert!(write_result.is_ok());
    }

    #[test]
    fn test_file_writer_truncate_exiting_file() {
        let file_name = "some_file";
        let new_content = "new content";
        let tempdir = tempfile::tempdir().unwrap();
        let mut path = PathBuf::from(&tempdir.path());
        path.push(file_name);

        fs::write(path.as_path(), "older content with greater len than new").unwrap();

        let writer = LocalFile;
        writer
            .write(path.as_path(), new_content.to_string())
            .expect("write failed");

        assert_eq!(fs::read_to_string(path.clone()).unwrap(), new_content);
    }

    #[test]
    fn test_path_to_write_cannot_contain_dots() {
        let file_name = "some/path/../../etc/passwd";
        let path = PathBuf::from(file_name);
        let writer = LocalFile;

        let result = writer.write(&path, "".to_string());

        assert!(result.is_err());
        assert_eq!(
            "invalid path: dots disallowed in path some/path/../../etc/passwd".to_string(),
            result.unwrap_err().to_string()
        );
    }

    #[test]
    #[cfg(target_family = "unix")]
    fn test_write_executable_sets_mode() {
        use std::os::unix::fs::PermissionsExt;

        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("siemcore-api");

        let writer = LocalFile;
        writer.write_executable(&path, b"binary-bytes").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"binary-bytes");
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);
    }
}
