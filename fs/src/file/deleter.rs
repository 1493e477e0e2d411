use super::LocalFile;
use std::fs;
use std::io;
use std::path::Path;

pub trait FileDeleter {
    /// Delete a file. Missing files are not an error.
    fn delete(&self, file_path: &Path) -> io::Result<()>;
}

impl FileDeleter for LocalFile {
    fn delete(&self, file_path: &Path) -> io::Result<()> {
        match fs::remove_file(file_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(feature = "mocks")]
pub mod mock {
    use super::*;
    use crate::mock::MockLocalFile;
    use mockall::predicate;
    use std::path::PathBuf;

    impl MockLocalFile {
        pub fn should_delete(&mut self, path: &Path) {
            let path_clone = PathBuf::from(path);
            self.expect_delete()
                .with(predicate::eq(path_clone))
                .once()
                .returning(|_| Ok(()));
        }

        pub fn should_not_delete(&mut self, path: &Path, err: io::Error) {
            let path_clone = PathBuf::from(path);
            self.expect_delete()
                .with(predicate::eq(path_clone))
                .return_once(|_| Err(err));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_missing_file_is_not_an_error() {
        let deleter = LocalFile;
        let result = deleter.delete(Path::new("/a/path/that/does/not/exist"));
        assert!(result.is_ok());
    }

    #[test]
    fn test_delete_existing_file() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("some_file");
        std::fs::write(&path, "content").unwrap();

        let deleter = LocalFile;
        assert!(deleter.delete(&path).is_ok());
        assert!(!path.exists());
    }
}
