use std::path::PathBuf;

use async_trait::async_trait;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use super::{ArtifactStore, ArtifactStoreError, ByteStream, PutOutcome};

/// Local-disk backing for [`ArtifactStore`]. `base_dir` plays the role of the blob store's
/// root; everything below it is `<product>/<version>/<filename>`.
#[derive(Clone)]
pub struct LocalArtifactStore {
    base_dir: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn dir_for(&self, product: &str, version: &str) -> PathBuf {
        self.base_dir.join(product).join(version)
    }

    fn path_for(&self, product: &str, version: &str, filename: &str) -> PathBuf {
        self.dir_for(product, version).join(filename)
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn put(
        &self,
        product: &str,
        version: &str,
        filename: &str,
        mut stream: ByteStream,
    ) -> Result<PutOutcome, ArtifactStoreError> {
        let dir = self.dir_for(product, version);
        fs::create_dir_all(&dir).await?;

        let temp_path = dir.join(format!(".upload-{}", Uuid::new_v4()));
        let mut file = fs::File::create(&temp_path).await?;
        let mut hasher = Sha256::new();
        let mut size: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&temp_path).await;
                    return Err(ArtifactStoreError::Io(err));
                }
            };
            hasher.update(&chunk);
            size += chunk.len() as u64;
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&temp_path).await;
                return Err(ArtifactStoreError::Io(err));
            }
        }
        file.flush().await?;
        drop(file);

        #[cfg(target_family = "unix")]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o755)).await?;
        }

        let final_path = self.path_for(product, version, filename);
        fs::rename(&temp_path, &final_path).await?;

        let checksum = hex::encode(hasher.finalize());
        Ok(PutOutcome {
            path: format!("{product}/{version}/{filename}"),
            size,
            checksum,
        })
    }

    async fn get(
        &self,
        product: &str,
        version: &str,
        filename: &str,
    ) -> Result<ByteStream, ArtifactStoreError> {
        let path = self.path_for(product, version, filename);
        let file = fs::File::open(&path).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                ArtifactStoreError::NotFound(
                    product.to_string(),
                    version.to_string(),
                    filename.to_string(),
                )
            } else {
                ArtifactStoreError::Io(err)
            }
        })?;
        Ok(Box::pin(ReaderStream::new(file)))
    }

    async fn size(&self, product: &str, version: &str, filename: &str) -> Result<u64, ArtifactStoreError> {
        let path = self.path_for(product, version, filename);
        let metadata = fs::metadata(&path).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                ArtifactStoreError::NotFound(
                    product.to_string(),
                    version.to_string(),
                    filename.to_string(),
                )
            } else {
                ArtifactStoreError::Io(err)
            }
        })?;
        Ok(metadata.len())
    }

    fn exists(&self, product: &str, version: &str, filename: &str) -> bool {
        self.path_for(product, version, filename).is_file()
    }

    fn delete(&self, product: &str, version: &str, filename: &str) -> Result<(), ArtifactStoreError> {
        let path = self.path_for(product, version, filename);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ArtifactStoreError::Io(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;

    fn body_stream(chunks: Vec<&'static [u8]>) -> ByteStream {
        Box::pin(stream::iter(
            chunks.into_iter().map(|c| Ok(Bytes::from_static(c))),
        ))
    }

    #[tokio::test]
    async fn test_put_then_get_round_trips_and_checksums() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(tempdir.path());

        let outcome = store
            .put("siemcore", "v1.5.0", "siemcore-linux-amd64", body_stream(vec![b"hello ", b"world"]))
            .await
            .unwrap();

        assert_eq!(outcome.size, 11);
        assert_eq!(
            outcome.checksum,
            format!("{:x}", Sha256::digest(b"hello world"))
        );
        assert!(store.exists("siemcore", "v1.5.0", "siemcore-linux-amd64"));

        let mut got = store
            .get("siemcore", "v1.5.0", "siemcore-linux-amd64")
            .await
            .unwrap();
        let mut buf = Vec::new();
        while let Some(chunk) = got.next().await {
            buf.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(buf, b"hello world");
    }

    #[tokio::test]
    async fn test_get_missing_artifact_is_not_found() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(tempdir.path());

        let err = store.get("siemcore", "v1.5.0", "missing").await.unwrap_err();
        assert!(matches!(err, ArtifactStoreError::NotFound(_, _, _)));
    }

    #[tokio::test]
    async fn test_size_matches_written_bytes() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(tempdir.path());

        store
            .put("siemcore", "v1.5.0", "bin", body_stream(vec![b"hello ", b"world"]))
            .await
            .unwrap();

        assert_eq!(store.size("siemcore", "v1.5.0", "bin").await.unwrap(), 11);
    }

    #[tokio::test]
    async fn test_size_missing_artifact_is_not_found() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(tempdir.path());

        let err = store.size("siemcore", "v1.5.0", "missing").await.unwrap_err();
        assert!(matches!(err, ArtifactStoreError::NotFound(_, _, _)));
    }

    #[tokio::test]
    async fn test_delete_missing_artifact_is_idempotent() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(tempdir.path());
        assert!(store.delete("siemcore", "v1.5.0", "missing").is_ok());
    }

    #[tokio::test]
    async fn test_put_overwrite_is_last_writer_wins() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(tempdir.path());

        store
            .put("siemcore", "v1.5.0", "bin", body_stream(vec![b"first"]))
            .await
            .unwrap();
        let second = store
            .put("siemcore", "v1.5.0", "bin", body_stream(vec![b"second-version"]))
            .await
            .unwrap();

        assert_eq!(second.size, 14);
    }
}
