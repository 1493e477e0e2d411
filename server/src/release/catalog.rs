use std::sync::Arc;

use chrono::Utc;
use fleet_proto::{ArtifactRef, Channel, Release, ReleaseInfo, ReleaseManifest};
use uuid::Uuid;

use super::repository::{ReleaseRepository, RepositoryError};
use crate::artifact_store::{ArtifactStore, ByteStream};
use crate::error::ApiError;

/// §4.4. Upload computes the checksum itself, server-side, while the artifact streams
/// through to the store — the client's word for the checksum is never trusted.
pub struct ReleaseCatalog {
    repository: Arc<dyn ReleaseRepository>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl ReleaseCatalog {
    pub fn new(repository: Arc<dyn ReleaseRepository>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self { repository, artifacts }
    }

    pub async fn upload(
        &self,
        product: &str,
        version: &str,
        channel: Channel,
        release_notes: Option<String>,
        filename: &str,
        stream: ByteStream,
    ) -> Result<Release, ApiError> {
        if self.repository.get(product, version).is_some() {
            return Err(ApiError::Conflict(format!(
                "release {product}/{version} already exists"
            )));
        }

        let outcome = self
            .artifacts
            .put(product, version, filename, stream)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        let release = Release {
            id: Uuid::new_v4().to_string(),
            product_name: product.to_string(),
            version: version.to_string(),
            channel,
            manifest: ReleaseManifest {
                product: product.to_string(),
                version: version.to_string(),
                channel,
                artifacts: vec![ArtifactRef {
                    name: filename.to_string(),
                    size: outcome.size,
                    checksum: outcome.checksum.clone(),
                }],
                dependencies: vec![],
                changelog: release_notes.clone(),
            },
            artifact_path: outcome.path,
            artifact_size: outcome.size,
            checksum: outcome.checksum,
            signature: None,
            release_notes,
            min_updater_version: None,
            released_at: Utc::now(),
        };

        match self.repository.insert(release) {
            Ok(release) => Ok(release),
            Err(err) => {
                // compensate: the catalog row lost the race, don't leave an orphan blob.
                let _ = self.artifacts.delete(product, version, filename);
                match err {
                    RepositoryError::Duplicate(p, v) => {
                        Err(ApiError::Conflict(format!("release {p}/{v} already exists")))
                    }
                    RepositoryError::NotFound(p, v) => {
                        Err(ApiError::Internal(format!("unexpected not-found for {p}/{v}")))
                    }
                }
            }
        }
    }

    /// §4.4: supplementary per-arch binaries extend an existing version's artifact set
    /// without minting a new [`Release`] row.
    pub async fn put_supplementary_artifact(
        &self,
        product: &str,
        version: &str,
        filename: &str,
        stream: ByteStream,
    ) -> Result<(), ApiError> {
        if self.repository.get(product, version).is_none() {
            return Err(ApiError::NotFound(format!(
                "release {product}/{version} not found"
            )));
        }
        self.artifacts
            .put(product, version, filename, stream)
            .await
            .map(|_| ())
            .map_err(|e| ApiError::Internal(e.to_string()))
    }

    pub fn get(&self, product: &str, version: &str) -> Option<Release> {
        self.repository.get(product, version)
    }

    pub fn list_for_product(&self, product: &str) -> Vec<Release> {
        self.repository.list_for_product(product)
    }

    pub fn list_all(&self) -> Vec<Release> {
        self.repository.list_all()
    }

    pub fn latest(&self, product: &str, channel: Channel) -> Option<Release> {
        self.repository.latest(product, channel)
    }

    /// §4.4: `update_available` is true whenever `current_version` differs from latest —
    /// including the empty string (first check-in) and a downgrade. Agents are responsible
    /// for refusing to "update" to a lower version if that's undesired.
    pub fn latest_info(
        &self,
        product: &str,
        channel: Channel,
        current_version: &str,
    ) -> Option<ReleaseInfo> {
        let latest = self.repository.latest(product, channel)?;
        Some(ReleaseInfo {
            update_available: current_version.is_empty() || current_version != latest.version,
            latest_version: latest.version.clone(),
            download_url: format!("/api/v1/releases/{product}/{}/download", latest.version),
            checksum: latest.checksum.clone(),
            size: latest.artifact_size,
            released_at: latest.released_at,
        })
    }

    pub async fn artifact_stream(
        &self,
        product: &str,
        version: &str,
        filename: &str,
    ) -> Result<ByteStream, ApiError> {
        self.artifacts
            .get(product, version, filename)
            .await
            .map_err(|e| ApiError::NotFound(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::artifact_store::local::LocalArtifactStore;
    use crate::release::repository::InMemoryReleaseRepository;
    use bytes::Bytes;
    use futures::stream;

    fn catalog(tempdir: &tempfile::TempDir) -> ReleaseCatalog {
        ReleaseCatalog::new(
            Arc::new(InMemoryReleaseRepository::default()),
            Arc::new(LocalArtifactStore::new(tempdir.path())),
        )
    }

    fn body(bytes: &'static [u8]) -> ByteStream {
        Box::pin(stream::iter(vec![Ok(Bytes::from_static(bytes))]))
    }

    #[tokio::test]
    async fn test_upload_then_latest_info_offers_update() {
        let tempdir = tempfile::tempdir().unwrap();
        let cat = catalog(&tempdir);

        cat.upload(
            "siemcore-api",
            "v1.5.0",
            Channel::Stable,
            None,
            "siemcore-linux-amd64",
            body(b"binary contents"),
        )
        .await
        .unwrap();

        let info = cat.latest_info("siemcore-api", Channel::Stable, "v1.4.9").unwrap();
        assert_eq!(info.latest_version, "v1.5.0");
        assert!(info.update_available);
        assert_eq!(info.download_url, "/api/v1/releases/siemcore-api/v1.5.0/download");
    }

    #[tokio::test]
    async fn test_duplicate_upload_is_conflict() {
        let tempdir = tempfile::tempdir().unwrap();
        let cat = catalog(&tempdir);

        cat.upload("siemcore-api", "v1.5.0", Channel::Stable, None, "bin", body(b"first"))
            .await
            .unwrap();

        let err = cat
            .upload("siemcore-api", "v1.5.0", Channel::Stable, None, "bin", body(b"second"))
            .await
            .unwrap_err();
        assert_matches!(err, ApiError::Conflict(_));
    }

    #[tokio::test]
    async fn test_latest_info_none_when_no_releases() {
        let tempdir = tempfile::tempdir().unwrap();
        let cat = catalog(&tempdir);
        assert!(cat.latest_info("ghost-product", Channel::Stable, "").is_none());
    }

    #[tokio::test]
    async fn test_supplementary_artifact_requires_existing_release() {
        let tempdir = tempfile::tempdir().unwrap();
        let cat = catalog(&tempdir);

        let err = cat
            .put_supplementary_artifact("siemcore-api", "v1.5.0", "siemcore-darwin-arm64", body(b"mac binary"))
            .await
            .unwrap_err();
        assert_matches!(err, ApiError::NotFound(_));

        cat.upload("siemcore-api", "v1.5.0", Channel::Stable, None, "siemcore-linux-amd64", body(b"linux binary"))
            .await
            .unwrap();
        cat.put_supplementary_artifact("siemcore-api", "v1.5.0", "siemcore-darwin-arm64", body(b"mac binary"))
            .await
            .unwrap();

        // still exactly one Release row
        assert_eq!(cat.list_for_product("siemcore-api").len(), 1);
    }
}
