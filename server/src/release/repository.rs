use std::sync::Arc;

use dashmap::DashMap;
use fleet_proto::{Channel, Release};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("release {0}/{1} not found")]
    NotFound(String, String),
    #[error("release {0}/{1} already exists")]
    Duplicate(String, String),
}

/// §3: `(product_name, version)` is unique. §9 resolves the open question in favor of
/// rejecting a duplicate upload outright rather than silently replacing it.
#[cfg_attr(test, mockall::automock)]
pub trait ReleaseRepository: Send + Sync {
    fn insert(&self, release: Release) -> Result<Release, RepositoryError>;
    fn get(&self, product: &str, version: &str) -> Option<Release>;
    fn list_for_product(&self, product: &str) -> Vec<Release>;
    fn list_all(&self) -> Vec<Release>;
    /// Newest by `released_at DESC` for the given product/channel — the ordering authority
    /// for "latest", not a version compare (§4.4).
    fn latest(&self, product: &str, channel: Channel) -> Option<Release>;
    fn delete(&self, product: &str, version: &str) -> Result<(), RepositoryError>;
}

#[derive(Default, Clone)]
pub struct InMemoryReleaseRepository {
    by_key: Arc<DashMap<(String, String), Release>>,
}

impl ReleaseRepository for InMemoryReleaseRepository {
    fn insert(&self, release: Release) -> Result<Release, RepositoryError> {
        let key = (release.product_name.clone(), release.version.clone());
        if self.by_key.contains_key(&key) {
            return Err(RepositoryError::Duplicate(key.0, key.1));
        }
        self.by_key.insert(key, release.clone());
        Ok(release)
    }

    fn get(&self, product: &str, version: &str) -> Option<Release> {
        self.by_key
            .get(&(product.to_string(), version.to_string()))
            .map(|e| e.value().clone())
    }

    fn list_for_product(&self, product: &str) -> Vec<Release> {
        self.by_key
            .iter()
            .filter(|e| e.value().product_name == product)
            .map(|e| e.value().clone())
            .collect()
    }

    fn list_all(&self) -> Vec<Release> {
        self.by_key.iter().map(|e| e.value().clone()).collect()
    }

    fn latest(&self, product: &str, channel: Channel) -> Option<Release> {
        self.by_key
            .iter()
            .filter(|e| e.value().product_name == product && e.value().channel == channel)
            .map(|e| e.value().clone())
            .max_by_key(|r| r.released_at)
    }

    fn delete(&self, product: &str, version: &str) -> Result<(), RepositoryError> {
        self.by_key
            .remove(&(product.to_string(), version.to_string()))
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(product.to_string(), version.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use fleet_proto::ReleaseManifest;

    fn release(product: &str, version: &str, channel: Channel, released_at_offset_secs: i64) -> Release {
        Release {
            id: format!("{product}-{version}"),
            product_name: product.to_string(),
            version: version.to_string(),
            channel,
            manifest: ReleaseManifest {
                product: product.to_string(),
                version: version.to_string(),
                channel,
                artifacts: vec![],
                dependencies: vec![],
                changelog: None,
            },
            artifact_path: format!("{product}/{version}/bin"),
            artifact_size: 10,
            checksum: "deadbeef".to_string(),
            signature: None,
            release_notes: None,
            min_updater_version: None,
            released_at: Utc::now() + Duration::seconds(released_at_offset_secs),
        }
    }

    #[test]
    fn test_duplicate_insert_is_rejected() {
        let repo = InMemoryReleaseRepository::default();
        repo.insert(release("siemcore-api", "v1.5.0", Channel::Stable, 0)).unwrap();

        let err = repo
            .insert(release("siemcore-api", "v1.5.0", Channel::Stable, 10))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Duplicate(_, _)));
    }

    #[test]
    fn test_latest_is_ordered_by_released_at_not_version_string() {
        let repo = InMemoryReleaseRepository::default();
        // v1.10.0 was released before v1.2.0 (a hotfix backport) — released_at decides.
        repo.insert(release("siemcore-api", "v1.10.0", Channel::Stable, -100))
            .unwrap();
        repo.insert(release("siemcore-api", "v1.2.0", Channel::Stable, 0))
            .unwrap();

        let latest = repo.latest("siemcore-api", Channel::Stable).unwrap();
        assert_eq!(latest.version, "v1.2.0");
    }

    #[test]
    fn test_latest_is_scoped_to_channel() {
        let repo = InMemoryReleaseRepository::default();
        repo.insert(release("siemcore-api", "v1.0.0", Channel::Stable, 0)).unwrap();
        repo.insert(release("siemcore-api", "v2.0.0-beta", Channel::Beta, 100))
            .unwrap();

        let latest = repo.latest("siemcore-api", Channel::Stable).unwrap();
        assert_eq!(latest.version, "v1.0.0");
    }
}
