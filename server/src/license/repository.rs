use super::License;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("license {0} not found")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Stands in for the relational store of §6, which is explicitly an external collaborator
/// for this core. `InMemoryLicenseRepository` is the one concrete backing provided; swapping
/// in a real database means implementing this trait against it, nothing else changes.
#[cfg_attr(test, mockall::automock)]
pub trait LicenseRepository: Send + Sync {
    fn insert(&self, license: License) -> Result<License, RepositoryError>;
    fn by_key(&self, license_key: &str) -> Option<License>;
    fn by_id(&self, id: &str) -> Option<License>;
    fn list(&self) -> Vec<License>;
    fn update(&self, license: License) -> Result<License, RepositoryError>;
    fn delete(&self, id: &str) -> Result<(), RepositoryError>;
    /// Best-effort: sets `bound_to` only if it is currently empty. Returns the stored
    /// license either way so the caller can observe whether the latch actually took.
    fn bind(&self, id: &str, machine_id: &str) -> Result<License, RepositoryError>;
}

#[derive(Default, Clone)]
pub struct InMemoryLicenseRepository {
    by_id: Arc<DashMap<String, License>>,
}

impl LicenseRepository for InMemoryLicenseRepository {
    fn insert(&self, license: License) -> Result<License, RepositoryError> {
        self.by_id.insert(license.id.clone(), license.clone());
        Ok(license)
    }

    fn by_key(&self, license_key: &str) -> Option<License> {
        self.by_id
            .iter()
            .find(|entry| entry.value().license_key == license_key)
            .map(|entry| entry.value().clone())
    }

    fn by_id(&self, id: &str) -> Option<License> {
        self.by_id.get(id).map(|entry| entry.value().clone())
    }

    fn list(&self) -> Vec<License> {
        self.by_id.iter().map(|e| e.value().clone()).collect()
    }

    fn update(&self, license: License) -> Result<License, RepositoryError> {
        if !self.by_id.contains_key(&license.id) {
            return Err(RepositoryError::NotFound(license.id));
        }
        self.by_id.insert(license.id.clone(), license.clone());
        Ok(license)
    }

    fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        self.by_id
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    fn bind(&self, id: &str, machine_id: &str) -> Result<License, RepositoryError> {
        let mut entry = self
            .by_id
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        if entry.bound_to.is_none() {
            entry.bound_to = Some(machine_id.to_string());
        }
        Ok(entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license::key::generate_license_key;
    use chrono::{Duration, Utc};
    use fleet_proto::{LicenseLimits, LicenseType};

    fn sample_license(id: &str) -> License {
        License {
            id: id.to_string(),
            license_key: generate_license_key(LicenseType::Siemcore, None),
            customer_id: "cust-1".to_string(),
            customer_name: "Acme Corp".to_string(),
            license_type: LicenseType::Siemcore,
            products: vec![],
            features: vec![],
            limits: LicenseLimits::default(),
            issued_at: Utc::now(),
            expires_at: Utc::now() + Duration::days(365),
            bound_to: None,
            is_active: true,
        }
    }

    #[test]
    fn test_insert_and_lookup_by_key_and_id() {
        let repo = InMemoryLicenseRepository::default();
        let license = sample_license("lic-1");
        repo.insert(license.clone()).unwrap();

        assert_eq!(repo.by_id("lic-1").unwrap().id, "lic-1");
        assert_eq!(
            repo.by_key(&license.license_key).unwrap().id,
            "lic-1"
        );
        assert!(repo.by_key("does-not-exist").is_none());
    }

    #[test]
    fn test_bind_latches_only_once() {
        let repo = InMemoryLicenseRepository::default();
        repo.insert(sample_license("lic-1")).unwrap();

        let bound = repo.bind("lic-1", "machine-a").unwrap();
        assert_eq!(bound.bound_to.as_deref(), Some("machine-a"));

        // second bind from a different machine does not override the latch
        let still_bound = repo.bind("lic-1", "machine-b").unwrap();
        assert_eq!(still_bound.bound_to.as_deref(), Some("machine-a"));
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let repo = InMemoryLicenseRepository::default();
        let err = repo.delete("missing").unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }
}
