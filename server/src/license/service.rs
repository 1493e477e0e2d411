use std::sync::Arc;

use chrono::Utc;
use fleet_proto::{
    CreateLicenseRequest, LicenseSummary, UpdateLicenseRequest, ValidateLicenseResponse,
};
use uuid::Uuid;

use super::key::generate_license_key;
use super::repository::{LicenseRepository, RepositoryError};
use super::License;
use crate::error::{ApiError, ApiResult};

/// §4.2: license lifecycle operations. Thin on top of [`LicenseRepository`] — the interesting
/// invariant (is this license currently usable) lives on [`License::is_usable_by`], not here.
pub struct LicenseService {
    repository: Arc<dyn LicenseRepository>,
}

impl LicenseService {
    pub fn new(repository: Arc<dyn LicenseRepository>) -> Self {
        Self { repository }
    }

    pub fn create(&self, req: CreateLicenseRequest) -> ApiResult<LicenseSummary> {
        if req.customer_name.trim().is_empty() {
            return Err(ApiError::Validation("customer_name must not be empty".into()));
        }

        let license_key = generate_license_key(req.license_type, req.key_prefix.as_deref());
        let license = License {
            id: Uuid::new_v4().to_string(),
            license_key,
            customer_id: req.customer_id,
            customer_name: req.customer_name,
            license_type: req.license_type,
            products: req.products,
            features: req.features,
            limits: req.limits,
            issued_at: Utc::now(),
            expires_at: req.expires_at,
            bound_to: None,
            is_active: true,
        };

        let stored = self
            .repository
            .insert(license)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        Ok(stored.to_summary())
    }

    pub fn get(&self, id: &str) -> ApiResult<LicenseSummary> {
        self.repository
            .by_id(id)
            .map(|l| l.to_summary())
            .ok_or_else(|| ApiError::NotFound(format!("license {id} not found")))
    }

    pub fn list(&self) -> Vec<LicenseSummary> {
        self.repository.list().iter().map(License::to_summary).collect()
    }

    pub fn update(&self, id: &str, req: UpdateLicenseRequest) -> ApiResult<LicenseSummary> {
        let mut license = self
            .repository
            .by_id(id)
            .ok_or_else(|| ApiError::NotFound(format!("license {id} not found")))?;

        if let Some(customer_name) = req.customer_name {
            license.customer_name = customer_name;
        }
        if let Some(products) = req.products {
            license.products = products;
        }
        if let Some(features) = req.features {
            license.features = features;
        }
        if let Some(limits) = req.limits {
            license.limits = limits;
        }
        if let Some(expires_at) = req.expires_at {
            license.expires_at = expires_at;
        }
        if let Some(is_active) = req.is_active {
            license.is_active = is_active;
        }

        let updated = self.repository.update(license).map_err(|e| match e {
            RepositoryError::NotFound(id) => ApiError::NotFound(format!("license {id} not found")),
            RepositoryError::Storage(msg) => ApiError::Internal(msg),
        })?;
        Ok(updated.to_summary())
    }

    pub fn delete(&self, id: &str) -> ApiResult<()> {
        self.repository.delete(id).map_err(|e| match e {
            RepositoryError::NotFound(id) => ApiError::NotFound(format!("license {id} not found")),
            RepositoryError::Storage(msg) => ApiError::Internal(msg),
        })
    }

    /// §4.2: a read-only probe. Does NOT attempt any binding — that only ever happens as a
    /// side effect of a successful activation (§4.3).
    pub fn validate(&self, license_key: &str) -> ValidateLicenseResponse {
        match self.repository.by_key(license_key) {
            Some(license) if license.is_active && Utc::now() < license.expires_at => {
                ValidateLicenseResponse {
                    valid: true,
                    expires_at: Some(license.expires_at),
                    license: Some(license.to_summary()),
                }
            }
            Some(license) => ValidateLicenseResponse {
                valid: false,
                expires_at: Some(license.expires_at),
                license: None,
            },
            None => ValidateLicenseResponse {
                valid: false,
                expires_at: None,
                license: None,
            },
        }
    }
}
