pub mod key;
pub mod repository;
pub mod service;

use chrono::{DateTime, Utc};
use fleet_proto::{LicenseLimits, LicenseSummary, LicenseType};

/// Server-internal license row. Carries `license_key` and `bound_to`, neither of which
/// ever cross the wire in a [`LicenseSummary`].
#[derive(Debug, Clone, PartialEq)]
pub struct License {
    pub id: String,
    pub license_key: String,
    pub customer_id: String,
    pub customer_name: String,
    pub license_type: LicenseType,
    pub products: Vec<String>,
    pub features: Vec<String>,
    pub limits: LicenseLimits,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub bound_to: Option<String>,
    pub is_active: bool,
}

impl License {
    /// §3 invariant: usable iff active, unexpired, and either unbound or bound to the caller.
    pub fn is_usable_by(&self, machine_id: &str) -> bool {
        self.is_active
            && Utc::now() < self.expires_at
            && match &self.bound_to {
                None => true,
                Some(bound) => bound == machine_id,
            }
    }

    pub fn to_summary(&self) -> LicenseSummary {
        LicenseSummary {
            id: self.id.clone(),
            license_key: self.license_key.clone(),
            customer_id: self.customer_id.clone(),
            customer_name: self.customer_name.clone(),
            license_type: self.license_type,
            products: self.products.clone(),
            features: self.features.clone(),
            limits: self.limits.clone(),
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            is_active: self.is_active,
        }
    }
}
