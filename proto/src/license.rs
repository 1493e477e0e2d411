use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The family of product a license entitles its holder to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LicenseType {
    MysocCloud,
    Siemcore,
    SiemcoreLite,
}

impl LicenseType {
    /// Lowercase form used as the `<type>` segment of a derived `instance_id`.
    pub fn as_slug(&self) -> &'static str {
        match self {
            LicenseType::MysocCloud => "mysoc-cloud",
            LicenseType::Siemcore => "siemcore",
            LicenseType::SiemcoreLite => "siemcore-lite",
        }
    }

    /// Default license-key prefix for this type, absent an explicit override in the request.
    pub fn default_key_prefix(&self) -> &'static str {
        match self {
            LicenseType::MysocCloud => "MYSOC",
            LicenseType::Siemcore | LicenseType::SiemcoreLite => "SIEM",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LicenseLimits {
    #[serde(default)]
    pub max_events_per_day: Option<u64>,
    #[serde(default)]
    pub max_users: Option<u32>,
    #[serde(default)]
    pub max_data_sources: Option<u32>,
    #[serde(default)]
    pub max_retention_days: Option<u32>,
}

/// What a caller gets back after creating a license or reading one through the catalog.
/// Never carries `bound_to`: that latch is an activation-service implementation detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseSummary {
    pub id: String,
    pub license_key: String,
    pub customer_id: String,
    pub customer_name: String,
    #[serde(rename = "type")]
    pub license_type: LicenseType,
    pub products: Vec<String>,
    pub features: Vec<String>,
    pub limits: LicenseLimits,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLicenseRequest {
    pub customer_id: String,
    pub customer_name: String,
    #[serde(rename = "type")]
    pub license_type: LicenseType,
    #[serde(default)]
    pub products: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub limits: LicenseLimits,
    pub expires_at: DateTime<Utc>,
    /// Overrides the type's default key prefix (`SIEM`/`MYSOC`).
    #[serde(default)]
    pub key_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateLicenseRequest {
    pub customer_name: Option<String>,
    pub products: Option<Vec<String>>,
    pub features: Option<Vec<String>>,
    pub limits: Option<LicenseLimits>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidateLicenseRequest {
    pub license_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidateLicenseResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<LicenseSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}
