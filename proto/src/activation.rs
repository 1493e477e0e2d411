use crate::license::LicenseSummary;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct ActivationRequest {
    pub license_key: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub machine_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductSpec {
    pub name: String,
    pub version: String,
    pub channel: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallManifest {
    pub products: Vec<ProductSpec>,
    pub config_template: String,
    pub security_baseline: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivatedInstance {
    pub id: String,
    pub name: String,
    /// Plaintext API key. Returned exactly once, at activation time; the server retains
    /// only its SHA-256 hash from this point on.
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ActivationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<LicenseSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<ActivatedInstance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install: Option<InstallManifest>,
}

impl ActivationResponse {
    pub fn refused(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}
