use crate::release::ReleaseInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseHeartbeatInfo {
    pub key: String,
    pub valid: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub last_check: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductStatus {
    pub name: String,
    pub version: String,
    pub channel: String,
    pub status: String,
    #[serde(default)]
    pub uptime_seconds: u64,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub health_endpoint: Option<String>,
    #[serde(default)]
    pub health_status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MemoryInfo {
    pub total_bytes: u64,
    pub used_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DiskInfo {
    pub total_bytes: u64,
    pub used_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub cpu_usage_percent: f32,
    pub memory: MemoryInfo,
    pub disk: DiskInfo,
    pub load_avg: [f64; 3],
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TlsCertificateInfo {
    pub subject: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityPosture {
    pub firewall_enabled: bool,
    pub ssh_hardened: bool,
    #[serde(default)]
    pub tls_certificates: Vec<TlsCertificateInfo>,
    pub pending_updates: u32,
    pub security_updates: u32,
    pub reboot_required: bool,
    pub compliance_score: f32,
    pub security_score: f32,
    pub last_scan: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub instance_id: String,
    pub updater_version: String,
    pub config_hash: String,
    pub license: LicenseHeartbeatInfo,
    pub products: Vec<ProductStatus>,
    pub system: SystemInfo,
    pub security: SecurityPosture,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub status: String,
    pub updates: Vec<ReleaseInfo>,
}
