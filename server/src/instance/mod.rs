pub mod registry;
pub mod repository;

use chrono::{DateTime, Utc};
use fleet_proto::HeartbeatRequest;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Online,
    Offline,
    Degraded,
    Unknown,
}

/// `instance_id` is immutable once created; re-activation only ever touches `hostname`,
/// `api_key_hash`, and `status` (§3).
#[derive(Debug, Clone, Serialize)]
pub struct Instance {
    pub id: String,
    pub instance_id: String,
    pub instance_type: String,
    pub hostname: String,
    pub license_id: Option<String>,
    pub api_key_hash: String,
    pub last_heartbeat: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub last_heartbeat_data: Option<HeartbeatRequest>,
    pub status: InstanceStatus,
}

impl Instance {
    pub fn new(
        id: String,
        instance_id: String,
        instance_type: String,
        hostname: String,
        license_id: Option<String>,
        api_key_hash: String,
    ) -> Self {
        Self {
            id,
            instance_id,
            instance_type,
            hostname,
            license_id,
            api_key_hash,
            last_heartbeat: None,
            last_heartbeat_data: None,
            status: InstanceStatus::Unknown,
        }
    }
}
