use std::sync::Arc;

use fleet_proto::{HeartbeatRequest, HeartbeatResponse, ReleaseInfo};

use crate::error::{ApiError, ApiResult};
use crate::instance::registry::InstanceRegistry;
use crate::release::catalog::ReleaseCatalog;

/// §4.6. Strictly read-only with respect to the release catalog: it only ever calls
/// `latest_info`, never mutates a [`fleet_proto::Release`].
pub struct HeartbeatService {
    instances: Arc<InstanceRegistry>,
    releases: Arc<ReleaseCatalog>,
}

impl HeartbeatService {
    pub fn new(instances: Arc<InstanceRegistry>, releases: Arc<ReleaseCatalog>) -> Self {
        Self { instances, releases }
    }

    pub fn accept(&self, hb: HeartbeatRequest) -> ApiResult<HeartbeatResponse> {
        if hb.instance_id.trim().is_empty() {
            return Err(ApiError::Validation("instance_id must not be empty".into()));
        }

        let products = hb.products.clone();
        let instance_id = hb.instance_id.clone();
        self.instances.apply_heartbeat(&instance_id, hb);

        let mut updates: Vec<ReleaseInfo> = Vec::new();
        for product in products {
            let channel: fleet_proto::Channel = match product.channel.parse() {
                Ok(channel) => channel,
                Err(_) => continue,
            };
            if let Some(info) = self.releases.latest_info(&product.name, channel, &product.version) {
                if info.update_available {
                    updates.push(info);
                }
            }
        }

        Ok(HeartbeatResponse {
            status: "ok".to_string(),
            updates,
        })
    }
}
