//! Agent Heartbeat Loop (C10): collects a `HeartbeatRequest` snapshot and POSTs it every
//! `heartbeat.interval`.

mod host_facts;

use chrono::Utc;
use fleet_proto::{HeartbeatRequest, HeartbeatResponse, LicenseHeartbeatInfo, ProductStatus};
use tracing::warn;

use crate::client::{ClientError, FleetClient};
use crate::config::{AgentConfig, Paths};
use crate::supervisor::{ServiceStatus, Supervisor};
use crate::{security_posture, versions, LocalFs};

/// Gathers the whole snapshot named in spec.md §3 for one tick. Never fails: every
/// sub-collection that can fail (license validation, per-product health probes) degrades
/// to a conservative value and is logged, so one flaky dependency never blocks the
/// heartbeat itself (§7).
pub fn collect(
    config: &AgentConfig,
    instance_id: &str,
    paths: &Paths,
    client: &FleetClient,
    supervisor: &Supervisor,
    fsops: &impl LocalFs,
) -> HeartbeatRequest {
    HeartbeatRequest {
        instance_id: instance_id.to_string(),
        updater_version: env!("CARGO_PKG_VERSION").to_string(),
        config_hash: config_hash(config),
        license: license_info(client, &config.license_key),
        products: config
            .products
            .iter()
            .map(|product| product_status(product, paths, client, supervisor, fsops))
            .collect(),
        system: host_facts::collect(paths.base()),
        security: security_posture::collect(),
        timestamp: Utc::now(),
    }
}

pub fn send(client: &FleetClient, request: &HeartbeatRequest) -> Result<HeartbeatResponse, ClientError> {
    client.heartbeat(request)
}

/// SHA-256 of the serialized config, so the server can flag drift without the agent
/// re-uploading the whole file every tick.
fn config_hash(config: &AgentConfig) -> String {
    use sha2::{Digest, Sha256};
    let yaml = config.to_yaml().unwrap_or_default();
    hex::encode(Sha256::digest(yaml.as_bytes()))
}

fn license_info(client: &FleetClient, license_key: &str) -> LicenseHeartbeatInfo {
    let now = Utc::now();
    match client.validate_license(license_key) {
        Ok(response) => LicenseHeartbeatInfo {
            key: license_key.to_string(),
            valid: response.valid,
            expires_at: response.expires_at,
            last_check: now,
        },
        Err(err) => {
            warn!(error = %err, "license validation failed during heartbeat, reporting as unverified");
            LicenseHeartbeatInfo { key: license_key.to_string(), valid: false, expires_at: None, last_check: now }
        }
    }
}

fn product_status(
    product: &crate::config::ProductConfig,
    paths: &Paths,
    client: &FleetClient,
    supervisor: &Supervisor,
    fsops: &impl LocalFs,
) -> ProductStatus {
    let status = supervisor.status(&product.name).unwrap_or(ServiceStatus::Unknown);
    let pid = supervisor.pid(&product.name).ok().flatten();
    let health_status = product
        .health_endpoint
        .as_ref()
        .map(|url| if client.probe_health(url) { "ok".to_string() } else { "unhealthy".to_string() });

    ProductStatus {
        name: product.name.clone(),
        version: versions::current(fsops, &paths.version_file(&product.name)),
        channel: product.channel.clone(),
        status: service_status_str(status).to_string(),
        // Not tracked: would require persisting process start times across ticks, which
        // this agent doesn't do.
        uptime_seconds: 0,
        pid,
        health_endpoint: product.health_endpoint.clone(),
        health_status,
    }
}

fn service_status_str(status: ServiceStatus) -> &'static str {
    match status {
        ServiceStatus::Active => "active",
        ServiceStatus::Inactive => "inactive",
        ServiceStatus::Failed => "failed",
        ServiceStatus::Unknown => "unknown",
    }
}
