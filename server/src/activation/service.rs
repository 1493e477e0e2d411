use std::sync::Arc;

use chrono::Utc;
use fleet_proto::{
    ActivatedInstance, ActivationRequest, ActivationResponse, InstallManifest, LicenseType,
    ProductSpec,
};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::instance::repository::InstanceRepository;
use crate::license::repository::LicenseRepository;

/// §4.3, the hardest path in the core: license lookup, refusal checks in a fixed order,
/// `instance_id` derivation, one-time API key issuance, and `InstallManifest` assembly.
pub struct ActivationService {
    licenses: Arc<dyn LicenseRepository>,
    instances: Arc<dyn InstanceRepository>,
}

impl ActivationService {
    pub fn new(licenses: Arc<dyn LicenseRepository>, instances: Arc<dyn InstanceRepository>) -> Self {
        Self { licenses, instances }
    }

    pub fn activate(&self, req: ActivationRequest) -> ActivationResponse {
        // Step 1: never distinguish "key doesn't exist" from later refusals in the message.
        let license = match self.licenses.by_key(&req.license_key) {
            Some(license) => license,
            None => return ActivationResponse::refused("invalid license key"),
        };

        // Steps 2-4: deterministic refusals, fixed order.
        if !license.is_active {
            return ActivationResponse::refused("license is not active");
        }
        if license.expires_at < Utc::now() {
            return ActivationResponse::refused("license has expired");
        }
        if let Some(bound_to) = &license.bound_to {
            if bound_to != &req.machine_id {
                return ActivationResponse::refused("license is bound to a different machine");
            }
        }

        // Step 5: derive instance_id.
        let instance_id = derive_instance_id(license.license_type, &req.hostname);

        // Step 6: issue a fresh API key.
        let api_key = generate_api_key();
        let api_key_hash = hash_api_key(&api_key);

        // Step 7: atomic read-or-insert, serialized per instance_id by the repository.
        let instance = self.instances.upsert_activation(
            &instance_id,
            license.license_type.as_slug(),
            &req.hostname,
            Some(license.id.clone()),
            &api_key_hash,
        );

        // Step 8: best-effort binding latch.
        if license.bound_to.is_none() && !req.machine_id.is_empty() {
            let _ = self.licenses.bind(&license.id, &req.machine_id);
        }

        // Step 9: install manifest.
        let install = build_install_manifest(license.license_type, &license.products);

        ActivationResponse {
            success: true,
            error: None,
            license: Some(license.to_summary()),
            instance: Some(ActivatedInstance {
                id: instance.instance_id.clone(),
                name: instance.instance_id,
                api_key,
            }),
            install: Some(install),
        }
    }
}

/// `<type-lowercase>-<sanitize(hostname)>`, or a random 4-byte hex suffix when the hostname
/// is absent (a host that can't report its own name, or a test harness).
fn derive_instance_id(license_type: LicenseType, hostname: &str) -> String {
    let suffix = if hostname.is_empty() {
        let mut buf = [0u8; 4];
        rand::thread_rng().fill_bytes(&mut buf);
        hex::encode(buf)
    } else {
        sanitize_hostname(hostname)
    };
    format!("{}-{suffix}", license_type.as_slug())
}

fn sanitize_hostname(hostname: &str) -> String {
    hostname.to_lowercase().replace('.', "-")
}

fn generate_api_key() -> String {
    let mut buf = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut buf);
    format!("sk_inst_{}", hex::encode(buf))
}

fn hash_api_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

fn build_install_manifest(license_type: LicenseType, extra_products: &[String]) -> InstallManifest {
    let (base, config_template): (&[&str], &str) = match license_type {
        LicenseType::Siemcore | LicenseType::SiemcoreLite => (
            &["siemcore-api", "siemcore-collector", "siemcore-frontend", "detection-rules"],
            "siemcore-standard",
        ),
        LicenseType::MysocCloud => (&["mysoc-api", "mysoc-frontend"], "mysoc-cloud"),
    };

    let mut names: Vec<String> = base.iter().map(|s| s.to_string()).collect();
    for extra in extra_products {
        if !names.contains(extra) {
            names.push(extra.clone());
        }
    }

    InstallManifest {
        products: names
            .into_iter()
            .map(|name| ProductSpec {
                name,
                version: "latest".to_string(),
                channel: "stable".to_string(),
            })
            .collect(),
        config_template: config_template.to_string(),
        security_baseline: "cis-level1".to_string(),
    }
}
