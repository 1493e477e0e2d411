use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use fleet_proto::HeartbeatRequest;
use thiserror::Error;
use uuid::Uuid;

use super::{Instance, InstanceStatus};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("instance {0} not found")]
    NotFound(String),
}

/// Stands in for the relational store of §6. Keyed by the derived `instance_id`, which is
/// exactly the serialization key §5 requires for activation's read-or-insert step — DashMap's
/// per-shard locking gives that for free via `entry()`.
#[cfg_attr(test, mockall::automock)]
pub trait InstanceRepository: Send + Sync {
    fn by_instance_id(&self, instance_id: &str) -> Option<Instance>;
    fn by_id(&self, id: &str) -> Option<Instance>;
    fn list(&self) -> Vec<Instance>;
    fn delete(&self, id: &str) -> Result<(), RepositoryError>;

    /// §4.3 step 7: atomically update-in-place if `instance_id` already exists, else insert
    /// fresh. Either way the previous API key hash is overwritten, invalidating it.
    fn upsert_activation(
        &self,
        instance_id: &str,
        instance_type: &str,
        hostname: &str,
        license_id: Option<String>,
        api_key_hash: &str,
    ) -> Instance;

    /// §4.5: no-op (returns false) if the instance is unknown — an agent that lost its
    /// registration must re-activate, the heartbeat handler must not error for it.
    fn apply_heartbeat(&self, instance_id: &str, hb: HeartbeatRequest) -> bool;

    /// §4.5 offline sweep. Returns the count of instances flipped to offline.
    fn sweep_offline(&self, threshold_secs: i64) -> usize;
}

#[derive(Default, Clone)]
pub struct InMemoryInstanceRepository {
    by_instance_id: Arc<DashMap<String, Instance>>,
}

impl InstanceRepository for InMemoryInstanceRepository {
    fn by_instance_id(&self, instance_id: &str) -> Option<Instance> {
        self.by_instance_id.get(instance_id).map(|e| e.value().clone())
    }

    fn by_id(&self, id: &str) -> Option<Instance> {
        self.by_instance_id
            .iter()
            .find(|e| e.value().id == id)
            .map(|e| e.value().clone())
    }

    fn list(&self) -> Vec<Instance> {
        self.by_instance_id.iter().map(|e| e.value().clone()).collect()
    }

    fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        let key = self
            .by_instance_id
            .iter()
            .find(|e| e.value().id == id)
            .map(|e| e.key().clone());
        match key {
            Some(key) => {
                self.by_instance_id.remove(&key);
                Ok(())
            }
            None => Err(RepositoryError::NotFound(id.to_string())),
        }
    }

    fn upsert_activation(
        &self,
        instance_id: &str,
        instance_type: &str,
        hostname: &str,
        license_id: Option<String>,
        api_key_hash: &str,
    ) -> Instance {
        match self.by_instance_id.entry(instance_id.to_string()) {
            Entry::Occupied(mut entry) => {
                let row = entry.get_mut();
                row.hostname = hostname.to_string();
                row.api_key_hash = api_key_hash.to_string();
                row.status = InstanceStatus::Online;
                row.clone()
            }
            Entry::Vacant(entry) => {
                let mut row = Instance::new(
                    Uuid::new_v4().to_string(),
                    instance_id.to_string(),
                    instance_type.to_string(),
                    hostname.to_string(),
                    license_id,
                    api_key_hash.to_string(),
                );
                row.status = InstanceStatus::Online;
                entry.insert(row.clone());
                row
            }
        }
    }

    fn apply_heartbeat(&self, instance_id: &str, hb: HeartbeatRequest) -> bool {
        match self.by_instance_id.get_mut(instance_id) {
            Some(mut row) => {
                row.last_heartbeat = Some(Utc::now());
                row.last_heartbeat_data = Some(hb);
                row.status = InstanceStatus::Online;
                true
            }
            None => false,
        }
    }

    fn sweep_offline(&self, threshold_secs: i64) -> usize {
        let now = Utc::now();
        let mut flipped = 0;
        for mut entry in self.by_instance_id.iter_mut() {
            let row = entry.value_mut();
            if row.status == InstanceStatus::Online {
                let stale = match row.last_heartbeat {
                    Some(last) => (now - last).num_seconds() >= threshold_secs,
                    None => false,
                };
                if stale {
                    row.status = InstanceStatus::Offline;
                    flipped += 1;
                }
            }
        }
        flipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_activation_inserts_then_updates_in_place() {
        let repo = InMemoryInstanceRepository::default();
        let first = repo.upsert_activation("siemcore-acme-corp-local", "siemcore", "acme.corp.local", None, "hash1");
        assert_eq!(repo.list().len(), 1);

        let second = repo.upsert_activation("siemcore-acme-corp-local", "siemcore", "acme.corp.local", None, "hash2");
        assert_eq!(repo.list().len(), 1, "re-activation must not create a second row");
        assert_eq!(first.id, second.id, "instance id is stable across re-activation");
        assert_eq!(second.api_key_hash, "hash2");
    }

    #[test]
    fn test_apply_heartbeat_missing_instance_is_noop() {
        let repo = InMemoryInstanceRepository::default();
        assert!(!repo.apply_heartbeat("ghost", sample_heartbeat()));
    }

    #[test]
    fn test_sweep_offline_flips_stale_online_instances() {
        let repo = InMemoryInstanceRepository::default();
        repo.upsert_activation("siemcore-host-a", "siemcore", "host-a", None, "hash");
        repo.apply_heartbeat("siemcore-host-a", sample_heartbeat());

        // fresh heartbeat: not stale against any sane threshold
        assert_eq!(repo.sweep_offline(600), 0);

        // simulate staleness by using a threshold of -1 (everything is "older" than now - (-1))
        assert_eq!(repo.sweep_offline(-1), 1);
        assert_eq!(repo.by_instance_id("siemcore-host-a").unwrap().status, InstanceStatus::Offline);
    }

    fn sample_heartbeat() -> HeartbeatRequest {
        use fleet_proto::{DiskInfo, LicenseHeartbeatInfo, MemoryInfo, SecurityPosture, SystemInfo};
        HeartbeatRequest {
            instance_id: "siemcore-host-a".to_string(),
            updater_version: "v1.0.0".to_string(),
            config_hash: "deadbeef".to_string(),
            license: LicenseHeartbeatInfo {
                key: "SIEM-0000-0000-0000-0000".to_string(),
                valid: true,
                expires_at: None,
                last_check: Utc::now(),
            },
            products: vec![],
            system: SystemInfo {
                os: "linux".to_string(),
                arch: "x86_64".to_string(),
                cpu_usage_percent: 1.0,
                memory: MemoryInfo::default(),
                disk: DiskInfo::default(),
                load_avg: [0.0, 0.0, 0.0],
                uptime_seconds: 10,
            },
            security: SecurityPosture {
                firewall_enabled: true,
                ssh_hardened: true,
                tls_certificates: vec![],
                pending_updates: 0,
                security_updates: 0,
                reboot_required: false,
                compliance_score: 100.0,
                security_score: 100.0,
                last_scan: None,
            },
            timestamp: Utc::now(),
        }
    }
}
