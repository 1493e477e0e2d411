use std::sync::Arc;

use fleet_proto::HeartbeatRequest;

use super::repository::{InstanceRepository, RepositoryError};
use super::Instance;
use crate::error::ApiError;

/// §4.5: the thin service wrapping [`InstanceRepository`]. Exists mainly so the offline
/// sweep's threshold (an operational concern, see [`crate::config::ServerConfig`]) doesn't
/// leak into the repository trait itself.
pub struct InstanceRegistry {
    repository: Arc<dyn InstanceRepository>,
}

impl InstanceRegistry {
    pub fn new(repository: Arc<dyn InstanceRepository>) -> Self {
        Self { repository }
    }

    pub fn by_instance_id(&self, instance_id: &str) -> Option<Instance> {
        self.repository.by_instance_id(instance_id)
    }

    pub fn get(&self, id: &str) -> Result<Instance, ApiError> {
        self.repository
            .by_id(id)
            .ok_or_else(|| ApiError::NotFound(format!("instance {id} not found")))
    }

    pub fn list(&self) -> Vec<Instance> {
        self.repository.list()
    }

    pub fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.repository.delete(id).map_err(|RepositoryError::NotFound(id)| {
            ApiError::NotFound(format!("instance {id} not found"))
        })
    }

    /// §4.6: silently swallows "not found" — a lost registration is the agent's problem to
    /// fix by re-activating, not this call's.
    pub fn apply_heartbeat(&self, instance_id: &str, hb: HeartbeatRequest) {
        self.repository.apply_heartbeat(instance_id, hb);
    }

    /// §4.5 offline sweep. Returns how many instances were flipped, purely for logging.
    pub fn sweep_offline(&self, threshold_secs: u64) -> usize {
        self.repository.sweep_offline(threshold_secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::instance::repository::InMemoryInstanceRepository;

    fn registry() -> InstanceRegistry {
        InstanceRegistry::new(Arc::new(InMemoryInstanceRepository::default()))
    }

    #[test]
    fn test_get_missing_instance_is_not_found() {
        let reg = registry();
        assert_matches!(reg.get("missing"), Err(ApiError::NotFound(_)));
    }

    #[test]
    fn test_delete_missing_instance_is_not_found() {
        let reg = registry();
        assert_matches!(reg.delete("missing"), Err(ApiError::NotFound(_)));
    }
}
