use std::sync::Arc;

use dashmap::DashMap;
use fleet_proto::Deployment;

/// Append-only from the agent's perspective (§3): rows are inserted and updated in place by
/// `id` as a deployment attempt progresses through its state machine, never deleted —
/// deleting a [`fleet_proto::Release`] cascades-orphans these rows instead of removing them.
#[cfg_attr(test, mockall::automock)]
pub trait DeploymentRepository: Send + Sync {
    fn insert(&self, deployment: Deployment);
    fn update(&self, deployment: Deployment);
    fn list_for_instance(&self, instance_id: &str) -> Vec<Deployment>;
}

#[derive(Default, Clone)]
pub struct InMemoryDeploymentRepository {
    by_id: Arc<DashMap<String, Deployment>>,
}

impl DeploymentRepository for InMemoryDeploymentRepository {
    fn insert(&self, deployment: Deployment) {
        self.by_id.insert(deployment.id.clone(), deployment);
    }

    fn update(&self, deployment: Deployment) {
        self.by_id.insert(deployment.id.clone(), deployment);
    }

    fn list_for_instance(&self, instance_id: &str) -> Vec<Deployment> {
        self.by_id
            .iter()
            .filter(|e| e.value().instance_id == instance_id)
            .map(|e| e.value().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fleet_proto::DeploymentStatus;

    fn deployment(id: &str, instance_id: &str, status: DeploymentStatus) -> Deployment {
        Deployment {
            id: id.to_string(),
            instance_id: instance_id.to_string(),
            release_id: "rel-1".to_string(),
            status,
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
            previous_version: Some("v1".to_string()),
        }
    }

    #[test]
    fn test_insert_then_update_keeps_single_row() {
        let repo = InMemoryDeploymentRepository::default();
        repo.insert(deployment("dep-1", "inst-1", DeploymentStatus::Pending));
        repo.update(deployment("dep-1", "inst-1", DeploymentStatus::Success));

        let rows = repo.list_for_instance("inst-1");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, DeploymentStatus::Success);
    }
}
