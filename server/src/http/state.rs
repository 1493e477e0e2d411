use std::sync::Arc;

use crate::activation::service::ActivationService;
use crate::artifact_store::ArtifactStore;
use crate::config::ServerConfig;
use crate::deployment::repository::DeploymentRepository;
use crate::heartbeat::service::HeartbeatService;
use crate::instance::registry::InstanceRegistry;
use crate::license::service::LicenseService;
use crate::release::catalog::ReleaseCatalog;

/// Everything a handler needs, assembled once at boot and shared read-only across the
/// worker pool (§5: "the process itself holds no session state beyond ... shared handles,
/// both safe for concurrent use").
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub licenses: Arc<LicenseService>,
    pub instances: Arc<InstanceRegistry>,
    pub releases: Arc<ReleaseCatalog>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub activation: Arc<ActivationService>,
    pub heartbeat: Arc<HeartbeatService>,
    pub deployments: Arc<dyn DeploymentRepository>,
}
