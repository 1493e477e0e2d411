use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use fleet_server::activation::service::ActivationService;
use fleet_server::artifact_store::local::LocalArtifactStore;
use fleet_server::config::ServerConfig;
use fleet_server::deployment::repository::InMemoryDeploymentRepository;
use fleet_server::heartbeat::service::HeartbeatService;
use fleet_server::http::server;
use fleet_server::http::state::AppState;
use fleet_server::instance::registry::InstanceRegistry;
use fleet_server::instance::repository::InMemoryInstanceRepository;
use fleet_server::license::repository::InMemoryLicenseRepository;
use fleet_server::license::service::LicenseService;
use fleet_server::release::catalog::ReleaseCatalog;
use fleet_server::release::repository::InMemoryReleaseRepository;
use tracing::{error, info};

/// Fleet update and license control plane.
#[derive(Parser, Debug)]
#[command(name = "fleet-server", about = "Fleet update and license control plane")]
struct Cli {
    /// Override SERVER_PORT for this run.
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = match ServerConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error loading configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(port) = cli.port {
        config.port = port;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("Error starting async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => {
            info!("fleet-server exited successfully");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "fleet-server exited with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ServerConfig) -> std::io::Result<()> {
    let config = Arc::new(config);

    let license_repository = Arc::new(InMemoryLicenseRepository::default());
    let licenses = Arc::new(LicenseService::new(license_repository.clone()));
    let instance_repository = Arc::new(InMemoryInstanceRepository::default());
    let instances = Arc::new(InstanceRegistry::new(instance_repository.clone()));
    let artifacts: Arc<dyn fleet_server::artifact_store::ArtifactStore> =
        Arc::new(LocalArtifactStore::new(config.storage.local_path.as_str()));
    let release_repository = Arc::new(InMemoryReleaseRepository::default());
    let releases = Arc::new(ReleaseCatalog::new(release_repository, artifacts.clone()));
    let activation = Arc::new(ActivationService::new(license_repository, instance_repository));
    let heartbeat = Arc::new(HeartbeatService::new(instances.clone(), releases.clone()));
    let deployments: Arc<dyn fleet_server::deployment::repository::DeploymentRepository> =
        Arc::new(InMemoryDeploymentRepository::default());

    let state = AppState {
        config: config.clone(),
        licenses,
        instances: instances.clone(),
        releases,
        artifacts,
        activation,
        heartbeat,
        deployments,
    };

    spawn_offline_sweep(instances, config.offline_threshold_secs);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    install_shutdown_signal_handler(shutdown_tx);

    server::run((*config).clone(), state, shutdown_rx).await
}

/// §4.5: periodically flips instances whose last heartbeat is older than the configured
/// threshold to `offline`. Runs for the lifetime of the process.
fn spawn_offline_sweep(instances: Arc<InstanceRegistry>, threshold_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        loop {
            interval.tick().await;
            let swept = instances.sweep_offline(threshold_secs);
            if swept > 0 {
                info!(count = swept, "swept stale instances to offline");
            }
        }
    });
}

/// §5: Ctrl-C triggers the same graceful, bounded drain as any other stop signal.
fn install_shutdown_signal_handler(shutdown_tx: tokio::sync::oneshot::Sender<()>) {
    let shutdown_tx = Arc::new(Mutex::new(Some(shutdown_tx)));
    let result = ctrlc::set_handler(move || {
        info!("received shutdown signal, draining in-flight requests");
        if let Some(tx) = shutdown_tx.lock().unwrap().take() {
            let _ = tx.send(());
        }
    });
    if let Err(err) = result {
        error!(error = %err, "could not install signal handler");
    }
}
