use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError};
use fleet_agent::bootstrap::{self, BootstrapOptions};
use fleet_agent::cli::{Cli, Commands};
use fleet_agent::config::{AgentConfig, Paths};
use fleet_agent::supervisor::{ServiceController, SystemdServiceController, Supervisor};
use fleet_agent::{client::FleetClient, heartbeat, instance_file, rollback, update};
use fs::file::LocalFile;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let paths = Paths::new(cli.base.clone());

    let result = match cli.command {
        Commands::Init { license_key, server } => run_init(&license_key, &server, &paths),
        Commands::Run => run_loops(&paths),
        Commands::Update => run_update_once(&paths),
        Commands::Rollback { product } => run_rollback(&product, &paths),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "fleet-agent exited with an error");
            ExitCode::FAILURE
        }
    }
}

fn run_init(license_key: &str, server: &str, paths: &Paths) -> Result<(), Box<dyn std::error::Error>> {
    let client = FleetClient::new(server);
    let controller = SystemdServiceController;
    let opts = BootstrapOptions { license_key, server_url: server };
    bootstrap::init(&opts, paths, &client, &controller, &LocalFile)?;
    info!("agent initialized");
    Ok(())
}

fn run_rollback(product: &str, paths: &Paths) -> Result<(), Box<dyn std::error::Error>> {
    let controller = SystemdServiceController;
    let version = rollback::rollback(product, paths, &controller, &LocalFile)?;
    info!(product, version, "rolled back");
    Ok(())
}

fn run_update_once(paths: &Paths) -> Result<(), Box<dyn std::error::Error>> {
    let config = AgentConfig::load(paths.base())?;
    let instance = instance_file::read(&LocalFile, &paths.instance_file())?;
    let client = FleetClient::new(&config.server_url);
    let controller = SystemdServiceController;

    for product in &config.products {
        match update::check_and_apply(&instance.instance_id, product, &config.update, paths, &client, &controller, &LocalFile) {
            Ok(update::UpdateOutcome::Skipped(reason)) => info!(product = product.name, reason, "update check: nothing to do"),
            Ok(update::UpdateOutcome::Applied(deployment)) => {
                info!(product = product.name, status = ?deployment.status, "update applied");
                report_deployment(&client, &deployment);
            }
            Err(err) => warn!(product = product.name, error = %err, "update check failed"),
        }
    }
    Ok(())
}

/// Best-effort; a server that's unreachable must never block or fail the update itself.
fn report_deployment(client: &FleetClient, deployment: &fleet_proto::Deployment) {
    if let Err(err) = client.report_deployment(deployment) {
        warn!(deployment_id = deployment.id, error = %err, "failed to report deployment to control plane");
    }
}

fn run_loops(paths: &Paths) -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(AgentConfig::load(paths.base())?);
    let instance = instance_file::read(&LocalFile, &paths.instance_file())?;
    let instance_id = Arc::new(instance.instance_id);
    let client = Arc::new(FleetClient::new(&config.server_url));
    let supervisor = Arc::new(Supervisor::new(
        Box::new(SystemdServiceController),
        config.supervisor.max_restart_attempts,
        config.supervisor.restart_cooldown,
    ));
    let paths = Arc::new(paths.clone());

    let (stop_tx, stop_rx) = bounded::<()>(0);
    let stop_tx = Arc::new(Mutex::new(Some(stop_tx)));
    install_shutdown_signal_handler(stop_tx);

    let heartbeat_handle = {
        let config = config.clone();
        let instance_id = instance_id.clone();
        let client = client.clone();
        let supervisor = supervisor.clone();
        let paths = paths.clone();
        let stop_rx = stop_rx.clone();
        std::thread::spawn(move || heartbeat_loop(&config, &instance_id, &paths, &client, &supervisor, stop_rx))
    };

    let update_handle = {
        let config = config.clone();
        let instance_id = instance_id.clone();
        let client = client.clone();
        let paths = paths.clone();
        let stop_rx = stop_rx.clone();
        std::thread::spawn(move || update_loop(&config, &instance_id, &paths, &client, stop_rx))
    };

    let supervisor_handle = {
        let config = config.clone();
        let supervisor = supervisor.clone();
        let client = client.clone();
        std::thread::spawn(move || supervisor_loop(&config, &supervisor, &client, stop_rx))
    };

    drop(client);
    drop(supervisor);

    for handle in [heartbeat_handle, update_handle, supervisor_handle] {
        if handle.join().is_err() {
            warn!("a loop thread panicked");
        }
    }
    Ok(())
}

/// Each loop selects on its own tick interval and the shared stop channel (§5's "agent
/// side"): the channel is never sent on, only closed (all `Sender` clones dropped) by the
/// signal handler, so `recv_timeout` returning `Disconnected` is the shutdown signal.
fn wait_or_stop(stop_rx: &Receiver<()>, interval: Duration) -> bool {
    match stop_rx.recv_timeout(interval) {
        Err(RecvTimeoutError::Timeout) => true,
        Err(RecvTimeoutError::Disconnected) => false,
        Ok(()) => false,
    }
}

fn heartbeat_loop(
    config: &AgentConfig,
    instance_id: &str,
    paths: &Paths,
    client: &FleetClient,
    supervisor: &Supervisor,
    stop_rx: Receiver<()>,
) {
    while wait_or_stop(&stop_rx, config.heartbeat.interval) {
        let request = heartbeat::collect(config, instance_id, paths, client, supervisor, &LocalFile);
        match heartbeat::send(client, &request) {
            Ok(response) if !response.updates.is_empty() => {
                info!(count = response.updates.len(), "server reports updates available");
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "heartbeat failed"),
        }
    }
    info!("heartbeat loop stopped");
}

fn update_loop(config: &AgentConfig, instance_id: &str, paths: &Paths, client: &FleetClient, stop_rx: Receiver<()>) {
    let controller = SystemdServiceController;
    while wait_or_stop(&stop_rx, config.update.interval) {
        for product in &config.products {
            match update::check_and_apply(instance_id, product, &config.update, paths, client, &controller, &LocalFile) {
                Ok(update::UpdateOutcome::Skipped(_)) => {}
                Ok(update::UpdateOutcome::Applied(deployment)) => {
                    info!(product = product.name, status = ?deployment.status, "update applied");
                    report_deployment(client, &deployment);
                }
                Err(err) => warn!(product = product.name, error = %err, "update check failed"),
            }
        }
    }
    info!("update loop stopped");
}

fn supervisor_loop(config: &AgentConfig, supervisor: &Supervisor, client: &FleetClient, stop_rx: Receiver<()>) {
    while wait_or_stop(&stop_rx, config.supervisor.interval) {
        for product in &config.products {
            let probe: Option<Box<dyn Fn() -> bool>> = product.health_endpoint.as_ref().map(|url| {
                let url = url.clone();
                Box::new(move || client.probe_health(&url)) as Box<dyn Fn() -> bool>
            });
            let outcome = supervisor.tick(&product.name, probe.as_deref());
            tracing::debug!(product = product.name, outcome = ?outcome, "supervisor tick");
        }
    }
    info!("supervisor loop stopped");
}

fn install_shutdown_signal_handler(stop_tx: Arc<Mutex<Option<crossbeam::channel::Sender<()>>>>) {
    let result = ctrlc::set_handler(move || {
        info!("received shutdown signal, stopping loops");
        if let Some(tx) = stop_tx.lock().unwrap().take() {
            drop(tx);
        }
    });
    if let Err(err) = result {
        error!(error = %err, "could not install signal handler");
    }
}
