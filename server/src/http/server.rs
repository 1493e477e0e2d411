use std::sync::mpsc;
use std::time::Duration;

use actix_web::{dev::ServerHandle, web, App, HttpServer};
use tokio::runtime::Handle;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::http::handlers::{activation, deployments, health, heartbeat, instances, license, releases};
use crate::http::state::AppState;

const DEFAULT_WORKERS: usize = 4;
/// §5: server-side read/write timeouts and idle-connection reap.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);
/// §5: graceful shutdown drains in-flight requests for at most this long.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs the HTTP surface until `shutdown_rx` fires, then drains in-flight requests under
/// the §5 cap before returning. Mirrors the handle-over-a-channel pattern used to stop a
/// server started on a spawned task from the thread that owns the shutdown signal.
pub async fn run(
    config: ServerConfig,
    state: AppState,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> std::io::Result<()> {
    let (handle_tx, handle_rx) = mpsc::channel::<ServerHandle>();

    info!(host = %config.host, port = config.port, "starting fleet control plane HTTP server");

    let app_data = web::Data::new(state);
    let config_data = web::Data::new(config.clone());
    let bind_addr = (config.host.to_string(), config.port);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_data.clone())
            .app_data(config_data.clone())
            .configure(health::configure)
            .configure(activation::configure)
            .configure(license::configure)
            .configure(instances::configure)
            .configure(heartbeat::configure)
            .configure(releases::configure)
            .configure(deployments::configure)
    })
    .bind(bind_addr)?
    .workers(DEFAULT_WORKERS)
    .client_request_timeout(REQUEST_TIMEOUT)
    .keep_alive(IDLE_TIMEOUT)
    .shutdown_timeout(SHUTDOWN_TIMEOUT.as_secs())
    .run();

    let _ = handle_tx.send(server.handle());

    let rt = Handle::current();
    let server_join = rt.spawn(server);

    let _ = (&mut shutdown_rx).await;
    debug!("shutdown signal received, draining in-flight requests");

    if let Ok(handle) = handle_rx.recv() {
        handle.stop(true).await;
    }

    match server_join.await {
        Ok(result) => result,
        Err(err) => {
            error!(error = %err, "http server task panicked");
            Ok(())
        }
    }
}
