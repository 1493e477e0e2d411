//! Agent Bootstrap (C8): `fleet-agent init --license-key <key> --server <url>`.
//!
//! Per §7, any failure before `updater/config.yaml` is written is fatal; the process
//! exits non-zero without touching disk beyond `.instance`. Failures after that point are
//! logged, leave partial state behind, and still exit non-zero — re-running `init` is
//! safe because activation itself is idempotent (P1).

use fleet_proto::{ActivationRequest, ProductSpec};
use fs::directory_manager::DirectoryManager;
use fs::file::deleter::FileDeleter;
use fs::file::reader::FileReader;
use fs::file::writer::FileWriter;
use tracing::{info, warn};

use crate::client::FleetClient;
use crate::config::{AgentConfig, Paths, ProductConfig};
use crate::error::BootstrapError;
use crate::instance_file::{self, InstanceCredentials};
use crate::supervisor::ServiceController;
use crate::update::downloader;
use crate::versions;
use crate::LocalFs;

const MACHINE_ID_PATH: &str = "/etc/machine-id";

pub struct BootstrapOptions<'a> {
    pub license_key: &'a str,
    pub server_url: &'a str,
}

/// Runs the whole `init` flow. Returns `Ok(())` only if every product installed and
/// started cleanly; a product-level failure after the config write is logged and rolled
/// into the returned error, but every other product is still attempted.
pub fn init(
    opts: &BootstrapOptions,
    paths: &Paths,
    client: &FleetClient,
    controller: &dyn ServiceController,
    fsops: &impl LocalFs,
) -> Result<(), BootstrapError> {
    let request = ActivationRequest {
        license_key: opts.license_key.to_string(),
        hostname: detect_hostname(),
        machine_id: detect_machine_id(fsops),
    };

    let response = client.activate(&request)?;
    if !response.success {
        return Err(BootstrapError::Refused(
            response.error.unwrap_or_else(|| "activation refused with no reason given".to_string()),
        ));
    }
    let instance = response
        .instance
        .ok_or_else(|| BootstrapError::Refused("activation succeeded without instance data".to_string()))?;
    let install = response
        .install
        .ok_or_else(|| BootstrapError::Refused("activation succeeded without an install manifest".to_string()))?;

    // Fatal boundary: everything above this line happened with nothing persisted.
    instance_file::write(
        fsops,
        fsops,
        &paths.instance_file(),
        &InstanceCredentials { instance_id: instance.id.clone(), api_key: instance.api_key },
    )
    .map_err(|e| BootstrapError::Persist(e.to_string()))?;

    let config = AgentConfig {
        server_url: opts.server_url.to_string(),
        license_key: opts.license_key.to_string(),
        products: install.products.iter().map(product_config).collect(),
        update: Default::default(),
        heartbeat: Default::default(),
        supervisor: Default::default(),
    };
    config.save(fsops, fsops, paths.base()).map_err(|e| BootstrapError::Persist(e.to_string()))?;

    // Non-fatal boundary: every failure from here is logged, not propagated immediately,
    // so one bad product doesn't stop the rest from installing.
    let mut first_error = None;
    for product in &install.products {
        if let Err(err) = install_product(product, paths, client, controller, fsops) {
            warn!(product = product.name, error = %err, "product install failed, will retry on next init");
            first_error.get_or_insert(err);
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn product_config(spec: &ProductSpec) -> ProductConfig {
    ProductConfig { name: spec.name.clone(), channel: spec.channel.clone(), health_endpoint: None }
}

fn install_product(
    spec: &ProductSpec,
    paths: &Paths,
    client: &FleetClient,
    controller: &dyn ServiceController,
    fsops: &impl LocalFs,
) -> Result<(), BootstrapError> {
    let info = client
        .latest_release(&spec.name, &spec.channel, "")
        .map_err(|source| BootstrapError::Install { product: spec.name.clone(), source })?;

    info!(product = spec.name, version = info.latest_version, "installing");

    fsops.create(&paths.temp_dir()).map_err(|e| BootstrapError::Persist(e.to_string()))?;
    let temp_path = paths.temp_file(&spec.name, &info.latest_version);
    downloader::download(client, &info.download_url, &temp_path)
        .map_err(|e| BootstrapError::Persist(e.to_string()))?;
    downloader::verify_checksum(&temp_path, &info.checksum, &spec.name, &info.latest_version)
        .map_err(|e| BootstrapError::Persist(e.to_string()))?;

    fsops.create(&paths.bin_dir()).map_err(|e| BootstrapError::Persist(e.to_string()))?;
    let bytes = std::fs::read(&temp_path).map_err(|e| BootstrapError::Persist(e.to_string()))?;
    fsops
        .write_executable(&paths.product_binary(&spec.name), &bytes)
        .map_err(|e| BootstrapError::Persist(e.to_string()))?;
    let _ = fsops.delete(&temp_path);

    fsops.create(&paths.versions_dir()).map_err(|e| BootstrapError::Persist(e.to_string()))?;
    versions::commit(fsops, fsops, &paths.version_file(&spec.name), &info.latest_version)
        .map_err(|e| BootstrapError::Persist(e.to_string()))?;

    controller.start(&spec.name)?;
    Ok(())
}

#[cfg(target_family = "unix")]
fn detect_hostname() -> String {
    nix::unistd::gethostname()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(not(target_family = "unix"))]
fn detect_hostname() -> String {
    String::new()
}

/// `/etc/machine-id` is the one stable per-host identifier every systemd Linux host
/// carries. Absence (containers without an init system, non-Linux) degrades to an empty
/// string rather than failing activation — `ActivationRequest::machine_id` is optional.
fn detect_machine_id(fsops: &impl LocalFs) -> String {
    fsops
        .read(std::path::Path::new(MACHINE_ID_PATH))
        .map(|contents| contents.trim().to_string())
        .unwrap_or_default()
}
