//! Agent Supervisor (C11): restarts crashed products with a bounded, cooling-down
//! restart governor, and the `ServiceController` boundary to the host init system.

pub mod restart_governor;
pub mod systemd;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

pub use restart_governor::{RestartGovernor, RestartOutcome};
pub use systemd::SystemdServiceController;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Active,
    Inactive,
    Failed,
    Unknown,
}

#[derive(Debug, Error)]
pub enum ServiceControllerError {
    #[error("failed to {action} service {service}: {message}")]
    CommandFailed { action: &'static str, service: String, message: String },

    #[error("failed to invoke service manager for {service}: {source}")]
    Spawn {
        service: String,
        #[source]
        source: std::io::Error,
    },
}

/// The host init/supervisor, abstracted per spec.md §1: "the host init/supervisor
/// (abstracted as a ServiceController with start/stop/status/pid/reload)". The only
/// concrete implementation this crate ships is [`SystemdServiceController`].
pub trait ServiceController: Send + Sync {
    fn start(&self, service: &str) -> Result<(), ServiceControllerError>;
    fn stop(&self, service: &str) -> Result<(), ServiceControllerError>;
    fn reload(&self, service: &str) -> Result<(), ServiceControllerError>;
    fn status(&self, service: &str) -> Result<ServiceStatus, ServiceControllerError>;
    fn pid(&self, service: &str) -> Result<Option<u32>, ServiceControllerError>;
}

/// Runs one supervisor tick (§4.8): for every product, query status and restart-govern
/// it. Restart attempt state is keyed by service name and guarded by one mutex, matching
/// §9's "guarded by a mutex" note — there is no per-service lock striping here because
/// the tick itself is sequential, not concurrent, across products.
pub struct Supervisor {
    controller: Box<dyn ServiceController>,
    governor: RestartGovernor,
    state: Mutex<HashMap<String, restart_governor::RestartState>>,
}

impl Supervisor {
    pub fn new(controller: Box<dyn ServiceController>, max_attempts: u32, cooldown: Duration) -> Self {
        Self {
            controller,
            governor: RestartGovernor::new(max_attempts, cooldown),
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Read-only status passthrough for the heartbeat loop (C10), which reports the same
    /// `ServiceStatus` the supervisor (C11) acts on rather than querying the host twice.
    pub fn status(&self, service: &str) -> Result<ServiceStatus, ServiceControllerError> {
        self.controller.status(service)
    }

    pub fn pid(&self, service: &str) -> Result<Option<u32>, ServiceControllerError> {
        self.controller.pid(service)
    }

    /// Evaluates one product. Returns what the governor decided to do, for logging and
    /// tests; never panics on a controller error, since a single product's failure must
    /// not take down the supervisor loop.
    pub fn tick(&self, service: &str, health_probe: Option<&dyn Fn() -> bool>) -> RestartOutcome {
        let status = match self.controller.status(service) {
            Ok(status) => status,
            Err(err) => {
                warn!(service, error = %err, "failed to query service status");
                return RestartOutcome::StatusUnknown;
            }
        };

        let healthy = match status {
            ServiceStatus::Active => health_probe.map(|probe| probe()).unwrap_or(true),
            _ => false,
        };

        let mut state = self.state.lock().unwrap_or_else(|poison| poison.into_inner());
        let entry = state.entry(service.to_string()).or_default();

        if let Some(outcome) = restart_governor::decide(entry, healthy, self.governor.max_attempts, self.governor.cooldown) {
            if matches!(outcome, RestartOutcome::Healthy) && entry.attempts > 0 {
                info!(service, "service healthy again, resetting restart counter");
            }
            if matches!(outcome, RestartOutcome::Healthy) {
                entry.attempts = 0;
                entry.last_attempt = None;
            }
            return outcome;
        }

        entry.attempts += 1;
        entry.last_attempt = Some(Instant::now());
        let attempt = entry.attempts;
        drop(state);

        warn!(service, attempt, max = self.governor.max_attempts, "restarting unhealthy service");
        match self.controller.start(service) {
            Ok(()) => RestartOutcome::Restarted,
            Err(err) => {
                warn!(service, error = %err, "restart attempt failed");
                RestartOutcome::RestartFailed
            }
        }
    }
}
