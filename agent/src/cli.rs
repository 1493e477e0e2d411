//! `fleet-agent` command line: `init`, `run`, `update`, `rollback <product>` (§4.7/C8).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

const DEFAULT_BASE: &str = "/opt/fleet-agent";

#[derive(Parser, Debug)]
#[command(name = "fleet-agent", about = "On-host fleet update agent")]
pub struct Cli {
    /// Root of the persisted layout (`bin/`, `etc/`, `updater/`). Defaults to
    /// `/opt/fleet-agent`; override for local testing or a non-standard install prefix.
    #[arg(long, global = true, default_value = DEFAULT_BASE)]
    pub base: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Activates against the control plane and installs every product the license entitles.
    Init {
        #[arg(long = "license-key")]
        license_key: String,
        #[arg(long)]
        server: String,
    },
    /// Runs the heartbeat, update-check, and supervisor loops in the foreground.
    Run,
    /// Runs one update check for every configured product and exits.
    Update,
    /// Restores the most recent backup for a product and restarts it.
    Rollback {
        product: String,
    },
}
