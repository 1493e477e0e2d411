use std::path::{Path, PathBuf};
use std::time::Duration;

use duration_str::deserialize_duration;
use fs::directory_manager::DirectoryManager;
use fs::file::writer::FileWriter;
use serde::Deserialize;

const DEFAULT_CHANNEL: &str = "stable";
const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(5 * 60);
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_SUPERVISOR_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_RESTART_COOLDOWN: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RESTART_ATTEMPTS: u32 = 5;

/// One managed product entry from `updater/config.yaml`. `health_endpoint`, if set, is
/// polled by the supervisor (§4.8); its absence means restart decisions rely on service
/// status alone.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProductConfig {
    pub name: String,
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default)]
    pub health_endpoint: Option<String>,
}

fn default_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}

/// Wall-clock window during which the update loop may apply a swap. `start > end` means
/// the window crosses midnight (§4.7 step 3).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MaintenanceWindowConfig {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateConfig {
    #[serde(default = "default_update_interval", deserialize_with = "deserialize_duration")]
    pub interval: Duration,
    #[serde(default)]
    pub maintenance_window: Option<MaintenanceWindowConfig>,
    /// Verify the downloaded artifact's SHA-256 against the catalog checksum before
    /// swapping. Recommended, optional per spec.
    #[serde(default = "default_true")]
    pub verify_checksum: bool,
}

fn default_update_interval() -> Duration {
    DEFAULT_UPDATE_INTERVAL
}

fn default_true() -> bool {
    true
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_UPDATE_INTERVAL,
            maintenance_window: None,
            verify_checksum: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_heartbeat_interval", deserialize_with = "deserialize_duration")]
    pub interval: Duration,
}

fn default_heartbeat_interval() -> Duration {
    DEFAULT_HEARTBEAT_INTERVAL
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self { interval: DEFAULT_HEARTBEAT_INTERVAL }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_supervisor_interval", deserialize_with = "deserialize_duration")]
    pub interval: Duration,
    #[serde(default = "default_max_restart_attempts")]
    pub max_restart_attempts: u32,
    #[serde(default = "default_restart_cooldown", deserialize_with = "deserialize_duration")]
    pub restart_cooldown: Duration,
}

fn default_supervisor_interval() -> Duration {
    DEFAULT_SUPERVISOR_INTERVAL
}
fn default_max_restart_attempts() -> u32 {
    DEFAULT_MAX_RESTART_ATTEMPTS
}
fn default_restart_cooldown() -> Duration {
    DEFAULT_RESTART_COOLDOWN
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SUPERVISOR_INTERVAL,
            max_restart_attempts: DEFAULT_MAX_RESTART_ATTEMPTS,
            restart_cooldown: DEFAULT_RESTART_COOLDOWN,
        }
    }
}

/// `updater/config.yaml`, overlaid with `FLEET_*` environment variables (§1's expanded
/// ambient-config section). Unlike the server, which is env-var only, the agent is meant
/// to run unattended on a host and ship with a file an installer can template.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentConfig {
    pub server_url: String,
    /// Needed before the first activation request (§4.3), so unlike the instance
    /// credentials the server issues, this one is operator-supplied config, not
    /// server-issued state — it has no place in `.instance`.
    pub license_key: String,
    #[serde(default)]
    pub products: Vec<ProductConfig>,
    #[serde(default)]
    pub update: UpdateConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

impl AgentConfig {
    /// Loads `<base>/updater/config.yaml` and overlays `FLEET_SERVER_URL`, if set. Missing
    /// file is an error: unlike the server, the agent has nothing sane to default
    /// `server_url` to.
    pub fn load(base: &Path) -> Result<Self, ConfigError> {
        let path = Paths::new(base).config_file();
        let contents = std::fs::read_to_string(&path)
            .map_err(|source| ConfigError::Read { path: path.clone(), source })?;
        let mut config: AgentConfig = serde_yaml::from_str(&contents)
            .map_err(|source| ConfigError::Parse { path, source })?;

        if let Ok(url) = std::env::var("FLEET_SERVER_URL") {
            if !url.is_empty() {
                config.server_url = url;
            }
        }

        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|source| ConfigError::Serialize(source))
    }

    /// Writes `<base>/updater/config.yaml`, creating the `updater/` directory if needed.
    /// Used once, by `init` (§4.7/C8), to persist the config the operator's CLI flags and
    /// the activation response's `InstallManifest` together produce.
    pub fn save(&self, writer: &impl FileWriter, dirs: &impl DirectoryManager, base: &Path) -> Result<(), ConfigError> {
        let path = Paths::new(base).config_file();
        if let Some(parent) = path.parent() {
            dirs.create(parent).map_err(|source| ConfigError::Read { path: parent.to_path_buf(), source })?;
        }
        let yaml = self.to_yaml()?;
        writer.write(&path, yaml).map_err(|source| ConfigError::Write { path, source })?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: fs::file::writer::WriteError,
    },
}

/// Resolves every well-known path under `<base>/` from the layout in §6:
/// `bin/`, `etc/`, `updater/{config.yaml,.instance,versions,backups,temp}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    base: PathBuf,
}

impl Paths {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.base.join("bin")
    }

    pub fn product_binary(&self, product: &str) -> PathBuf {
        self.bin_dir().join(product)
    }

    pub fn etc_dir(&self) -> PathBuf {
        self.base.join("etc")
    }

    pub fn product_config(&self, product: &str) -> PathBuf {
        self.etc_dir().join(format!("{product}.yaml"))
    }

    pub fn updater_dir(&self) -> PathBuf {
        self.base.join("updater")
    }

    pub fn config_file(&self) -> PathBuf {
        self.updater_dir().join("config.yaml")
    }

    pub fn instance_file(&self) -> PathBuf {
        self.updater_dir().join(".instance")
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.updater_dir().join("versions")
    }

    pub fn version_file(&self, product: &str) -> PathBuf {
        self.versions_dir().join(format!("{product}.version"))
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.updater_dir().join("backups")
    }

    pub fn backup_file(&self, product: &str, version: &str) -> PathBuf {
        self.backups_dir().join(format!("{product}.{version}.bak"))
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.updater_dir().join("temp")
    }

    pub fn temp_file(&self, product: &str, version: &str) -> PathBuf {
        self.temp_dir().join(format!("{product}-{version}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_layout_matches_persisted_state_layout() {
        let paths = Paths::new("/opt/siemcore");
        assert_eq!(paths.product_binary("siemcore-api"), PathBuf::from("/opt/siemcore/bin/siemcore-api"));
        assert_eq!(paths.instance_file(), PathBuf::from("/opt/siemcore/updater/.instance"));
        assert_eq!(
            paths.version_file("siemcore-api"),
            PathBuf::from("/opt/siemcore/updater/versions/siemcore-api.version")
        );
        assert_eq!(
            paths.backup_file("siemcore-api", "v1.4.9"),
            PathBuf::from("/opt/siemcore/updater/backups/siemcore-api.v1.4.9.bak")
        );
        assert_eq!(
            paths.temp_file("siemcore-api", "v1.5.0"),
            PathBuf::from("/opt/siemcore/updater/temp/siemcore-api-v1.5.0")
        );
    }

    #[test]
    fn test_update_config_defaults() {
        let cfg: UpdateConfig = serde_yaml::from_str("").unwrap();
        assert_eq!(cfg.interval, DEFAULT_UPDATE_INTERVAL);
        assert!(cfg.verify_checksum);
        assert!(cfg.maintenance_window.is_none());
    }

    #[test]
    fn test_agent_config_parses_minimal_yaml() {
        let yaml = "server_url: https://fleet.example.com\nlicense_key: SIEM-DEAD-BEEF-0000-0001\n";
        let cfg: AgentConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.server_url, "https://fleet.example.com");
        assert!(cfg.products.is_empty());
        assert_eq!(cfg.heartbeat.interval, DEFAULT_HEARTBEAT_INTERVAL);
    }

    #[test]
    fn test_agent_config_parses_products_and_window() {
        let yaml = r#"
server_url: https://fleet.example.com
license_key: SIEM-DEAD-BEEF-0000-0001
products:
  - name: siemcore-api
    channel: stable
    health_endpoint: "http://127.0.0.1:9000/health"
update:
  interval: 2m
  maintenance_window:
    start: "01:00"
    end: "03:00"
"#;
        let cfg: AgentConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.products.len(), 1);
        assert_eq!(cfg.products[0].name, "siemcore-api");
        assert_eq!(cfg.update.interval, Duration::from_secs(120));
        let window = cfg.update.maintenance_window.unwrap();
        assert_eq!(window.start, "01:00");
        assert_eq!(window.end, "03:00");
    }
}
