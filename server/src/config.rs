use serde::Deserialize;
use std::fmt::{Display, Formatter};
use thiserror::Error;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_JWT_ISSUER: &str = "fleet-control";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ADMIN_API_KEY must be set and non-empty")]
    MissingAdminKey,
    #[error("JWT_SECRET must be set and non-empty")]
    MissingJwtSecret,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Host(pub String);

impl Default for Host {
    fn default() -> Self {
        Host(DEFAULT_HOST.to_string())
    }
}

impl Display for Host {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DbConfig {
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default = "default_db_name")]
    pub name: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
}

fn default_db_host() -> String {
    "localhost".to_string()
}
fn default_db_port() -> u16 {
    DEFAULT_DB_PORT
}
fn default_db_name() -> String {
    "fleet".to_string()
}
fn default_ssl_mode() -> String {
    "prefer".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_type")]
    pub storage_type: String,
    #[serde(default = "default_storage_local_path")]
    pub local_path: String,
}

fn default_storage_type() -> String {
    "local".to_string()
}
fn default_storage_local_path() -> String {
    "/var/lib/fleet-server/artifacts".to_string()
}

/// Server-wide configuration, assembled from `config.yaml` overlaid with the environment
/// variables of §6 (`SERVER_*`, `DB_*`, `STORAGE_*`, `ADMIN_API_KEY`, `JWT_*`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub host: Host,
    #[serde(default = "default_port")]
    pub port: u16,
    pub admin_api_key: String,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub jwt_secret: String,
    #[serde(default = "default_jwt_issuer")]
    pub jwt_issuer: String,
    /// Instances idle this long (without a heartbeat) are swept to `offline`.
    /// Defaults to 3x the agent's default heartbeat interval, per §4.5.
    #[serde(default = "default_offline_threshold_secs")]
    pub offline_threshold_secs: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_jwt_issuer() -> String {
    DEFAULT_JWT_ISSUER.to_string()
}
fn default_offline_threshold_secs() -> u64 {
    180
}

impl ServerConfig {
    /// Loads configuration from the environment variables of §6. There is no config
    /// file layer on the server side: every setting here is either operational (host,
    /// port, storage path) or a secret (admin key, JWT secret), and both map cleanly
    /// onto env vars in a container deployment.
    pub fn load() -> Result<Self, ConfigError> {
        let admin_api_key = std::env::var("ADMIN_API_KEY").unwrap_or_default();
        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_default();
        let jwt_issuer =
            std::env::var("JWT_ISSUER").unwrap_or_else(|_| DEFAULT_JWT_ISSUER.to_string());

        if admin_api_key.is_empty() {
            return Err(ConfigError::MissingAdminKey);
        }
        if jwt_secret.is_empty() {
            return Err(ConfigError::MissingJwtSecret);
        }

        let host = Host(std::env::var("SERVER_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()));
        let port = std::env::var("SERVER_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let db = DbConfig {
            host: std::env::var("DB_HOST").unwrap_or_else(|_| default_db_host()),
            port: std::env::var("DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_DB_PORT),
            name: std::env::var("DB_NAME").unwrap_or_else(|_| default_db_name()),
            user: std::env::var("DB_USER").unwrap_or_default(),
            password: std::env::var("DB_PASSWORD").unwrap_or_default(),
            ssl_mode: std::env::var("DB_SSL_MODE").unwrap_or_else(|_| default_ssl_mode()),
        };

        let storage = StorageConfig {
            storage_type: std::env::var("STORAGE_TYPE").unwrap_or_else(|_| default_storage_type()),
            local_path: std::env::var("STORAGE_LOCAL_PATH")
                .unwrap_or_else(|_| default_storage_local_path()),
        };

        Ok(ServerConfig {
            host,
            port,
            admin_api_key,
            db,
            storage,
            jwt_secret,
            jwt_issuer,
            offline_threshold_secs: default_offline_threshold_secs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_default() {
        assert_eq!(Host::default(), Host(DEFAULT_HOST.to_string()));
    }

    #[test]
    fn test_db_config_defaults() {
        let yaml = "";
        let cfg: DbConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.host, "localhost");
        assert_eq!(cfg.port, DEFAULT_DB_PORT);
        assert_eq!(cfg.ssl_mode, "prefer");
    }
}
