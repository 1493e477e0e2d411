//! Blocking HTTP client for the control-plane wire surface described in `fleet-proto`.
//!
//! One `reqwest::blocking::Client` is shared by every loop; each call sets its own
//! timeout rather than relying on a single client-wide default, since activation and
//! download have very different patience budgets (§5).

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use fleet_proto::{
    ActivationRequest, ActivationResponse, Deployment, HeartbeatRequest, HeartbeatResponse,
    ReleaseInfo, ValidateLicenseRequest, ValidateLicenseResponse,
};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use thiserror::Error;

const ACTIVATE_TIMEOUT: Duration = Duration::from_secs(5);
const VALIDATE_TIMEOUT: Duration = Duration::from_secs(5);
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(5);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const REPORT_DEPLOYMENT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("failed to write downloaded artifact to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no release found for product {0}")]
    NoRelease(String),
}

/// Thin wrapper over the control-plane API, one method per §6 endpoint the agent calls.
pub struct FleetClient {
    http: Client,
    base_url: String,
}

impl FleetClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn activate(&self, req: &ActivationRequest) -> Result<ActivationResponse, ClientError> {
        let url = self.url("/api/v1/license/activate");
        let response = self
            .http
            .post(&url)
            .timeout(ACTIVATE_TIMEOUT)
            .json(req)
            .send()
            .map_err(|source| ClientError::Transport { url: url.clone(), source })?;
        Self::parse_json(&url, response)
    }

    pub fn validate_license(&self, license_key: &str) -> Result<ValidateLicenseResponse, ClientError> {
        let url = self.url("/api/v1/license/validate");
        let response = self
            .http
            .post(&url)
            .timeout(VALIDATE_TIMEOUT)
            .json(&ValidateLicenseRequest { license_key: license_key.to_string() })
            .send()
            .map_err(|source| ClientError::Transport { url: url.clone(), source })?;
        Self::parse_json(&url, response)
    }

    pub fn heartbeat(&self, req: &HeartbeatRequest) -> Result<HeartbeatResponse, ClientError> {
        let url = self.url("/api/v1/heartbeat");
        let response = self
            .http
            .post(&url)
            .timeout(HEARTBEAT_TIMEOUT)
            .json(req)
            .send()
            .map_err(|source| ClientError::Transport { url: url.clone(), source })?;
        Self::parse_json(&url, response)
    }

    /// `current_version` empty means "never installed" — the server always offers an
    /// update in that case.
    pub fn latest_release(
        &self,
        product: &str,
        channel: &str,
        current_version: &str,
    ) -> Result<ReleaseInfo, ClientError> {
        let url = self.url(&format!("/api/v1/releases/{product}/latest"));
        let response = self
            .http
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .query(&[("channel", channel), ("current_version", current_version)])
            .send()
            .map_err(|source| ClientError::Transport { url: url.clone(), source })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NoRelease(product.to_string()));
        }
        Self::parse_json(&url, response)
    }

    /// Streams the artifact at `download_url` (relative to the control plane's base URL
    /// unless it is already absolute) to `dest`, returning the number of bytes written.
    /// Does not verify a checksum itself — see [`crate::update`] for that step.
    pub fn download_to(&self, download_url: &str, dest: &Path) -> Result<u64, ClientError> {
        let url = if download_url.starts_with("http://") || download_url.starts_with("https://") {
            download_url.to_string()
        } else {
            self.url(download_url)
        };

        let mut response = self
            .http
            .get(&url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .map_err(|source| ClientError::Transport { url: url.clone(), source })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(ClientError::Status { url, status, body });
        }

        let mut file = std::fs::File::create(dest)
            .map_err(|source| ClientError::Write { path: dest.display().to_string(), source })?;
        let written = response
            .copy_to(&mut file)
            .map_err(|source| ClientError::Transport { url: url.clone(), source })?;
        file.flush()
            .map_err(|source| ClientError::Write { path: dest.display().to_string(), source })?;
        Ok(written)
    }

    /// Best-effort GET against a per-product health endpoint for the heartbeat loop
    /// (§4.8). Any failure — transport, timeout, non-2xx — is reported as unhealthy
    /// rather than propagated, since a single product's probe must never block or fail
    /// the whole heartbeat.
    pub fn probe_health(&self, url: &str) -> bool {
        self.http
            .get(url)
            .timeout(HEALTH_PROBE_TIMEOUT)
            .send()
            .map(|response| response.status().is_success())
            .unwrap_or(false)
    }

    /// Reports one step of an update attempt's progress (§3's Deployment history) to the
    /// control plane. Fire-and-forget like [`Self::heartbeat`]'s own telemetry — a caller
    /// that can't reach the server logs the failure and moves on rather than blocking the
    /// update itself on it.
    pub fn report_deployment(&self, deployment: &Deployment) -> Result<(), ClientError> {
        let url = self.url("/api/v1/deployments");
        let response = self
            .http
            .post(&url)
            .timeout(REPORT_DEPLOYMENT_TIMEOUT)
            .json(deployment)
            .send()
            .map_err(|source| ClientError::Transport { url: url.clone(), source })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(ClientError::Status { url, status, body });
        }
        Ok(())
    }

    fn parse_json<T: serde::de::DeserializeOwned>(
        url: &str,
        response: reqwest::blocking::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ClientError::Status { url: url.to_string(), status, body });
        }
        response
            .json()
            .map_err(|source| ClientError::Transport { url: url.to_string(), source })
    }
}
