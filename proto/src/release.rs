use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Stable,
    Beta,
    Nightly,
    Alpha,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Stable => "stable",
            Channel::Beta => "beta",
            Channel::Nightly => "nightly",
            Channel::Alpha => "alpha",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown channel: {0}")]
pub struct ParseChannelError(String);

impl std::str::FromStr for Channel {
    type Err = ParseChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stable" => Ok(Channel::Stable),
            "beta" => Ok(Channel::Beta),
            "nightly" => Ok(Channel::Nightly),
            "alpha" => Ok(Channel::Alpha),
            other => Err(ParseChannelError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub name: String,
    pub size: u64,
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseManifest {
    pub product: String,
    pub version: String,
    pub channel: Channel,
    pub artifacts: Vec<ArtifactRef>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub changelog: Option<String>,
}

/// A cataloged, already-uploaded release. `checksum` is always server-computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub id: String,
    pub product_name: String,
    pub version: String,
    pub channel: Channel,
    pub manifest: ReleaseManifest,
    pub artifact_path: String,
    pub artifact_size: u64,
    pub checksum: String,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub release_notes: Option<String>,
    #[serde(default)]
    pub min_updater_version: Option<String>,
    pub released_at: DateTime<Utc>,
}

/// What `/heartbeat` and `/releases/{product}/latest` return: a verdict, not the full row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseInfo {
    pub latest_version: String,
    pub update_available: bool,
    pub download_url: String,
    pub checksum: String,
    pub size: u64,
    pub released_at: DateTime<Utc>,
}
