use thiserror::Error;

/// §7: any failure before the config file is written during `init` is fatal; this enum
/// covers that whole path.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("activation request failed: {0}")]
    Activation(#[from] crate::client::ClientError),

    #[error("activation was refused by the server: {0}")]
    Refused(String),

    #[error("failed to persist agent state: {0}")]
    Persist(String),

    #[error("failed to install product {product}: {source}")]
    Install {
        product: String,
        #[source]
        source: crate::client::ClientError,
    },

    #[error("service controller error: {0}")]
    Service(#[from] crate::supervisor::ServiceControllerError),
}

/// Per-loop errors for the update checker (C9). Loop drivers log-and-continue on these;
/// none of them are fatal to the process (§7).
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("server request failed: {0}")]
    Client(#[from] crate::client::ClientError),

    #[error("download failed: {0}")]
    Download(String),

    #[error("checksum mismatch for {product} {version}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        product: String,
        version: String,
        expected: String,
        actual: String,
    },

    #[error("filesystem error: {0}")]
    Fs(String),

    #[error("service controller error: {0}")]
    Service(#[from] crate::supervisor::ServiceControllerError),

    #[error("no backup available to roll back to for {0}")]
    NoBackupAvailable(String),
}

/// Per-tick errors for the supervisor loop (C11).
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("service controller error: {0}")]
    Service(#[from] crate::supervisor::ServiceControllerError),
}
