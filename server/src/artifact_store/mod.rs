pub mod local;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use thiserror::Error;

pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

#[derive(Debug, Error)]
pub enum ArtifactStoreError {
    #[error("artifact {0}/{1}/{2} not found")]
    NotFound(String, String, String),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct PutOutcome {
    pub path: String,
    pub size: u64,
    pub checksum: String,
}

/// §4.1: a flat namespace keyed by `(product, version, filename)`. Writes MUST be atomic
/// (temp+rename, matching the `fs` crate's write idiom) and reads MUST stream rather than
/// buffer the whole artifact.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(
        &self,
        product: &str,
        version: &str,
        filename: &str,
        stream: ByteStream,
    ) -> Result<PutOutcome, ArtifactStoreError>;

    async fn get(
        &self,
        product: &str,
        version: &str,
        filename: &str,
    ) -> Result<ByteStream, ArtifactStoreError>;

    /// Byte length of the stored artifact, for the `Content-Length` header on download
    /// (§6) — looked up independently of any [`crate::release::Release`] row, since a
    /// supplementary per-arch artifact (§4.4) has no row of its own to carry a size.
    async fn size(&self, product: &str, version: &str, filename: &str) -> Result<u64, ArtifactStoreError>;

    fn exists(&self, product: &str, version: &str, filename: &str) -> bool;

    fn delete(&self, product: &str, version: &str, filename: &str) -> Result<(), ArtifactStoreError>;
}
