//! Payment proof storage: write-once uploads returning a public URL.

use async_trait::async_trait;
use fulfillment::error::{Error, Result};
use std::path::PathBuf;

/// Client-side ceiling from the original checkout flow: 10 MiB.
pub const MAX_PROOF_BYTES: usize = 10 * 1024 * 1024;

/// Screenshots and PDF receipts only.
pub fn validate_proof(size: usize, content_type: &str) -> Result<()> {
    if !(content_type.starts_with("image/") || content_type == "application/pdf") {
        return Err(Error::validation(format!(
            "unsupported payment proof type {content_type:?}; expected an image or a PDF"
        )));
    }
    if size == 0 {
        return Err(Error::validation("payment proof is empty"));
    }
    if size > MAX_PROOF_BYTES {
        return Err(Error::validation("payment proof exceeds the 10 MiB limit"));
    }
    Ok(())
}

pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

#[async_trait]
pub trait ProofStore: Send + Sync {
    /// Store the bytes under `name` and return the public URL.
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<String>;
}

/// Filesystem store; the upload directory is served under a public base
/// URL by the reverse proxy.
pub struct FsProofStore {
    root: PathBuf,
    public_base: String,
}

impl FsProofStore {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into(),
        }
    }
}

#[async_trait]
impl ProofStore for FsProofStore {
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<String> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Error::Upload(e.to_string()))?;
        let path = self.root.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| Error::Upload(e.to_string()))?;
        Ok(format!(
            "{}/{}",
            self.public_base.trim_end_matches('/'),
            name
        ))
    }
}
