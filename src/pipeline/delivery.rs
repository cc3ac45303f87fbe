//! Artifact delivery
//!
//! Download triggers for published addresses, and the upload boundary the
//! finished artifacts are handed to.

use crate::registry::{AddressHandle, ObjectUrlRegistry};
use crate::transcode::MultipartField;
use crate::utils::AppResult;
use async_trait::async_trait;
use std::path::PathBuf;

/// Where a download trigger sends an address
#[async_trait]
pub trait DownloadSurface: Send {
    async fn trigger(
        &mut self,
        registry: &ObjectUrlRegistry,
        handle: &AddressHandle,
        suggested_name: &str,
    ) -> AppResult<()>;
}

/// Saves downloads into a directory under their suggested filename
pub struct DirectoryDownloads {
    dir: PathBuf,
}

impl DirectoryDownloads {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl DownloadSurface for DirectoryDownloads {
    async fn trigger(
        &mut self,
        registry: &ObjectUrlRegistry,
        handle: &AddressHandle,
        suggested_name: &str,
    ) -> AppResult<()> {
        let bytes = registry.resolve(handle)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(suggested_name);
        tokio::fs::write(&path, &bytes[..]).await?;

        tracing::info!("Downloaded {} ({} bytes) to {:?}", handle.url(), bytes.len(), path);
        Ok(())
    }
}

/// Remote storage that receives the finished artifacts as form fields
#[async_trait]
pub trait ArtifactUploader: Send + Sync {
    /// Send every field in one request. Failures surface as `AppError::Upload`.
    async fn upload(&self, fields: Vec<MultipartField>) -> AppResult<()>;
}
