//! Thumbnail providers.

use std::path::{Path, PathBuf};

use {async_trait::async_trait, tracing::debug};

use crate::{
    error::{Error, Result},
    image_ops,
};

/// Produces a local thumbnail file for one upload.
#[async_trait]
pub trait ThumbnailProvider: Send + Sync {
    /// Write a thumbnail to `destination` and return the path written.
    async fn fetch(&self, destination: &Path) -> Result<PathBuf>;
}

/// Fetches a fixed image URL and normalizes it with
/// [`image_ops::prepare_thumbnail`].
pub struct HttpThumbnailProvider {
    client: reqwest::Client,
    url: String,
    max_dimension: u32,
}

impl HttpThumbnailProvider {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            max_dimension: image_ops::DEFAULT_MAX_DIMENSION,
        }
    }

    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }
}

#[async_trait]
impl ThumbnailProvider for HttpThumbnailProvider {
    async fn fetch(&self, destination: &Path) -> Result<PathBuf> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::external("thumbnail request failed", e))?
            .error_for_status()
            .map_err(|e| Error::external("thumbnail request rejected", e))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::external("reading thumbnail body", e))?;

        let max_dimension = self.max_dimension;
        let thumb = tokio::task::spawn_blocking(move || {
            image_ops::prepare_thumbnail(&bytes, max_dimension)
        })
        .await
        .map_err(|e| Error::external("thumbnail worker failed", e))??;

        tokio::fs::write(destination, &thumb.data)
            .await
            .map_err(|e| Error::external(format!("writing {}", destination.display()), e))?;

        debug!(
            url = %self.url,
            path = %destination.display(),
            source_format = ?thumb.source_format,
            width = thumb.width,
            height = thumb.height,
            bytes = thumb.data.len(),
            resized = thumb.was_resized,
            "thumbnail ready"
        );
        Ok(destination.to_path_buf())
    }
}
