//! Download, thumbnail, upload.

use std::{path::PathBuf, sync::Arc};

use {
    mediarelay_common::ChannelId,
    mediarelay_media::ThumbnailProvider,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use mediarelay_metrics::{counter, relay as relay_metrics};

use crate::{
    cleanup::CleanupGuard,
    error::{Error, Result},
    job::{Outcome, RelayJob, Stage},
    notify::escape_html,
    progress::{ProgressHandle, ProgressReporter},
    transport::{DocumentUpload, RelayTransport},
};

pub const DOWNLOAD_COMPLETE: &str = "✅ Download complete.\n📤 Uploading...";
pub const UPLOAD_COMPLETE: &str = "✅ Upload complete. Cleaning up...";

/// What to do when no thumbnail can be produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ThumbnailPolicy {
    /// Fail the upload.
    #[default]
    Required,
    /// Upload without a thumbnail.
    Optional,
}

impl ThumbnailPolicy {
    #[must_use]
    pub fn from_required(required: bool) -> Self {
        if required {
            Self::Required
        } else {
            Self::Optional
        }
    }
}

/// Runs the transfer half of a job and turns every failure into an
/// [`Outcome`].
pub struct TransferCoordinator {
    transport: Arc<dyn RelayTransport>,
    thumbnails: Option<Arc<dyn ThumbnailProvider>>,
    policy: ThumbnailPolicy,
    destination: ChannelId,
}

impl TransferCoordinator {
    pub fn new(
        transport: Arc<dyn RelayTransport>,
        thumbnails: Option<Arc<dyn ThumbnailProvider>>,
        policy: ThumbnailPolicy,
        destination: ChannelId,
    ) -> Self {
        Self {
            transport,
            thumbnails,
            policy,
            destination,
        }
    }

    #[must_use]
    pub fn destination(&self) -> &ChannelId {
        &self.destination
    }

    /// Download, then upload. Leaves the job in `Downloading` or `Uploading`
    /// and registers every local file it may create with `cleanup`.
    pub async fn run(
        &self,
        job: &mut RelayJob,
        reporter: &mut ProgressReporter,
        cleanup: &mut CleanupGuard,
        cancel: &CancellationToken,
    ) -> Outcome {
        match self.transfer(job, reporter, cleanup, cancel).await {
            Ok(()) => Outcome::success(job.file_name.clone(), self.destination.clone()),
            Err(e) => Outcome::failure(job.stage(), e),
        }
    }

    async fn transfer(
        &self,
        job: &mut RelayJob,
        reporter: &mut ProgressReporter,
        cleanup: &mut CleanupGuard,
        cancel: &CancellationToken,
    ) -> Result<()> {
        job.advance(Stage::Downloading)?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        cleanup.track_file(&job.download_path);
        let (handle, rx) = ProgressHandle::channel();
        let path = reporter
            .drive(
                Stage::Downloading,
                rx,
                self.transport
                    .download_media(&job.event, &job.download_path, handle),
            )
            .await?;
        cleanup.track_file(&path);
        let downloaded = reporter.last_sample().current;
        debug!(bytes = downloaded, path = %path.display(), "download finished");

        #[cfg(feature = "metrics")]
        counter!(relay_metrics::BYTES_DOWNLOADED_TOTAL).increment(downloaded);

        reporter.set_text(DOWNLOAD_COMPLETE).await;

        job.advance(Stage::Uploading)?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let thumbnail = self.thumbnail(job, cleanup).await?;
        let upload = DocumentUpload {
            destination: self.destination.clone(),
            path,
            file_name: job.file_name.clone(),
            thumbnail,
            caption: format!("<code>{}</code>", escape_html(&job.file_name)),
        };
        let (handle, rx) = ProgressHandle::channel();
        let sent = reporter
            .drive(
                Stage::Uploading,
                rx,
                self.transport.upload_document(upload, handle),
            )
            .await?;

        let uploaded = reporter.last_sample().current;

        #[cfg(feature = "metrics")]
        counter!(relay_metrics::BYTES_UPLOADED_TOTAL).increment(uploaded);

        info!(message = %sent, file_name = %job.file_name, bytes = uploaded, "document delivered");
        reporter.set_text(UPLOAD_COMPLETE).await;
        Ok(())
    }

    async fn thumbnail(
        &self,
        job: &RelayJob,
        cleanup: &mut CleanupGuard,
    ) -> Result<Option<PathBuf>> {
        let Some(provider) = &self.thumbnails else {
            return match self.policy {
                ThumbnailPolicy::Required => {
                    Err(Error::message("no thumbnail source configured"))
                },
                ThumbnailPolicy::Optional => Ok(None),
            };
        };

        cleanup.track_file(&job.thumbnail_path);
        match provider.fetch(&job.thumbnail_path).await {
            Ok(path) => {
                cleanup.track_file(&path);
                Ok(Some(path))
            },
            Err(e) if self.policy == ThumbnailPolicy::Optional => {
                warn!(error = %e, "thumbnail unavailable, uploading without one");
                Ok(None)
            },
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for TransferCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferCoordinator")
            .field("policy", &self.policy)
            .field("destination", &self.destination)
            .field("thumbnails", &self.thumbnails.is_some())
            .finish_non_exhaustive()
    }
}
