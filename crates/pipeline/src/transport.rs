//! What the relay needs from the messaging platform.

use std::path::{Path, PathBuf};

use {
    async_trait::async_trait,
    mediarelay_common::{ChannelId, MediaEvent, MessageRef},
};

use crate::{error::Result, progress::ProgressHandle};

/// A document to send to the destination channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    pub destination: ChannelId,
    pub path: PathBuf,
    /// Name shown to recipients.
    pub file_name: String,
    pub thumbnail: Option<PathBuf>,
    /// HTML caption.
    pub caption: String,
}

/// Messaging platform operations used by the pipeline.
///
/// Implementations are shared by every concurrent job and must be safe for
/// concurrent use. Message text is HTML.
///
/// Transfer methods take the [`ProgressHandle`] by value and must drop it
/// when the transfer finishes; the progress reporter stops watching once it
/// is gone.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Stream the event's attachment to `destination`.
    async fn download_media(
        &self,
        event: &MediaEvent,
        destination: &Path,
        progress: ProgressHandle,
    ) -> Result<PathBuf>;

    /// Send a local file as a document.
    async fn upload_document(
        &self,
        upload: DocumentUpload,
        progress: ProgressHandle,
    ) -> Result<MessageRef>;

    /// Send a text message, optionally as a reply to `reply_to` in the same chat.
    async fn send_message(
        &self,
        chat: &ChannelId,
        text: &str,
        reply_to: Option<i32>,
    ) -> Result<MessageRef>;

    async fn edit_message(&self, message: &MessageRef, text: &str) -> Result<()>;

    /// Deleting a message that is already gone succeeds.
    async fn delete_message(&self, message: &MessageRef) -> Result<()>;
}
