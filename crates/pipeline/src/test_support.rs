//! In-memory doubles for pipeline tests.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    io,
    path::{Path, PathBuf},
    sync::{
        Mutex,
        atomic::{AtomicI32, Ordering},
    },
};

use {
    async_trait::async_trait,
    mediarelay_common::{ChannelId, MediaEvent, MediaKind, MessageRef},
    mediarelay_media::ThumbnailProvider,
};

use crate::{
    error::{Error, Result},
    naming::Clock,
    progress::ProgressHandle,
    transport::{DocumentUpload, RelayTransport},
};

pub const SOURCE_CHAT: i64 = -100;
const PAYLOAD: &[u8] = b"0123456789abcdef";

pub fn sample_event(file_name: Option<&str>) -> MediaEvent {
    MediaEvent {
        chat_id: SOURCE_CHAT,
        chat_username: Some("source_channel".into()),
        message_id: 42,
        kind: MediaKind::Video,
        file_id: "file-1".into(),
        file_name: file_name.map(str::to_string),
        mime_type: Some("video/x-matroska".into()),
        size: PAYLOAD.len() as u64,
    }
}

pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn unix_timestamp(&self) -> i64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Download {
        file_id: String,
        destination: PathBuf,
    },
    Upload(DocumentUpload),
    Send {
        chat: ChannelId,
        text: String,
        reply_to: Option<i32>,
    },
    Edit {
        message: MessageRef,
        text: String,
    },
    Delete(MessageRef),
}

/// Records every call; failures are opt-in.
#[derive(Default)]
pub struct MockTransport {
    calls: Mutex<Vec<Call>>,
    sent: Mutex<Vec<MessageRef>>,
    deleted: Mutex<Vec<MessageRef>>,
    next_id: AtomicI32,
    fail_download: bool,
    fail_upload: bool,
    fail_edits: bool,
    fail_sends_to: Vec<ChannelId>,
    fail_deletes: Vec<MessageRef>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI32::new(1000),
            ..Self::default()
        }
    }

    /// Write half the payload, then fail.
    pub fn fail_download_after_partial_write(mut self) -> Self {
        self.fail_download = true;
        self
    }

    pub fn fail_upload(mut self) -> Self {
        self.fail_upload = true;
        self
    }

    pub fn fail_edits(mut self) -> Self {
        self.fail_edits = true;
        self
    }

    pub fn fail_sends_to(mut self, chat: ChannelId) -> Self {
        self.fail_sends_to.push(chat);
        self
    }

    pub fn fail_delete(mut self, message: MessageRef) -> Self {
        self.fail_deletes.push(message);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<DocumentUpload> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Upload(upload) => Some(upload),
                _ => None,
            })
            .collect()
    }

    /// Messages sent successfully.
    pub fn sent(&self) -> Vec<MessageRef> {
        self.sent.lock().unwrap().clone()
    }

    /// Messages deleted successfully.
    pub fn deleted(&self) -> Vec<MessageRef> {
        self.deleted.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_message(&self, chat_id: i64) -> MessageRef {
        MessageRef {
            chat_id,
            message_id: self.next_id.fetch_add(1, Ordering::Relaxed),
        }
    }
}

fn refused(what: &str) -> Error {
    Error::transport(format!("{what} failed"), io::Error::other("connection reset"))
}

#[async_trait]
impl RelayTransport for MockTransport {
    async fn download_media(
        &self,
        event: &MediaEvent,
        destination: &Path,
        progress: ProgressHandle,
    ) -> Result<PathBuf> {
        self.record(Call::Download {
            file_id: event.file_id.clone(),
            destination: destination.to_path_buf(),
        });
        let total = PAYLOAD.len() as u64;
        let half = PAYLOAD.len() / 2;

        tokio::fs::write(destination, &PAYLOAD[..half])
            .await
            .map_err(|e| Error::resource("write", e))?;
        progress.update(half as u64, total);
        tokio::task::yield_now().await;
        if self.fail_download {
            return Err(refused("download"));
        }

        tokio::fs::write(destination, PAYLOAD)
            .await
            .map_err(|e| Error::resource("write", e))?;
        progress.update(total, total);
        Ok(destination.to_path_buf())
    }

    async fn upload_document(
        &self,
        upload: DocumentUpload,
        progress: ProgressHandle,
    ) -> Result<MessageRef> {
        assert!(upload.path.exists(), "uploading a missing file");
        if let Some(thumb) = &upload.thumbnail {
            assert!(thumb.exists(), "uploading with a missing thumbnail");
        }
        self.record(Call::Upload(upload));
        if self.fail_upload {
            return Err(refused("upload"));
        }
        let total = PAYLOAD.len() as u64;
        progress.update(total / 2, total);
        tokio::task::yield_now().await;
        progress.update(total, total);
        Ok(self.next_message(-200))
    }

    async fn send_message(
        &self,
        chat: &ChannelId,
        text: &str,
        reply_to: Option<i32>,
    ) -> Result<MessageRef> {
        self.record(Call::Send {
            chat: chat.clone(),
            text: text.to_string(),
            reply_to,
        });
        if self.fail_sends_to.contains(chat) {
            return Err(refused("send"));
        }
        let chat_id = match chat {
            ChannelId::Id(id) => *id,
            ChannelId::Username(_) => 0,
        };
        let message = self.next_message(chat_id);
        self.sent.lock().unwrap().push(message);
        Ok(message)
    }

    async fn edit_message(&self, message: &MessageRef, text: &str) -> Result<()> {
        self.record(Call::Edit {
            message: *message,
            text: text.to_string(),
        });
        if self.fail_edits {
            return Err(refused("edit"));
        }
        Ok(())
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<()> {
        self.record(Call::Delete(*message));
        if self.fail_deletes.contains(message) {
            return Err(refused("delete"));
        }
        self.deleted.lock().unwrap().push(*message);
        Ok(())
    }
}

/// Writes a fixed JPEG stub, or fails.
pub struct MockThumbnails {
    fail: bool,
}

impl MockThumbnails {
    pub fn ok() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl ThumbnailProvider for MockThumbnails {
    async fn fetch(&self, destination: &Path) -> mediarelay_media::Result<PathBuf> {
        if self.fail {
            return Err(mediarelay_media::Error::external(
                "thumbnail request failed",
                io::Error::other("404 Not Found"),
            ));
        }
        tokio::fs::write(destination, b"\xFF\xD8\xFF")
            .await
            .map_err(|e| mediarelay_media::Error::external("write", e))?;
        Ok(destination.to_path_buf())
    }
}
