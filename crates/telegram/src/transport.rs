//! [`RelayTransport`] over the Telegram Bot API.

use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use {
    async_trait::async_trait,
    futures::StreamExt,
    mediarelay_common::{ChannelId, MediaEvent, MessageRef},
    mediarelay_pipeline::{DocumentUpload, ProgressHandle, RelayTransport},
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{InputFile, MessageId, ParseMode, Recipient, ReplyParameters},
    },
    tokio::io::AsyncWriteExt,
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use mediarelay_metrics::{counter, telegram as tg_metrics};

use crate::{
    error::{Error, Result},
    upload::ProgressReader,
};

const RETRY_AFTER_MAX_RETRIES: usize = 4;
const UPLOAD_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound for one `sendDocument` request, large files included.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(4 * 60 * 60);

/// Shared Telegram client used by every relay job.
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
    /// Same bot on the transfer client, for uploads.
    uploader: Bot,
    http: reqwest::Client,
}

impl TelegramTransport {
    /// Messaging goes through `bot`. File downloads use `http`, which should
    /// not carry an overall request timeout; uploads go through a copy of
    /// `bot` on its own long-timeout client.
    pub fn new(bot: Bot, http: reqwest::Client) -> Result<Self> {
        let uploader = upload_bot(&bot)?;
        Ok(Self {
            bot,
            uploader,
            http,
        })
    }

    #[must_use]
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Download URL for a `getFile` path.
    pub fn file_url(&self, file_path: &str) -> Result<reqwest::Url> {
        self.bot
            .api_url()
            .join(&format!("file/bot{}/{}", self.bot.token(), file_path))
            .map_err(|e| Error::external("building file URL", e))
    }

    async fn download(
        &self,
        event: &MediaEvent,
        destination: &Path,
        progress: ProgressHandle,
    ) -> Result<PathBuf> {
        let file = with_retry("get file", || {
            let req = self.bot.get_file(event.file_id.clone());
            async move { req.await }
        })
        .await?;
        let url = self.file_url(&file.path)?;

        let response = self.http.get(url).send().await?.error_for_status()?;
        let total = response
            .content_length()
            .filter(|len| *len > 0)
            .unwrap_or(event.size);
        debug!(file_path = %file.path, total, "downloading telegram file");

        let mut out = tokio::fs::File::create(destination)
            .await
            .map_err(|e| Error::io(format!("creating {}", destination.display()), e))?;
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        progress.update(0, total);

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            out.write_all(&chunk)
                .await
                .map_err(|e| Error::io(format!("writing {}", destination.display()), e))?;
            downloaded += chunk.len() as u64;
            progress.update(downloaded, total.max(downloaded));
        }
        out.flush()
            .await
            .map_err(|e| Error::io(format!("flushing {}", destination.display()), e))?;

        Ok(destination.to_path_buf())
    }

    async fn upload(&self, upload: DocumentUpload, progress: ProgressHandle) -> Result<MessageRef> {
        let total = tokio::fs::metadata(&upload.path)
            .await
            .map_err(|e| Error::io(format!("reading {}", upload.path.display()), e))?
            .len();
        let progress = Arc::new(progress);
        let recipient = recipient(&upload.destination);

        let sent = with_retry("send document", || {
            let bot = self.uploader.clone();
            let recipient = recipient.clone();
            let progress = Arc::clone(&progress);
            let path = upload.path.clone();
            let file_name = upload.file_name.clone();
            let caption = upload.caption.clone();
            let thumbnail = upload.thumbnail.clone();
            async move {
                // reopened per attempt: a read body can only be consumed once
                let file = match tokio::fs::File::open(&path).await {
                    Ok(file) => file,
                    Err(e) => return Err(RequestError::Io(e.into())),
                };
                let body = ProgressReader::new(file, total, progress);
                let mut req = bot
                    .send_document(recipient, InputFile::read(body).file_name(file_name))
                    .caption(caption)
                    .parse_mode(ParseMode::Html);
                if let Some(thumb) = thumbnail {
                    req = req.thumbnail(InputFile::file(thumb));
                }
                req.await
            }
        })
        .await?;

        Ok(message_ref(&sent))
    }
}

impl std::fmt::Debug for TelegramTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramTransport")
            .field("api_url", &self.bot.api_url().as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RelayTransport for TelegramTransport {
    async fn download_media(
        &self,
        event: &MediaEvent,
        destination: &Path,
        progress: ProgressHandle,
    ) -> mediarelay_pipeline::Result<PathBuf> {
        Ok(self.download(event, destination, progress).await?)
    }

    async fn upload_document(
        &self,
        upload: DocumentUpload,
        progress: ProgressHandle,
    ) -> mediarelay_pipeline::Result<MessageRef> {
        Ok(self.upload(upload, progress).await?)
    }

    async fn send_message(
        &self,
        chat: &ChannelId,
        text: &str,
        reply_to: Option<i32>,
    ) -> mediarelay_pipeline::Result<MessageRef> {
        let recipient = recipient(chat);
        let sent = with_retry("send message", || {
            let mut req = self
                .bot
                .send_message(recipient.clone(), text)
                .parse_mode(ParseMode::Html);
            if let Some(id) = reply_to {
                req = req.reply_parameters(
                    ReplyParameters::new(MessageId(id)).allow_sending_without_reply(),
                );
            }
            async move { req.await }
        })
        .await
        .map_err(Error::from)?;
        Ok(message_ref(&sent))
    }

    async fn edit_message(&self, message: &MessageRef, text: &str) -> mediarelay_pipeline::Result<()> {
        let result = with_retry("edit message", || {
            let req = self
                .bot
                .edit_message_text(ChatId(message.chat_id), MessageId(message.message_id), text)
                .parse_mode(ParseMode::Html);
            async move { req.await }
        })
        .await;
        match result {
            Ok(_) => Ok(()),
            Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(e) => Err(Error::from(e).into()),
        }
    }

    async fn delete_message(&self, message: &MessageRef) -> mediarelay_pipeline::Result<()> {
        let result = with_retry("delete message", || {
            let req = self
                .bot
                .delete_message(ChatId(message.chat_id), MessageId(message.message_id));
            async move { req.await }
        })
        .await;
        match result {
            Ok(_) => Ok(()),
            Err(RequestError::Api(ApiError::MessageToDeleteNotFound)) => {
                debug!(%message, "message already deleted");
                Ok(())
            },
            Err(e) => Err(Error::from(e).into()),
        }
    }
}

/// Same token and API URL as `bot`, on a client sized for file uploads.
fn upload_bot(bot: &Bot) -> Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .connect_timeout(UPLOAD_CONNECT_TIMEOUT)
        .timeout(UPLOAD_TIMEOUT)
        .build()
        .map_err(|e| Error::external("building telegram upload client", e))?;
    Ok(Bot::with_client(bot.token(), client).set_api_url(bot.api_url()))
}

/// Telegram addressing for a configured channel.
#[must_use]
pub fn recipient(chat: &ChannelId) -> Recipient {
    match chat {
        ChannelId::Id(id) => Recipient::Id(ChatId(*id)),
        ChannelId::Username(name) => Recipient::ChannelUsername(name.clone()),
    }
}

fn message_ref(message: &Message) -> MessageRef {
    MessageRef {
        chat_id: message.chat.id.0,
        message_id: message.id.0,
    }
}

/// Run `request`, sleeping through `RetryAfter` responses up to
/// [`RETRY_AFTER_MAX_RETRIES`] times.
pub(crate) async fn with_retry<T, F, Fut>(
    operation: &'static str,
    mut request: F,
) -> std::result::Result<T, RequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RequestError>>,
{
    let mut retries = 0usize;

    loop {
        match request().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let Some(wait) = retry_after_duration(&err) else {
                    return Err(err);
                };

                if retries >= RETRY_AFTER_MAX_RETRIES {
                    warn!(
                        operation,
                        retries,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limit persisted after retries"
                    );
                    return Err(err);
                }

                retries += 1;
                #[cfg(feature = "metrics")]
                counter!(tg_metrics::RATE_LIMITED_TOTAL).increment(1);
                warn!(
                    operation,
                    retries,
                    max_retries = RETRY_AFTER_MAX_RETRIES,
                    retry_after_secs = wait.as_secs(),
                    "telegram rate limited, waiting before retry"
                );
                tokio::time::sleep(wait).await;
            },
        }
    }
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::test_api::{
            FILE_BYTES, FILE_PATH, MockBotApi, TOKEN, message_not_modified,
            message_to_delete_not_found, retry_after,
        },
        mediarelay_common::MediaKind,
    };

    const STATUS: MessageRef = MessageRef {
        chat_id: -100,
        message_id: 7,
    };

    fn transport(api: &MockBotApi) -> TelegramTransport {
        TelegramTransport::new(api.bot(), reqwest::Client::new()).unwrap()
    }

    fn event() -> MediaEvent {
        MediaEvent {
            chat_id: -100,
            chat_username: None,
            message_id: 42,
            kind: MediaKind::Video,
            file_id: "video-file-id".into(),
            file_name: Some("movie.mkv".into()),
            mime_type: None,
            size: 999,
        }
    }

    #[test]
    fn recipients() {
        assert_eq!(recipient(&ChannelId::Id(-5)), Recipient::Id(ChatId(-5)));
        assert_eq!(
            recipient(&ChannelId::Username("@dest_channel".into())),
            Recipient::ChannelUsername("@dest_channel".into())
        );
    }

    #[tokio::test]
    async fn file_url_uses_api_base() {
        let api = MockBotApi::start().await;
        let url = transport(&api).file_url(FILE_PATH).unwrap();
        assert!(
            url.as_str()
                .ends_with(&format!("/file/bot{TOKEN}/{FILE_PATH}")),
            "{url}"
        );
        api.shutdown().await;
    }

    #[tokio::test]
    async fn uploader_targets_the_same_api() {
        let api = MockBotApi::start().await;
        let transport = transport(&api);
        assert_eq!(transport.uploader.token(), transport.bot.token());
        assert_eq!(transport.uploader.api_url(), transport.bot.api_url());
        api.shutdown().await;
    }

    #[test]
    fn bot_with_custom_api_url_builds_a_transport() {
        let bot = Bot::new(TOKEN).set_api_url(reqwest::Url::parse("http://127.0.0.1:9/").unwrap());
        let transport = TelegramTransport::new(bot, reqwest::Client::new()).unwrap();
        assert_eq!(transport.uploader.api_url().as_str(), "http://127.0.0.1:9/");
    }

    #[tokio::test]
    async fn send_replies_in_html() {
        let api = MockBotApi::start().await;
        let sent = transport(&api)
            .send_message(&ChannelId::Id(-100), "<b>hi</b>", Some(42))
            .await
            .unwrap();
        assert_eq!(sent.chat_id, -100);

        let body = api.requests_for("SendMessage").pop().unwrap();
        assert_eq!(body["parse_mode"], "HTML");
        assert_eq!(body["reply_parameters"]["message_id"], 42);
        api.shutdown().await;
    }

    #[tokio::test]
    async fn unchanged_edit_and_missing_delete_succeed() {
        let api = MockBotApi::start().await;
        api.fail_next("EditMessageText", message_not_modified());
        api.fail_next("DeleteMessage", message_to_delete_not_found());
        let transport = transport(&api);

        transport.edit_message(&STATUS, "same").await.unwrap();
        transport.delete_message(&STATUS).await.unwrap();
        api.shutdown().await;
    }

    #[tokio::test]
    async fn other_api_errors_surface() {
        let api = MockBotApi::start().await;
        api.fail_next(
            "DeleteMessage",
            serde_json::json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: message can't be deleted"
            }),
        );
        assert!(transport(&api).delete_message(&STATUS).await.is_err());
        api.shutdown().await;
    }

    #[tokio::test]
    async fn retries_after_flood_wait() {
        let api = MockBotApi::start().await;
        api.fail_next("SendMessage", retry_after(1));

        transport(&api)
            .send_message(&ChannelId::Id(-100), "hello", None)
            .await
            .unwrap();
        assert_eq!(api.requests_for("SendMessage").len(), 2);
        api.shutdown().await;
    }

    #[tokio::test]
    async fn downloads_file_with_progress() {
        let api = MockBotApi::start().await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("movie.mkv");
        let (handle, rx) = ProgressHandle::channel();

        let path = transport(&api)
            .download_media(&event(), &dest, handle)
            .await
            .unwrap();

        assert_eq!(path, dest);
        assert_eq!(std::fs::read(&dest).unwrap(), FILE_BYTES);
        let last = *rx.borrow();
        assert_eq!(last.current, FILE_BYTES.len() as u64);
        assert_eq!(last.total, FILE_BYTES.len() as u64);
        assert_eq!(api.file_downloads(), 1);
        api.shutdown().await;
    }

    #[tokio::test]
    async fn uploads_document_with_caption() {
        let api = MockBotApi::start().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.mkv");
        std::fs::write(&path, FILE_BYTES).unwrap();
        let (handle, rx) = ProgressHandle::channel();

        let sent = transport(&api)
            .upload_document(
                DocumentUpload {
                    destination: ChannelId::Id(-200),
                    path,
                    file_name: "MyBot_1700000000.mkv".into(),
                    thumbnail: None,
                    caption: "<code>MyBot_1700000000.mkv</code>".into(),
                },
                handle,
            )
            .await
            .unwrap();

        assert_eq!(sent.chat_id, -200);
        let body = api.raw_bodies_for("SendDocument").pop().unwrap();
        assert!(body.contains("MyBot_1700000000.mkv"));
        assert!(body.contains("<code>MyBot_1700000000.mkv</code>"));
        assert!(rx.borrow().is_complete());
        api.shutdown().await;
    }
}
