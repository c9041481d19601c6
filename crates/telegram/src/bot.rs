use std::{sync::Arc, time::Duration};

use {
    mediarelay_common::ChannelId,
    mediarelay_config::TelegramConfig,
    mediarelay_pipeline::MediaRelayPipeline,
    secrecy::ExposeSecret,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, UpdateKind},
    },
    tokio::task::JoinHandle,
    tokio_util::{sync::CancellationToken, task::TaskTracker},
    tracing::{debug, error, info, warn},
};

#[cfg(feature = "metrics")]
use mediarelay_metrics::{counter, telegram as tg_metrics};

use crate::{
    commands,
    error::{Error, Result},
    handlers,
    state::RelayState,
};

/// Long-poll timeout passed to `getUpdates`, in seconds.
const POLL_TIMEOUT_SECS: u32 = 30;
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Bot for API calls.
///
/// The client timeout is longer than the long-polling timeout so the HTTP
/// client doesn't abort `getUpdates` before Telegram responds.
pub fn build_bot(config: &TelegramConfig) -> Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(45))
        .build()
        .map_err(|e| Error::external("building telegram client", e))?;
    let bot = Bot::with_client(config.token.expose_secret(), client);
    match &config.api_url {
        Some(api_url) => {
            let url = reqwest::Url::parse(api_url)
                .map_err(|e| Error::external("invalid telegram.api_url", e))?;
            Ok(bot.set_api_url(url))
        },
        None => Ok(bot),
    }
}

/// Client for file transfers, which may take far longer than any API call.
pub fn build_transfer_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .build()?)
}

/// A running polling loop and the relay jobs it started.
pub struct PollingHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    jobs: TaskTracker,
}

impl PollingHandle {
    /// Resolves when polling stops on its own (another instance took over).
    pub async fn stopped(&self) {
        self.cancel.cancelled().await;
    }

    /// Relay jobs still running.
    #[must_use]
    pub fn active_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Stop polling, then wait for in-flight relay jobs.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "telegram polling task failed");
        }
        self.jobs.close();
        if !self.jobs.is_empty() {
            info!(jobs = self.jobs.len(), "waiting for in-flight relay jobs");
        }
        self.jobs.wait().await;
    }
}

/// Connect, register commands, and start polling in the background.
pub async fn start_polling(
    bot: Bot,
    source: ChannelId,
    pipeline: Arc<MediaRelayPipeline>,
) -> Result<PollingHandle> {
    // Verify credentials and get bot username.
    let me = bot.get_me().await?;
    let bot_username = me.username.clone();

    // Delete any existing webhook so long polling works.
    bot.delete_webhook().send().await?;

    if let Err(e) = bot.set_my_commands(commands::bot_commands()).await {
        warn!(error = %e, "failed to register bot commands");
    }

    info!(
        username = ?bot_username,
        %source,
        destination = %pipeline.destination(),
        "telegram bot connected (webhook cleared)"
    );

    let cancel = CancellationToken::new();
    let jobs = TaskTracker::new();
    let state = Arc::new(RelayState {
        bot,
        bot_username,
        source,
        pipeline,
        jobs: jobs.clone(),
    });
    let task = tokio::spawn(poll_updates(state, cancel.clone()));

    Ok(PollingHandle { cancel, task, jobs })
}

async fn poll_updates(state: Arc<RelayState>, cancel: CancellationToken) {
    info!("starting telegram polling loop");
    let mut offset: i32 = 0;

    loop {
        let request = state
            .bot
            .get_updates()
            .offset(offset)
            .timeout(POLL_TIMEOUT_SECS)
            .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::ChannelPost])
            .send();
        let result = tokio::select! {
            () = cancel.cancelled() => break,
            result = request => result,
        };

        match result {
            Ok(updates) => {
                debug!(count = updates.len(), "got telegram updates");
                for update in updates {
                    offset = update.id.as_offset();

                    #[cfg(feature = "metrics")]
                    counter!(tg_metrics::UPDATES_RECEIVED_TOTAL).increment(1);

                    match update.kind {
                        UpdateKind::Message(msg) | UpdateKind::ChannelPost(msg) => {
                            let chat_id = msg.chat.id.0;
                            if let Err(e) = handlers::handle_message(msg, &state).await {
                                error!(chat_id, error = %e, "error handling telegram message");
                            }
                        },
                        other => {
                            debug!("ignoring update: {other:?}");
                        },
                    }
                }
            },
            Err(e) => {
                #[cfg(feature = "metrics")]
                counter!(tg_metrics::POLLING_ERRORS_TOTAL).increment(1);

                // Another bot instance is polling with the same token.
                if matches!(&e, RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) {
                    warn!("telegram polling stopped: another instance is running with this token");
                    cancel.cancel();
                    break;
                }

                warn!(error = %e, "telegram getUpdates failed");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(POLL_ERROR_BACKOFF) => {},
                }
            },
        }
    }
    info!("telegram polling stopped");
}
