use std::sync::Arc;

use {
    mediarelay_common::ChannelId,
    mediarelay_pipeline::MediaRelayPipeline,
    teloxide::Bot,
    tokio_util::task::TaskTracker,
};

/// Everything the update handlers need, shared by the polling loop.
pub struct RelayState {
    pub bot: Bot,
    pub bot_username: Option<String>,
    /// Channel whose media is relayed.
    pub source: ChannelId,
    pub pipeline: Arc<MediaRelayPipeline>,
    /// Relay jobs in flight, awaited on shutdown.
    pub jobs: TaskTracker,
}
