//! Config schema types (telegram, relay route, thumbnail, notify, progress, metrics).

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use {
    mediarelay_common::ChannelId,
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
};

use crate::error::{Error, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub telegram: TelegramConfig,
    pub relay: RouteConfig,
    pub thumbnail: ThumbnailConfig,
    pub notify: NotifyConfig,
    pub progress: ProgressConfig,
    pub metrics: MetricsConfig,
}

impl RelayConfig {
    /// Source and destination channels, both required to relay anything.
    pub fn route(&self) -> Result<(ChannelId, ChannelId)> {
        let source = self
            .relay
            .source_channel
            .clone()
            .ok_or(Error::missing("relay.source_channel"))?;
        let destination = self
            .relay
            .destination_channel
            .clone()
            .ok_or(Error::missing("relay.destination_channel"))?;
        Ok((source, destination))
    }
}

/// Bot credentials and API endpoint.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub token: Secret<String>,

    /// Base URL of a self-hosted Bot API server. Defaults to the public API.
    pub api_url: Option<String>,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            api_url: None,
        }
    }
}

impl TelegramConfig {
    #[must_use]
    pub fn has_token(&self) -> bool {
        !self.token.expose_secret().trim().is_empty()
    }
}

/// Where media comes from, where it goes, and how it is renamed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Monitored channel.
    pub source_channel: Option<ChannelId>,

    /// Channel receiving the renamed documents.
    pub destination_channel: Option<ChannelId>,

    /// Prepended to every destination file name.
    pub prefix: String,

    /// Directory for transient downloads and thumbnails.
    pub work_dir: Option<PathBuf>,

    /// Remove the source message once the relay job finishes.
    pub delete_source: bool,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            source_channel: None,
            destination_channel: None,
            prefix: String::new(),
            work_dir: None,
            delete_source: true,
        }
    }
}

impl RouteConfig {
    /// Configured work dir, or `<tmp>/mediarelay`.
    #[must_use]
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("mediarelay"))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Image attached to every upload.
    pub url: Option<String>,

    /// Fail the upload when the thumbnail cannot be fetched. When `false` the
    /// document is sent without one.
    pub required: bool,

    /// Longest edge of the normalized thumbnail, in pixels.
    pub max_dimension: u32,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            url: None,
            required: true,
            max_dimension: 320,
        }
    }
}

/// Operator-facing outcome notifications.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub log_channel: Option<ChannelId>,
    /// Fallback target when `log_channel` is unset.
    pub owner_id: Option<i64>,
}

impl NotifyConfig {
    #[must_use]
    pub fn target(&self) -> Option<ChannelId> {
        self.log_channel
            .clone()
            .or_else(|| self.owner_id.map(ChannelId::Id))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Minimum interval between status message edits (ms).
    pub edit_interval_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            edit_interval_ms: 2000,
        }
    }
}

impl ProgressConfig {
    #[must_use]
    pub fn edit_interval(&self) -> Duration {
        Duration::from_millis(self.edit_interval_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve Prometheus metrics on this address when set.
    pub prometheus_listen: Option<SocketAddr>,
}
