//! Domain types shared by the relay core and the transport.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

// ── ChannelId ───────────────────────────────────────────────────────────────

/// A chat or channel identifier, normalized at the configuration boundary.
///
/// Telegram accepts either the numeric chat id (`-100…` for channels) or the
/// public `@username`. Usernames are always stored with their leading `@`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawChannelId", into = "RawChannelId")]
pub enum ChannelId {
    Id(i64),
    Username(String),
}

/// Wire shape of a channel id in config files: a number or a string.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawChannelId {
    Int(i64),
    Str(String),
}

impl TryFrom<RawChannelId> for ChannelId {
    type Error = Error;

    fn try_from(raw: RawChannelId) -> Result<Self, Self::Error> {
        match raw {
            RawChannelId::Int(id) => Ok(Self::Id(id)),
            RawChannelId::Str(s) => s.parse(),
        }
    }
}

impl From<ChannelId> for RawChannelId {
    fn from(id: ChannelId) -> Self {
        match id {
            ChannelId::Id(id) => Self::Int(id),
            ChannelId::Username(name) => Self::Str(name),
        }
    }
}

impl FromStr for ChannelId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(id) = trimmed.parse::<i64>() {
            return Ok(Self::Id(id));
        }
        let name = trimmed.strip_prefix('@').unwrap_or(trimmed);
        if is_valid_username(name) {
            Ok(Self::Username(format!("@{name}")))
        } else {
            Err(Error::invalid_channel(s))
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Username(name) => f.write_str(name),
        }
    }
}

impl ChannelId {
    /// Whether an inbound chat (numeric id plus optional public username)
    /// is this channel. Username comparison is case-insensitive.
    #[must_use]
    pub fn matches(&self, chat_id: i64, username: Option<&str>) -> bool {
        match self {
            Self::Id(id) => *id == chat_id,
            Self::Username(name) => username.is_some_and(|u| {
                name.trim_start_matches('@')
                    .eq_ignore_ascii_case(u.trim_start_matches('@'))
            }),
        }
    }
}

/// Public Telegram usernames: 5–32 characters of `[A-Za-z0-9_]`, starting
/// with a letter.
fn is_valid_username(name: &str) -> bool {
    (5..=32).contains(&name.len())
        && name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ── Messages and media ──────────────────────────────────────────────────────

/// Handle on one concrete message in one chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i32,
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chat_id, self.message_id)
    }
}

/// Kind of attachment carried by an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Document,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => f.write_str("video"),
            Self::Document => f.write_str("document"),
        }
    }
}

/// One inbound media message, as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaEvent {
    pub chat_id: i64,
    /// Public username of the source chat, when it has one.
    pub chat_username: Option<String>,
    pub message_id: i32,
    pub kind: MediaKind,
    /// Transport-specific handle used to fetch the attachment.
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub size: u64,
}

impl MediaEvent {
    /// Reference to the message that carried the attachment.
    #[must_use]
    pub fn source_message(&self) -> MessageRef {
        MessageRef {
            chat_id: self.chat_id,
            message_id: self.message_id,
        }
    }
}
