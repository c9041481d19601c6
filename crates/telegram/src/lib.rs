//! Telegram side of the relay.
//!
//! Polls the Bot API for channel posts, hands videos and documents from the
//! source channel to the relay pipeline, answers a handful of commands, and
//! implements [`RelayTransport`](mediarelay_pipeline::RelayTransport) on top
//! of teloxide.

pub mod bot;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod state;
pub mod transport;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_api;

pub use {
    bot::{PollingHandle, build_bot, build_transfer_client, start_polling},
    error::{Error, Result},
    transport::TelegramTransport,
};
