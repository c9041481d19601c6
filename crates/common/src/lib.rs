//! Shared types, error definitions, and utilities used across all mediarelay crates.

pub mod error;
pub mod types;

pub use {
    error::{Error, FromMessage, Result},
    types::{ChannelId, MediaEvent, MediaKind, MessageRef},
};
