//! Thumbnail acquisition: fetch an image, normalize it for Telegram, store it locally.

pub mod error;
pub mod image_ops;
pub mod thumbnail;

pub use {
    error::{Error, Result},
    thumbnail::{HttpThumbnailProvider, ThumbnailProvider},
};
