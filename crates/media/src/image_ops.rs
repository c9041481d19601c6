//! Thumbnail normalization.
//!
//! Telegram only renders document thumbnails that are JPEG, at most 320px
//! on the longest edge, and under 200 KB. Anything else is silently ignored
//! by the Bot API, so every fetched image is re-encoded to fit.

use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};

use crate::error::{Error, Result};

/// Longest edge Telegram accepts for a document thumbnail.
pub const DEFAULT_MAX_DIMENSION: u32 = 320;

/// Size limit for a document thumbnail.
pub const MAX_THUMBNAIL_BYTES: usize = 200 * 1024;

/// JPEG quality for the first encoding attempt (0-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Image metadata.
#[cfg(test)]
#[derive(Debug, Clone)]
pub(crate) struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: Option<ImageFormat>,
}

/// A thumbnail ready to attach to an upload.
#[derive(Debug)]
pub struct PreparedThumbnail {
    /// JPEG bytes.
    pub data: Vec<u8>,
    /// Format the source image was detected as.
    pub source_format: Option<ImageFormat>,
    pub original_width: u32,
    pub original_height: u32,
    pub width: u32,
    pub height: u32,
    pub was_resized: bool,
}

/// Get metadata about an image without fully decoding it.
#[cfg(test)]
pub(crate) fn get_image_metadata(data: &[u8]) -> Result<ImageMetadata> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| Error::external("failed to guess image format", e))?;

    let format = reader.format();
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| Error::external("failed to read image dimensions", e))?;

    Ok(ImageMetadata {
        width,
        height,
        format,
    })
}

/// Decode any supported image and re-encode it as a Telegram-compatible
/// JPEG thumbnail no larger than `max_dimension` on either edge.
pub fn prepare_thumbnail(data: &[u8], max_dimension: u32) -> Result<PreparedThumbnail> {
    if max_dimension == 0 {
        return Err(Error::invalid_input("max_dimension must be positive"));
    }

    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| Error::external("failed to guess image format", e))?;
    let source_format = reader.format();
    let img = reader
        .decode()
        .map_err(|e| Error::external("failed to decode image", e))?;

    let (original_width, original_height) = img.dimensions();
    let (width, height, resized) = resize_to_fit(&img, max_dimension);

    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());

    let mut jpeg = encode_jpeg_with_quality(&rgb, DEFAULT_JPEG_QUALITY)?;
    if jpeg.len() > MAX_THUMBNAIL_BYTES {
        jpeg = reduce_size_to_fit(&rgb, MAX_THUMBNAIL_BYTES)?;
    }

    Ok(PreparedThumbnail {
        data: jpeg,
        source_format,
        original_width,
        original_height,
        width,
        height,
        was_resized: (width, height) != (original_width, original_height),
    })
}

/// Resize image to fit within max dimension, preserving aspect ratio.
fn resize_to_fit(img: &DynamicImage, max_dimension: u32) -> (u32, u32, DynamicImage) {
    let (width, height) = img.dimensions();

    if width <= max_dimension && height <= max_dimension {
        return (width, height, img.clone());
    }

    let ratio = if width > height {
        max_dimension as f64 / width as f64
    } else {
        max_dimension as f64 / height as f64
    };

    let new_width = ((width as f64 * ratio).round() as u32).max(1);
    let new_height = ((height as f64 * ratio).round() as u32).max(1);

    let resized = img.resize_exact(new_width, new_height, image::imageops::FilterType::Lanczos3);
    (new_width, new_height, resized)
}

/// Encode image as JPEG with specified quality.
fn encode_jpeg_with_quality(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut output = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut output, quality);
    img.write_with_encoder(encoder)
        .map_err(|e| Error::external("failed to encode as JPEG", e))?;
    Ok(output.into_inner())
}

/// Progressively reduce quality until the image fits within the size limit.
fn reduce_size_to_fit(img: &DynamicImage, max_bytes: usize) -> Result<Vec<u8>> {
    for quality in [75, 65, 55, 45, 35, 25] {
        let data = encode_jpeg_with_quality(img, quality)?;
        if data.len() <= max_bytes {
            return Ok(data);
        }
    }
    Err(Error::invalid_input(format!(
        "thumbnail cannot be reduced below {max_bytes} bytes"
    )))
}
