//! Output image formats for rendered tiles.

use crate::png;
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tile_common::TileError;

pub const DEFAULT_QUALITY: u8 = 90;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Pixel buffer has {actual} bytes, expected {expected}")]
    InvalidBuffer { expected: usize, actual: usize },

    #[error("Compression failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("JPEG encoding failed: {0}")]
    Jpeg(#[from] image::ImageError),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
}

impl From<EncodeError> for TileError {
    fn from(err: EncodeError) -> Self {
        TileError::TileGenerationError(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Webp => "webp",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" | "image/png" => Ok(ImageFormat::Png),
            "jpg" | "jpeg" | "image/jpeg" => Ok(ImageFormat::Jpeg),
            "webp" | "image/webp" => Ok(ImageFormat::Webp),
            other => Err(EncodeError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Encode an RGBA8 buffer. `quality` (1..=100) applies to JPEG and WebP.
pub fn encode(
    pixels: &[u8],
    width: usize,
    height: usize,
    format: ImageFormat,
    quality: u8,
) -> Result<Vec<u8>, EncodeError> {
    let expected = width * height * 4;
    if pixels.len() != expected {
        return Err(EncodeError::InvalidBuffer {
            expected,
            actual: pixels.len(),
        });
    }
    let quality = quality.clamp(1, 100);

    match format {
        ImageFormat::Png => png::encode_png(pixels, width, height),
        ImageFormat::Jpeg => encode_jpeg(pixels, width, height, quality),
        ImageFormat::Webp => Ok(encode_webp(pixels, width, height, quality)),
    }
}

/// JPEG has no alpha channel, so pixels are composited onto white first.
fn encode_jpeg(
    pixels: &[u8],
    width: usize,
    height: usize,
    quality: u8,
) -> Result<Vec<u8>, EncodeError> {
    let rgb: Vec<u8> = pixels
        .chunks_exact(4)
        .flat_map(|px| {
            let alpha = f32::from(px[3]) / 255.0;
            let blend = |c: u8| (f32::from(c) * alpha + 255.0 * (1.0 - alpha)).round() as u8;
            [blend(px[0]), blend(px[1]), blend(px[2])]
        })
        .collect();

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).encode(
        &rgb,
        width as u32,
        height as u32,
        ColorType::Rgb8,
    )?;
    Ok(out)
}

fn encode_webp(pixels: &[u8], width: usize, height: usize, quality: u8) -> Vec<u8> {
    webp::Encoder::from_rgba(pixels, width as u32, height as u32)
        .encode(f32::from(quality))
        .to_vec()
}
