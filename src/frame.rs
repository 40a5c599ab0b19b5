//! Frame container and preprocessing.
//!
//! The ingest layer produces [`Frame`] values; everything downstream
//! (classifiers, renderer, stream encoder) works on them. Preprocessing for
//! the background-subtraction strategy (grayscale + blur) lives here so the
//! captured reference frame and every compared frame go through exactly the
//! same pipeline.

use std::io::Cursor;
use std::time::SystemTime;

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, RgbImage};
use imageproc::filter::gaussian_blur_f32;

/// Blur applied before differencing. Approximates the original pipeline's
/// 21x21 Gaussian kernel.
pub const BLUR_SIGMA: f32 = 3.5;

/// JPEG quality used for the rendered preview stream.
pub const STREAM_JPEG_QUALITY: u8 = 80;

/// One captured video frame.
pub struct Frame {
    pub image: RgbImage,
    pub captured_at: SystemTime,
}

impl Frame {
    pub fn new(image: RgbImage, captured_at: SystemTime) -> Self {
        Self { image, captured_at }
    }

    /// Decode a JPEG frame as delivered by HTTP camera sources.
    pub fn from_jpeg(bytes: &[u8], captured_at: SystemTime) -> Result<Self> {
        let image = image::load_from_memory(bytes)
            .context("decode jpeg frame")?
            .into_rgb8();
        Ok(Self::new(image, captured_at))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Grayscale, blurred rendition used for background subtraction.
    pub fn grayscale_blurred(&self) -> GrayImage {
        let gray = image::imageops::grayscale(&self.image);
        gaussian_blur_f32(&gray, BLUR_SIGMA)
    }
}

/// Encode an (annotated) image for the MJPEG preview stream.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(Cursor::new(&mut bytes), quality);
    encoder.encode_image(image).context("encode jpeg frame")?;
    Ok(bytes)
}
