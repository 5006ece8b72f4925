use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use tracing::info;

use crate::error::StageError;
use crate::model::BBoxPx;

use super::RawTextRun;

const START_QUALITY: u8 = 85;
const MIN_QUALITY: u8 = 30;
const QUALITY_STEP: u8 = 10;

/// Provider-side limits on what an OCR request may carry.
#[derive(Debug, Clone, Copy)]
pub struct OcrLimits {
    pub max_dimension: u32,
    pub max_payload_bytes: usize,
}

impl Default for OcrLimits {
    fn default() -> Self {
        Self {
            max_dimension: 4096,
            max_payload_bytes: 4 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub jpeg: Vec<u8>,
    pub base64: String,
    pub width: u32,
    pub height: u32,
    /// Factor applied to the source dimensions (`<= 1.0`).
    pub scale: f64,
    pub quality: u8,
}

pub fn prepare_image(image: &DynamicImage, limits: &OcrLimits) -> Result<PreparedImage, StageError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(StageError::Image("image has zero size".to_string()));
    }
    let max_side = width.max(height);
    let max_dimension = limits.max_dimension.max(1);

    let (scale, resized) = if max_side > max_dimension {
        let scale = max_dimension as f64 / max_side as f64;
        let new_width = ((width as f64 * scale) as u32).max(1);
        let new_height = ((height as f64 * scale) as u32).max(1);
        info!(
            "ocr downscale: {}x{} -> {}x{} (scale={:.3})",
            width, height, new_width, new_height, scale
        );
        (
            scale,
            image.resize_exact(new_width, new_height, FilterType::Lanczos3),
        )
    } else {
        (1.0, image.clone())
    };

    let rgb = resized.to_rgb8();
    let mut quality = START_QUALITY;
    let mut jpeg = encode_jpeg(&rgb, quality)?;
    while encoded_len(jpeg.len()) > limits.max_payload_bytes && quality > MIN_QUALITY {
        quality -= QUALITY_STEP;
        jpeg = encode_jpeg(&rgb, quality)?;
        info!("ocr recompress: quality={}, size={}", quality, jpeg.len());
    }

    let base64 = BASE64.encode(&jpeg);
    Ok(PreparedImage {
        jpeg,
        base64,
        width: rgb.width(),
        height: rgb.height(),
        scale,
        quality,
    })
}

fn encode_jpeg(rgb: &image::RgbImage, quality: u8) -> Result<Vec<u8>, StageError> {
    let mut buffer = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
        encoder.encode_image(rgb).map_err(StageError::image)?;
    }
    Ok(buffer)
}

fn encoded_len(raw: usize) -> usize {
    raw.div_ceil(3) * 4
}

/// Maps a run from prepared-image space back onto the source image.
pub(crate) fn restore_bbox(run: &RawTextRun, scale: f64, width: u32, height: u32) -> BBoxPx {
    let scale = if scale > 0.0 { scale } else { 1.0 };
    let restore = |value: f64| (value.max(0.0) / scale).round() as u32;
    BBoxPx::new(
        restore(run.left),
        restore(run.top),
        restore(run.width),
        restore(run.height),
    )
    .clamp_to(width, height)
}
