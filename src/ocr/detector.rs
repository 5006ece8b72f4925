use image::DynamicImage;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::StageError;
use crate::model::TextFragment;
use crate::text::{char_count, is_cjk, is_symbol_only};

use super::prepare::{OcrLimits, prepare_image, restore_bbox};
use super::OcrBackend;

/// Floor applied to one-CJK-character and two-character runs.
const SHORT_RUN_MIN_CONFIDENCE: f32 = 0.5;

#[derive(Clone)]
pub struct TextDetector {
    backend: Arc<dyn OcrBackend>,
    limits: OcrLimits,
}

impl TextDetector {
    pub fn new(backend: Arc<dyn OcrBackend>) -> Self {
        Self {
            backend,
            limits: OcrLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: OcrLimits) -> Self {
        self.limits = limits;
        self
    }

    pub async fn detect(&self, path: &Path, threshold: f32) -> Result<Vec<TextFragment>, StageError> {
        let image = image::open(path).map_err(StageError::image)?;
        self.detect_image(&image, threshold).await
    }

    pub async fn detect_image(
        &self,
        image: &DynamicImage,
        threshold: f32,
    ) -> Result<Vec<TextFragment>, StageError> {
        let (width, height) = (image.width(), image.height());
        let prepared = prepare_image(image, &self.limits)?;
        let runs = self.backend.recognize(&prepared).await?;
        info!("{} returned {} runs", self.backend.name(), runs.len());

        let mut fragments = Vec::new();
        for run in runs {
            let text = run.text.trim();
            if !keep_run(text, run.confidence, threshold) {
                debug!("drop run '{}' (conf {:.3})", text, run.confidence);
                continue;
            }
            let bbox = restore_bbox(&run, prepared.scale, width, height);
            if bbox.is_empty() {
                continue;
            }
            fragments.push(TextFragment::new(text, bbox, run.confidence));
        }
        Ok(fragments)
    }
}

/// Post-filter for OCR runs. Short runs on graphic-heavy slides are mostly noise,
/// so they need more than the general threshold.
pub(crate) fn keep_run(text: &str, confidence: f32, threshold: f32) -> bool {
    if text.is_empty() || confidence < threshold {
        return false;
    }
    if is_symbol_only(text) {
        return false;
    }
    match char_count(text) {
        1 => text.chars().next().is_some_and(is_cjk) && confidence >= SHORT_RUN_MIN_CONFIDENCE,
        2 => confidence >= SHORT_RUN_MIN_CONFIDENCE,
        _ => true,
    }
}
