mod color;
mod glyph;

use image::RgbImage;
use image::imageops::crop_imm;
use std::sync::Arc;
use tracing::debug;

use crate::model::{
    FontCategory, FontWeight, HEADLINE_MIN_PT, MAX_FONT_PT, MIN_FONT_PT, TextFragment, TextStyle,
};

pub use color::{ColorEstimator, MinorityClusterColor};

use glyph::{GlyphMask, VisualFeatures, estimate_weight};

/// Height of the output canvas in points (7.5 in).
pub const CANVAS_HEIGHT_PT: f64 = 540.0;

/// Infers font category, weight, colour and size for recognized fragments.
#[derive(Clone)]
pub struct StyleMapper {
    color: Arc<dyn ColorEstimator>,
    visual_classifier: bool,
}

impl Default for StyleMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleMapper {
    pub fn new() -> Self {
        Self {
            color: Arc::new(MinorityClusterColor),
            visual_classifier: false,
        }
    }

    pub fn with_color_estimator(mut self, estimator: Arc<dyn ColorEstimator>) -> Self {
        self.color = estimator;
        self
    }

    /// Lets glyph-shape features pick script or rounded faces for body text.
    pub fn with_visual_classifier(mut self, enabled: bool) -> Self {
        self.visual_classifier = enabled;
        self
    }

    pub fn map(&self, fragment: TextFragment, crop: &RgbImage, slide_pixel_height: u32) -> TextFragment {
        let size_pt = font_size_pt(fragment.bbox().h, slide_pixel_height);
        let glyphs = GlyphMask::from_crop(crop);
        let weight = glyphs.as_ref().map_or(FontWeight::Regular, estimate_weight);
        let category = if size_pt >= HEADLINE_MIN_PT {
            FontCategory::Sans
        } else {
            match (&glyphs, self.visual_classifier) {
                (Some(glyphs), true) => body_category(VisualFeatures::measure(glyphs).category()),
                _ => FontCategory::Serif,
            }
        };
        let style = TextStyle {
            category,
            weight,
            size_pt,
            color: self.color.estimate(crop),
        };
        debug!(
            "style '{}': {} {:?} {}pt #{}",
            fragment.text(),
            category.as_str(),
            weight,
            size_pt,
            style.color.hex()
        );
        fragment.with_style(style)
    }

    /// Maps every fragment of a slide, cropping each from `image`.
    pub fn map_slide(&self, image: &RgbImage, fragments: Vec<TextFragment>) -> Vec<TextFragment> {
        fragments
            .into_iter()
            .map(|fragment| {
                let bbox = fragment.bbox().clamp_to(image.width(), image.height());
                let crop = crop_imm(image, bbox.x, bbox.y, bbox.w, bbox.h).to_image();
                self.map(fragment, &crop, image.height())
            })
            .collect()
    }
}

/// Body text never becomes the headline face; sans results fall back to serif.
fn body_category(visual: FontCategory) -> FontCategory {
    match visual {
        FontCategory::Script | FontCategory::Rounded => visual,
        _ => FontCategory::Serif,
    }
}

/// `floor(bbox_h / image_h * 540)`, clamped to the supported point range.
pub fn font_size_pt(bbox_height: u32, image_height: u32) -> u32 {
    if image_height == 0 {
        return MIN_FONT_PT;
    }
    let size = (bbox_height as f64 / image_height as f64 * CANVAS_HEIGHT_PT).floor();
    (size as u32).clamp(MIN_FONT_PT, MAX_FONT_PT)
}
