use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{BorderType, find_contours};
use imageproc::contrast::otsu_level;
use imageproc::distance_transform::euclidean_squared_distance_transform;
use imageproc::geometry::{approximate_polygon_dp, arc_length};

use crate::model::{FontCategory, FontWeight};

const FOREGROUND: u8 = 255;
/// Contours shorter than this are specks, not strokes.
const MIN_CONTOUR_PERIMETER: f64 = 10.0;
const POLYGON_EPSILON_RATIO: f64 = 0.02;

/// Otsu split of a text crop. The smaller side is taken as the glyphs, which
/// holds for both dark-on-light and light-on-dark text.
#[derive(Debug, Clone)]
pub(crate) struct GlyphMask {
    pub(crate) mask: GrayImage,
}

impl GlyphMask {
    pub(crate) fn from_crop(crop: &RgbImage) -> Option<GlyphMask> {
        let gray = luma(crop);
        let level = otsu_level(&gray);
        let dark = gray.pixels().filter(|pixel| pixel[0] <= level).count();
        let total = gray.pixels().len();
        if dark == 0 || dark == total {
            return None;
        }
        let dark_is_glyph = dark * 2 <= total;
        let mut mask = GrayImage::new(gray.width(), gray.height());
        for (x, y, pixel) in gray.enumerate_pixels() {
            let is_dark = pixel[0] <= level;
            if is_dark == dark_is_glyph {
                mask.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
        Some(GlyphMask { mask })
    }

    pub(crate) fn is_glyph(&self, x: u32, y: u32) -> bool {
        self.mask.get_pixel(x, y)[0] == FOREGROUND
    }

    /// Distance from every glyph pixel to the nearest non-glyph pixel.
    pub(crate) fn stroke_distances(&self) -> Vec<f64> {
        let mut background = GrayImage::new(self.mask.width(), self.mask.height());
        for (x, y, pixel) in self.mask.enumerate_pixels() {
            if pixel[0] != FOREGROUND {
                background.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
        let squared = euclidean_squared_distance_transform(&background);
        self.mask
            .enumerate_pixels()
            .filter(|(_, _, pixel)| pixel[0] == FOREGROUND)
            .map(|(x, y, _)| squared.get_pixel(x, y)[0].sqrt())
            .filter(|distance| distance.is_finite())
            .collect()
    }

    /// Height of the bounding box around all glyph pixels.
    pub(crate) fn glyph_height(&self) -> u32 {
        let mut top = None;
        let mut bottom = 0;
        for (_, y, pixel) in self.mask.enumerate_pixels() {
            if pixel[0] == FOREGROUND {
                top = Some(top.map_or(y, |top: u32| top.min(y)));
                bottom = bottom.max(y);
            }
        }
        top.map_or(0, |top| bottom - top + 1)
    }

    /// Ratio of approximated-polygon perimeter to raw contour perimeter over the
    /// outer contours. Close to 1 means smooth, rounded outlines.
    pub(crate) fn edge_smoothness(&self) -> f64 {
        let mut total = 0.0;
        let mut approximated = 0.0;
        for contour in find_contours::<u32>(&self.mask) {
            if !matches!(contour.border_type, BorderType::Outer) || contour.parent.is_some() {
                continue;
            }
            let perimeter = arc_length(&contour.points, true);
            if perimeter < MIN_CONTOUR_PERIMETER {
                continue;
            }
            let polygon =
                approximate_polygon_dp(&contour.points, POLYGON_EPSILON_RATIO * perimeter, true);
            total += perimeter;
            approximated += arc_length(&polygon, true);
        }
        if total == 0.0 { 0.0 } else { approximated / total }
    }
}

fn luma(crop: &RgbImage) -> GrayImage {
    let mut gray = GrayImage::new(crop.width(), crop.height());
    for (x, y, pixel) in crop.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let value = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8;
        gray.put_pixel(x, y, Luma([value]));
    }
    gray
}

pub(crate) fn estimate_weight(glyphs: &GlyphMask) -> FontWeight {
    let height = glyphs.glyph_height();
    let mut distances = glyphs.stroke_distances();
    if height == 0 || distances.is_empty() {
        return FontWeight::Regular;
    }
    distances.sort_by(f64::total_cmp);
    let median = distances[distances.len() / 2];
    weight_from_ratio(median / height as f64)
}

pub(crate) fn weight_from_ratio(ratio: f64) -> FontWeight {
    if ratio < 0.08 {
        FontWeight::Light
    } else if ratio < 0.12 {
        FontWeight::Regular
    } else if ratio < 0.16 {
        FontWeight::Medium
    } else {
        FontWeight::Bold
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct VisualFeatures {
    /// Coefficient of variation of stroke thickness.
    pub(crate) stroke_variance: f64,
    pub(crate) edge_smoothness: f64,
}

impl VisualFeatures {
    pub(crate) fn measure(glyphs: &GlyphMask) -> VisualFeatures {
        let distances = glyphs.stroke_distances();
        let stroke_variance = if distances.is_empty() {
            0.0
        } else {
            let count = distances.len() as f64;
            let mean = distances.iter().sum::<f64>() / count;
            let variance = distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / count;
            if mean == 0.0 { 0.0 } else { variance.sqrt() / mean }
        };
        VisualFeatures {
            stroke_variance,
            edge_smoothness: glyphs.edge_smoothness(),
        }
    }

    pub(crate) fn category(&self) -> FontCategory {
        if self.stroke_variance > 0.3 {
            FontCategory::Serif
        } else if self.edge_smoothness > 0.95 {
            FontCategory::Rounded
        } else if self.edge_smoothness < 0.8 && self.stroke_variance > 0.15 {
            FontCategory::Script
        } else {
            FontCategory::Sans
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn bars(width: u32, height: u32, bar_width: u32, ink: [u8; 3], paper: [u8; 3]) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| {
            if (10..10 + bar_width).contains(&x) {
                Rgb(ink)
            } else {
                Rgb(paper)
            }
        })
    }

    #[test]
    fn minority_side_is_the_glyph() {
        let dark_text = GlyphMask::from_crop(&bars(80, 40, 6, [0, 0, 0], [255, 255, 255])).unwrap();
        let glyph_pixels = dark_text.mask.pixels().filter(|pixel| pixel[0] == FOREGROUND).count();
        assert_eq!(glyph_pixels, 6 * 40);
        assert!(dark_text.is_glyph(12, 5));

        let light_text =
            GlyphMask::from_crop(&bars(80, 40, 6, [250, 250, 250], [10, 20, 60])).unwrap();
        assert!(light_text.is_glyph(12, 5));
        assert!(!light_text.is_glyph(50, 5));
    }

    #[test]
    fn uniform_crop_has_no_glyphs() {
        let flat = RgbImage::from_pixel(20, 10, Rgb([200, 200, 200]));
        assert!(GlyphMask::from_crop(&flat).is_none());
    }

    #[test]
    fn thicker_strokes_weigh_more() {
        let thin = GlyphMask::from_crop(&bars(80, 40, 2, [0, 0, 0], [255, 255, 255])).unwrap();
        let thick = GlyphMask::from_crop(&bars(80, 40, 30, [0, 0, 0], [255, 255, 255])).unwrap();
        assert_eq!(estimate_weight(&thin), FontWeight::Light);
        assert_eq!(estimate_weight(&thick), FontWeight::Bold);
        assert_eq!(thick.glyph_height(), 40);
    }

    #[test]
    fn weight_thresholds() {
        assert_eq!(weight_from_ratio(0.05), FontWeight::Light);
        assert_eq!(weight_from_ratio(0.1), FontWeight::Regular);
        assert_eq!(weight_from_ratio(0.15), FontWeight::Medium);
        assert_eq!(weight_from_ratio(0.2), FontWeight::Bold);
    }

    #[test]
    fn feature_categories() {
        let features = |stroke_variance, edge_smoothness| VisualFeatures {
            stroke_variance,
            edge_smoothness,
        };
        assert_eq!(features(0.4, 0.9).category(), FontCategory::Serif);
        assert_eq!(features(0.1, 0.97).category(), FontCategory::Rounded);
        assert_eq!(features(0.2, 0.7).category(), FontCategory::Script);
        assert_eq!(features(0.1, 0.85).category(), FontCategory::Sans);
    }

    #[test]
    fn measures_a_solid_block() {
        let mut crop = RgbImage::from_pixel(40, 40, Rgb([255, 255, 255]));
        for y in 10..30 {
            for x in 10..30 {
                crop.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        let glyphs = GlyphMask::from_crop(&crop).unwrap();
        let features = VisualFeatures::measure(&glyphs);
        assert!(features.stroke_variance > 0.0);
        assert!(features.edge_smoothness > 0.9);
    }
}
