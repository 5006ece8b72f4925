use image::{Rgb, RgbImage};
use tracing::debug;

use crate::model::BBoxPx;

const MIN_PADDING: u32 = 3;
const MAX_PADDING: u32 = 15;
const PADDING_RATIO: f64 = 0.15;
const SAMPLE_WIDTH: u32 = 15;
/// Samples further than this from the median (any channel) are outliers.
const OUTLIER_DISTANCE: f32 = 50.0;
/// Outlier rejection only applies when more samples than this survive it.
const MIN_INLIERS: usize = 10;
const UNIFORM_STD: f32 = 40.0;
const CENTER_MARGIN: u32 = 2;
const INPAINT_RADIUS: i64 = 3;

/// Erases text from a slide bitmap so editable text can be laid over it.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackgroundCleaner;

/// Padded erase region for one text box, in image coordinates (exclusive end).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EraseRegion {
    pub(crate) x1: u32,
    pub(crate) y1: u32,
    pub(crate) x2: u32,
    pub(crate) y2: u32,
}

impl EraseRegion {
    pub(crate) fn around(bbox: BBoxPx, width: u32, height: u32) -> EraseRegion {
        let padding = padding_for(bbox.h);
        EraseRegion {
            x1: bbox.x.saturating_sub(padding),
            y1: bbox.y.saturating_sub(padding),
            x2: bbox.right().saturating_add(padding).min(width),
            y2: bbox.bottom().saturating_add(padding).min(height),
        }
    }

    pub(crate) fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x1 && x < self.x2 && y >= self.y1 && y < self.y2
    }

    fn is_empty(&self) -> bool {
        self.x1 >= self.x2 || self.y1 >= self.y2
    }

    fn interior(&self) -> Option<EraseRegion> {
        let inner = EraseRegion {
            x1: self.x1 + CENTER_MARGIN,
            y1: self.y1 + CENTER_MARGIN,
            x2: self.x2.saturating_sub(CENTER_MARGIN),
            y2: self.y2.saturating_sub(CENTER_MARGIN),
        };
        (!inner.is_empty()).then_some(inner)
    }
}

pub(crate) fn padding_for(bbox_height: u32) -> u32 {
    ((bbox_height as f64 * PADDING_RATIO) as u32).clamp(MIN_PADDING, MAX_PADDING)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Surround {
    median: [u8; 3],
    uniform: bool,
}

impl BackgroundCleaner {
    pub fn new() -> Self {
        Self
    }

    /// Returns a new bitmap with every box erased. Pixels outside all padded
    /// boxes are copied unchanged.
    pub fn clean(&self, image: &RgbImage, bboxes: &[BBoxPx]) -> RgbImage {
        let mut result = image.clone();
        let (width, height) = image.dimensions();
        for bbox in bboxes {
            let region = EraseRegion::around(*bbox, width, height);
            if region.is_empty() {
                continue;
            }
            let surround = sample_surround(image, &region);
            let fill = Rgb(surround.median);
            if surround.uniform {
                fill_region(&mut result, &region, fill);
                continue;
            }
            debug!("textured background around {:?}, inpainting edge", bbox);
            match region.interior() {
                Some(interior) => {
                    fill_region(&mut result, &interior, fill);
                    inpaint_ring(&mut result, &region, Some(&interior));
                }
                None => inpaint_ring(&mut result, &region, None),
            }
        }
        result
    }
}

fn fill_region(image: &mut RgbImage, region: &EraseRegion, color: Rgb<u8>) {
    for y in region.y1..region.y2 {
        for x in region.x1..region.x2 {
            image.put_pixel(x, y, color);
        }
    }
}

/// Samples strips just outside the padded region, clipped to the image.
fn sample_surround(image: &RgbImage, region: &EraseRegion) -> Surround {
    let (width, height) = image.dimensions();
    let mut samples: Vec<[u8; 3]> = Vec::new();
    let mut take = |x1: u32, y1: u32, x2: u32, y2: u32| {
        for y in y1..y2.min(height) {
            for x in x1..x2.min(width) {
                samples.push(image.get_pixel(x, y).0);
            }
        }
    };
    take(region.x1, region.y1.saturating_sub(SAMPLE_WIDTH), region.x2, region.y1);
    take(region.x1, region.y2, region.x2, region.y2.saturating_add(SAMPLE_WIDTH));
    take(region.x1.saturating_sub(SAMPLE_WIDTH), region.y1, region.x1, region.y2);
    take(region.x2, region.y1, region.x2.saturating_add(SAMPLE_WIDTH), region.y2);

    if samples.is_empty() {
        return Surround {
            median: [255, 255, 255],
            uniform: true,
        };
    }
    let median = channel_median(&samples);
    let inliers: Vec<[u8; 3]> = samples
        .iter()
        .copied()
        .filter(|sample| {
            (0..3).all(|c| (sample[c] as f32 - median[c] as f32).abs() < OUTLIER_DISTANCE)
        })
        .collect();
    let spread = if inliers.len() > MIN_INLIERS {
        channel_std(&inliers)
    } else {
        channel_std(&samples)
    };
    Surround {
        median,
        uniform: spread.iter().all(|std| *std < UNIFORM_STD),
    }
}

fn channel_median(samples: &[[u8; 3]]) -> [u8; 3] {
    let mut median = [0u8; 3];
    for (channel, out) in median.iter_mut().enumerate() {
        let mut values: Vec<u8> = samples.iter().map(|sample| sample[channel]).collect();
        values.sort_unstable();
        let mid = values.len() / 2;
        *out = if values.len() % 2 == 0 {
            ((values[mid - 1] as u16 + values[mid] as u16) / 2) as u8
        } else {
            values[mid]
        };
    }
    median
}

fn channel_std(samples: &[[u8; 3]]) -> [f32; 3] {
    let count = samples.len() as f32;
    let mut std = [0.0f32; 3];
    for (channel, out) in std.iter_mut().enumerate() {
        let mean = samples.iter().map(|s| s[channel] as f32).sum::<f32>() / count;
        let variance = samples
            .iter()
            .map(|s| (s[channel] as f32 - mean).powi(2))
            .sum::<f32>()
            / count;
        *out = variance.sqrt();
    }
    std
}

/// Fills the ring between `region` and `interior` from the outside in. Each pass
/// resolves the unknown pixels touching known ones with a distance-weighted
/// average of the known pixels within the inpaint radius.
fn inpaint_ring(image: &mut RgbImage, region: &EraseRegion, interior: Option<&EraseRegion>) {
    let in_ring =
        |x: u32, y: u32| region.contains(x, y) && !interior.is_some_and(|inner| inner.contains(x, y));
    let region_width = (region.x2 - region.x1) as usize;
    let mut unknown = vec![false; region_width * (region.y2 - region.y1) as usize];
    let index = |x: u32, y: u32| (y - region.y1) as usize * region_width + (x - region.x1) as usize;
    for y in region.y1..region.y2 {
        for x in region.x1..region.x2 {
            if in_ring(x, y) {
                unknown[index(x, y)] = true;
            }
        }
    }

    let (width, height) = image.dimensions();
    let is_known = |unknown: &[bool], x: i64, y: i64| {
        if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
            return false;
        }
        let (x, y) = (x as u32, y as u32);
        !region.contains(x, y) || !unknown[index(x, y)]
    };

    loop {
        let mut front = Vec::new();
        for y in region.y1..region.y2 {
            for x in region.x1..region.x2 {
                if !unknown[index(x, y)] {
                    continue;
                }
                let touches_known = (-1..=1i64).any(|dy| {
                    (-1..=1i64).any(|dx| {
                        (dx, dy) != (0, 0) && is_known(&unknown, x as i64 + dx, y as i64 + dy)
                    })
                });
                if touches_known {
                    front.push((x, y));
                }
            }
        }
        if front.is_empty() {
            break;
        }
        let mut resolved = Vec::with_capacity(front.len());
        for &(x, y) in &front {
            let mut sum = [0.0f64; 3];
            let mut total = 0.0f64;
            for dy in -INPAINT_RADIUS..=INPAINT_RADIUS {
                for dx in -INPAINT_RADIUS..=INPAINT_RADIUS {
                    let distance_sq = (dx * dx + dy * dy) as f64;
                    if distance_sq == 0.0 || distance_sq > (INPAINT_RADIUS * INPAINT_RADIUS) as f64 {
                        continue;
                    }
                    let (nx, ny) = (x as i64 + dx, y as i64 + dy);
                    if !is_known(&unknown, nx, ny) {
                        continue;
                    }
                    let weight = 1.0 / distance_sq;
                    let pixel = image.get_pixel(nx as u32, ny as u32).0;
                    for c in 0..3 {
                        sum[c] += pixel[c] as f64 * weight;
                    }
                    total += weight;
                }
            }
            let value = sum.map(|channel| (channel / total).round().clamp(0.0, 255.0) as u8);
            resolved.push((x, y, value));
        }
        for (x, y, value) in resolved {
            image.put_pixel(x, y, Rgb(value));
            unknown[index(x, y)] = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                (x * 255 / width) as u8,
                (y * 255 / height) as u8,
                ((x * 7 + y * 13) % 256) as u8,
            ])
        })
    }

    fn draw_text(image: &mut RgbImage, bbox: BBoxPx, ink: [u8; 3]) {
        for y in bbox.y..bbox.bottom() {
            for x in bbox.x..bbox.right() {
                if x % 4 < 2 {
                    image.put_pixel(x, y, Rgb(ink));
                }
            }
        }
    }

    #[test]
    fn padding_scales_with_height() {
        assert_eq!(padding_for(10), 3);
        assert_eq!(padding_for(60), 9);
        assert_eq!(padding_for(400), 15);
    }

    #[test]
    fn no_boxes_is_an_identical_copy() {
        let image = gradient(64, 48);
        assert_eq!(BackgroundCleaner::new().clean(&image, &[]), image);
    }

    #[test]
    fn uniform_background_is_flat_filled() {
        let mut image = RgbImage::from_pixel(200, 100, Rgb([240, 240, 230]));
        let bbox = BBoxPx::new(40, 40, 100, 20);
        draw_text(&mut image, bbox, [10, 10, 10]);
        let cleaned = BackgroundCleaner::new().clean(&image, &[bbox]);
        assert!(cleaned.pixels().all(|pixel| pixel.0 == [240, 240, 230]));
    }

    #[test]
    fn pixels_outside_padded_boxes_are_untouched() {
        let mut image = gradient(240, 160);
        let boxes = [BBoxPx::new(20, 20, 80, 24), BBoxPx::new(120, 100, 100, 40)];
        for bbox in boxes {
            draw_text(&mut image, bbox, [255, 255, 255]);
        }
        let cleaned = BackgroundCleaner::new().clean(&image, &boxes);
        let regions: Vec<_> = boxes
            .iter()
            .map(|bbox| EraseRegion::around(*bbox, image.width(), image.height()))
            .collect();
        for (x, y, pixel) in image.enumerate_pixels() {
            if !regions.iter().any(|region| region.contains(x, y)) {
                assert_eq!(cleaned.get_pixel(x, y), pixel, "changed at {},{}", x, y);
            }
        }
    }

    #[test]
    fn textured_background_removes_the_ink() {
        let mut image = RgbImage::from_fn(120, 80, |x, y| {
            if (x / 3 + y / 3) % 2 == 0 { Rgb([0, 0, 0]) } else { Rgb([200, 200, 200]) }
        });
        let bbox = BBoxPx::new(30, 30, 60, 20);
        draw_text(&mut image, bbox, [255, 0, 0]);
        let cleaned = BackgroundCleaner::new().clean(&image, &[bbox]);
        let region = EraseRegion::around(bbox, 120, 80);
        for y in region.y1..region.y2 {
            for x in region.x1..region.x2 {
                assert_ne!(cleaned.get_pixel(x, y).0, [255, 0, 0]);
            }
        }
    }

    #[test]
    fn boxes_at_the_image_edge_are_clipped() {
        let image = gradient(50, 30);
        let cleaned = BackgroundCleaner::new().clean(&image, &[BBoxPx::new(40, 20, 30, 30)]);
        assert_eq!(cleaned.dimensions(), image.dimensions());
    }
}
