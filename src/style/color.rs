use image::RgbImage;

use crate::model::Rgb;

use super::glyph::GlyphMask;

const MAX_ITERATIONS: usize = 20;
/// Stop once no centroid moves further than this (squared, in RGB units).
const CONVERGENCE_EPSILON: f32 = 0.25;

/// Picks the text colour of a tight text crop.
pub trait ColorEstimator: Send + Sync {
    fn estimate(&self, crop: &RgbImage) -> Rgb;
}

/// Two-means clustering of the crop's colours, seeded from the Otsu split.
/// The cluster with fewer members is the text, whichever of the two is darker.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinorityClusterColor;

impl ColorEstimator for MinorityClusterColor {
    fn estimate(&self, crop: &RgbImage) -> Rgb {
        let pixels: Vec<[f32; 3]> = crop
            .pixels()
            .map(|pixel| pixel.0.map(|channel| channel as f32))
            .collect();
        if pixels.is_empty() {
            return Rgb::BLACK;
        }
        let Some(glyphs) = GlyphMask::from_crop(crop) else {
            return to_rgb(mean(pixels.iter()));
        };

        let width = crop.width();
        let is_glyph = |idx: usize| glyphs.is_glyph(idx as u32 % width, idx as u32 / width);
        let mut centroids = [
            mean(pixels.iter().enumerate().filter(|(idx, _)| is_glyph(*idx)).map(|(_, p)| p)),
            mean(pixels.iter().enumerate().filter(|(idx, _)| !is_glyph(*idx)).map(|(_, p)| p)),
        ];

        let (centroids, counts) = two_means(&pixels, &mut centroids);
        let text = if counts[0] <= counts[1] { centroids[0] } else { centroids[1] };
        to_rgb(text)
    }
}

fn two_means(pixels: &[[f32; 3]], centroids: &mut [[f32; 3]; 2]) -> ([[f32; 3]; 2], [usize; 2]) {
    let mut counts = [0usize; 2];
    for _ in 0..MAX_ITERATIONS {
        let mut sums = [[0.0f32; 3]; 2];
        counts = [0; 2];
        for pixel in pixels {
            let cluster = usize::from(
                squared_distance(pixel, &centroids[1]) < squared_distance(pixel, &centroids[0]),
            );
            counts[cluster] += 1;
            for channel in 0..3 {
                sums[cluster][channel] += pixel[channel];
            }
        }
        let mut shift = 0.0f32;
        for cluster in 0..2 {
            if counts[cluster] == 0 {
                continue;
            }
            let updated = sums[cluster].map(|sum| sum / counts[cluster] as f32);
            shift = shift.max(squared_distance(&updated, &centroids[cluster]));
            centroids[cluster] = updated;
        }
        if shift < CONVERGENCE_EPSILON {
            break;
        }
    }
    (*centroids, counts)
}

fn squared_distance(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

fn mean<'a>(pixels: impl Iterator<Item = &'a [f32; 3]>) -> [f32; 3] {
    let mut sum = [0.0f32; 3];
    let mut count = 0usize;
    for pixel in pixels {
        for channel in 0..3 {
            sum[channel] += pixel[channel];
        }
        count += 1;
    }
    if count == 0 {
        return sum;
    }
    sum.map(|value| value / count as f32)
}

fn to_rgb(color: [f32; 3]) -> Rgb {
    Rgb(color.map(|channel| channel.round().clamp(0.0, 255.0) as u8))
}
