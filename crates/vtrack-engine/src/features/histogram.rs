//! Histogram primitives shared by the descriptor and the gallery.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

/// Side length crops are resized to before any histogram is taken.
pub const COMPARE_SIZE: u32 = 64;

const GRAY_BINS: usize = 32;
const HUE_BINS: usize = 16;
/// Weight of the grayscale term in the combined gray+hue score.
const GRAY_WEIGHT: f64 = 0.6;

/// ITU-R BT.601 luma.
#[inline]
pub fn luma(p: &Rgb<u8>) -> u8 {
    let [r, g, b] = p.0;
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32)
        .round()
        .clamp(0.0, 255.0) as u8
}

/// HSV with hue in [0, 180) and saturation/value in [0, 255].
pub fn rgb_to_hsv(p: &Rgb<u8>) -> (f32, f32, f32) {
    let [r, g, b] = p.0.map(|c| c as f32 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue_deg = if delta <= f32::EPSILON {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let saturation = if max <= f32::EPSILON { 0.0 } else { delta / max };

    ((hue_deg / 2.0).rem_euclid(180.0), saturation * 255.0, max * 255.0)
}

/// Index of `value` in `bins` equal-width bins over `[0, range)`.
#[inline]
pub fn bin_index(value: f32, range: f32, bins: usize) -> usize {
    ((value / range * bins as f32) as usize).min(bins - 1)
}

/// Resize to the fixed comparison size.
pub fn normalize_size(img: &RgbImage) -> RgbImage {
    imageops::resize(img, COMPARE_SIZE, COMPARE_SIZE, FilterType::Triangle)
}

/// Grayscale intensity histogram.
pub fn gray_histogram(img: &RgbImage, bins: usize) -> Vec<f32> {
    let mut hist = vec![0.0; bins];
    for p in img.pixels() {
        hist[bin_index(luma(p) as f32, 256.0, bins)] += 1.0;
    }
    hist
}

/// Hue histogram.
pub fn hue_histogram(img: &RgbImage, bins: usize) -> Vec<f32> {
    let mut hist = vec![0.0; bins];
    for p in img.pixels() {
        let (h, _, _) = rgb_to_hsv(p);
        hist[bin_index(h, 180.0, bins)] += 1.0;
    }
    hist
}

/// Pearson correlation of two equal-length vectors, in [-1, 1].
///
/// When either side has no variance the result is 1.0 for identical inputs
/// and 0.0 otherwise.
pub fn correlation(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let n = a.len() as f64;
    let mean_a = a.iter().map(|&v| v as f64).sum::<f64>() / n;
    let mean_b = b.iter().map(|&v| v as f64).sum::<f64>() / n;

    let (mut num, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (&x, &y) in a.iter().zip(b) {
        let dx = x as f64 - mean_a;
        let dy = y as f64 - mean_b;
        num += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom <= f64::EPSILON {
        return if a == b { 1.0 } else { 0.0 };
    }
    (num / denom).clamp(-1.0, 1.0)
}

/// Cheap appearance signature used for gallery deduplication.
#[derive(Debug, Clone, PartialEq)]
pub struct CropSignature {
    gray: Vec<f32>,
    hue: Vec<f32>,
}

/// Scores from comparing two signatures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropSimilarity {
    /// Grayscale histogram correlation
    pub gray: f64,
    /// Hue histogram correlation
    pub hue: f64,
}

impl CropSimilarity {
    /// Weighted gray+hue score.
    pub fn combined(&self) -> f64 {
        GRAY_WEIGHT * self.gray + (1.0 - GRAY_WEIGHT) * self.hue
    }

    /// Near-duplicate test: the gray score alone clears `threshold`, or the
    /// combined score clears `threshold * secondary_ratio`.
    pub fn is_duplicate(&self, threshold: f64, secondary_ratio: f64) -> bool {
        self.gray > threshold || self.combined() > threshold * secondary_ratio
    }
}

impl CropSignature {
    pub fn from_crop(crop: &RgbImage) -> Self {
        let small = normalize_size(crop);
        Self {
            gray: gray_histogram(&small, GRAY_BINS),
            hue: hue_histogram(&small, HUE_BINS),
        }
    }

    pub fn compare(&self, other: &CropSignature) -> CropSimilarity {
        CropSimilarity {
            gray: correlation(&self.gray, &other.gray),
            hue: correlation(&self.hue, &other.hue),
        }
    }
}
