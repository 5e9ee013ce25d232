//! Handcrafted appearance descriptor.
//!
//! Layout of the 379-element vector, each block normalized to unit sum
//! before the whole vector is L2-normalized:
//!
//! | block | bins | source |
//! |-------|------|--------|
//! | LBP texture | 256 | 8-neighbour local binary patterns on 64×64 gray |
//! | gradient orientation | 9 | unsigned 0–180°, magnitude weighted |
//! | hue | 50 | 0–180 |
//! | saturation | 32 | 0–255 |
//! | value | 32 | 0–255 |

use image::RgbImage;

use super::histogram::{bin_index, luma, normalize_size, rgb_to_hsv, COMPARE_SIZE};

const LBP_BINS: usize = 256;
const ORIENTATION_BINS: usize = 9;
const HUE_BINS: usize = 50;
const SAT_BINS: usize = 32;
const VAL_BINS: usize = 32;

/// Descriptor length.
pub const DESCRIPTOR_LEN: usize = LBP_BINS + ORIENTATION_BINS + HUE_BINS + SAT_BINS + VAL_BINS;

/// Neighbour offsets, clockwise from top-left.
const NEIGHBOURS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
];

/// Compute the descriptor for `crop`.
pub fn describe(crop: &RgbImage) -> Vec<f32> {
    let small = normalize_size(crop);
    let size = COMPARE_SIZE as usize;
    let gray: Vec<f32> = small.pixels().map(|p| luma(p) as f32).collect();

    let mut descriptor = Vec::with_capacity(DESCRIPTOR_LEN);
    descriptor.extend(unit_sum(lbp_histogram(&gray, size)));
    descriptor.extend(unit_sum(orientation_histogram(&gray, size)));

    let mut hue = vec![0.0f32; HUE_BINS];
    let mut sat = vec![0.0f32; SAT_BINS];
    let mut val = vec![0.0f32; VAL_BINS];
    for p in small.pixels() {
        let (h, s, v) = rgb_to_hsv(p);
        hue[bin_index(h, 180.0, HUE_BINS)] += 1.0;
        sat[bin_index(s, 256.0, SAT_BINS)] += 1.0;
        val[bin_index(v, 256.0, VAL_BINS)] += 1.0;
    }
    descriptor.extend(unit_sum(hue));
    descriptor.extend(unit_sum(sat));
    descriptor.extend(unit_sum(val));

    l2_normalize(&mut descriptor);
    descriptor
}

fn lbp_histogram(gray: &[f32], size: usize) -> Vec<f32> {
    let mut hist = vec![0.0f32; LBP_BINS];
    for y in 1..size - 1 {
        for x in 1..size - 1 {
            let center = gray[y * size + x];
            let mut code = 0usize;
            for (bit, (dx, dy)) in NEIGHBOURS.iter().enumerate() {
                let nx = (x as i32 + dx) as usize;
                let ny = (y as i32 + dy) as usize;
                if gray[ny * size + nx] >= center {
                    code |= 1 << bit;
                }
            }
            hist[code] += 1.0;
        }
    }
    hist
}

fn orientation_histogram(gray: &[f32], size: usize) -> Vec<f32> {
    let mut hist = vec![0.0f32; ORIENTATION_BINS];
    for y in 1..size - 1 {
        for x in 1..size - 1 {
            let gx = gray[y * size + x + 1] - gray[y * size + x - 1];
            let gy = gray[(y + 1) * size + x] - gray[(y - 1) * size + x];
            let magnitude = (gx * gx + gy * gy).sqrt();
            if magnitude == 0.0 {
                continue;
            }
            let angle = gy.atan2(gx).to_degrees().rem_euclid(180.0);
            hist[bin_index(angle, 180.0, ORIENTATION_BINS)] += magnitude;
        }
    }
    hist
}

fn unit_sum(mut block: Vec<f32>) -> Vec<f32> {
    let sum: f32 = block.iter().sum();
    if sum > 0.0 {
        block.iter_mut().for_each(|v| *v /= sum);
    }
    block
}

/// Scale `values` to unit length. Zero vectors are left untouched.
pub fn l2_normalize(values: &mut [f32]) {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        values.iter_mut().for_each(|v| *v /= norm);
    }
}
