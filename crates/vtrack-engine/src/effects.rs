//! Region blur.
//!
//! Gaussian blur applied in place to selected boxes. Each region is blurred
//! on its own, with edges replicated, so pixels outside a box are never read
//! or written.

use vtrack_models::{BlurMode, BoundingBox, Detection};

use crate::frame::Frame;

/// Kernel size for `strength`, raised to the next odd number when even.
pub fn kernel_size(strength: u32) -> u32 {
    let strength = strength.max(1);
    if strength % 2 == 0 {
        strength + 1
    } else {
        strength
    }
}

/// Separable Gaussian blur with a fixed kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionBlur {
    kernel: Vec<f32>,
}

impl RegionBlur {
    pub fn new(strength: u32) -> Self {
        let size = kernel_size(strength) as usize;
        let radius = (size / 2) as f32;
        // OpenCV's sigma for a given kernel size when sigma is left at 0
        let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
        let mut kernel: Vec<f32> = (0..size)
            .map(|i| {
                let d = i as f32 - radius;
                (-(d * d) / (2.0 * sigma * sigma)).exp()
            })
            .collect();
        let sum: f32 = kernel.iter().sum();
        kernel.iter_mut().for_each(|k| *k /= sum);
        Self { kernel }
    }

    /// Kernel width in pixels.
    pub fn size(&self) -> usize {
        self.kernel.len()
    }

    /// Blur the pixels under `bbox` in place.
    pub fn blur_region(&self, frame: &mut Frame, bbox: &BoundingBox) {
        let Some((x0, y0, w, h)) = bbox.to_pixel_rect(frame.width(), frame.height()) else {
            return;
        };
        if self.kernel.len() == 1 {
            return;
        }
        let (w, h) = (w as usize, h as usize);
        let radius = (self.kernel.len() / 2) as isize;

        let mut region = vec![0.0f32; w * h * 3];
        for y in 0..h {
            for x in 0..w {
                let p = frame.get_pixel(x0 + x as u32, y0 + y as u32);
                for c in 0..3 {
                    region[(y * w + x) * 3 + c] = p[c] as f32;
                }
            }
        }

        let clamp = |v: isize, len: usize| v.clamp(0, len as isize - 1) as usize;

        let mut horizontal = vec![0.0f32; w * h * 3];
        for y in 0..h {
            for x in 0..w {
                let mut acc = [0.0f32; 3];
                for (k, weight) in self.kernel.iter().enumerate() {
                    let sx = clamp(x as isize + k as isize - radius, w);
                    for c in 0..3 {
                        acc[c] += weight * region[(y * w + sx) * 3 + c];
                    }
                }
                horizontal[(y * w + x) * 3..(y * w + x) * 3 + 3].copy_from_slice(&acc);
            }
        }

        for y in 0..h {
            for x in 0..w {
                let mut acc = [0.0f32; 3];
                for (k, weight) in self.kernel.iter().enumerate() {
                    let sy = clamp(y as isize + k as isize - radius, h);
                    for c in 0..3 {
                        acc[c] += weight * horizontal[(sy * w + x) * 3 + c];
                    }
                }
                let pixel = frame.get_pixel_mut(x0 + x as u32, y0 + y as u32);
                for c in 0..3 {
                    pixel[c] = acc[c].round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }
}

/// Blur the regions selected by `mode`.
///
/// `target` is this frame's selected detection, if any. With
/// [`BlurMode::OnlyTarget`] only that box is blurred; with
/// [`BlurMode::ExcludeTarget`] every other detection is.
pub fn apply_blur(
    frame: &mut Frame,
    detections: &[Detection],
    mode: BlurMode,
    target: Option<&Detection>,
    blur: &RegionBlur,
) {
    match mode {
        BlurMode::OnlyTarget => {
            if let Some(target) = target {
                blur.blur_region(frame, &target.bbox);
            }
        }
        BlurMode::ExcludeTarget => {
            for detection in detections {
                if target.map_or(true, |t| t.bbox != detection.bbox) {
                    blur.blur_region(frame, &detection.bbox);
                }
            }
        }
    }
}
