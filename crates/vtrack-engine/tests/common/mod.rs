//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use image::Rgb;
use vtrack_engine::{DetectionBackend, Engine, EngineResult, Frame, VecFrameSource};
use vtrack_models::{BoundingBox, Detection, EngineConfig};

/// Frames carry their index in the red channel of pixel (0, 0) so a
/// scripted backend can look up what to return without counting calls.
pub fn frame_index(frame: &Frame) -> u64 {
    frame.get_pixel(0, 0)[0] as u64
}

/// Backend returning pre-scripted detections keyed by frame index.
#[derive(Default)]
pub struct ScriptedBackend {
    script: HashMap<u64, Vec<Detection>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `detections` for every frame in `frames`.
    pub fn on(mut self, frames: impl IntoIterator<Item = u64>, detections: Vec<Detection>) -> Self {
        for frame in frames {
            self.script.insert(frame, detections.clone());
        }
        self
    }
}

impl DetectionBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&self, frame: &Frame) -> EngineResult<Vec<Detection>> {
        Ok(self.script.get(&frame_index(frame)).cloned().unwrap_or_default())
    }
}

/// Config that runs detection on every full-size frame.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        frame_skip: 1,
        detection_downscale: 1.0,
        ..Default::default()
    }
}

pub fn engine(backend: ScriptedBackend) -> Engine {
    Engine::with_backend(test_config(), Arc::new(backend)).expect("engine")
}

/// `n` copies of `background`, each stamped with its index.
pub fn stamped_frames(n: u64, background: &Frame) -> Vec<Frame> {
    (0..n)
        .map(|i| {
            let mut frame = background.clone();
            frame.put_pixel(0, 0, Rgb([i as u8, 0, 0]));
            frame
        })
        .collect()
}

pub fn source(n: u64, background: &Frame) -> VecFrameSource {
    VecFrameSource::new(stamped_frames(n, background), 30.0).expect("source")
}

/// Horizontal red stripes.
pub fn striped_patch(w: u32, h: u32) -> Frame {
    Frame::from_fn(w, h, |_, y| {
        if (y / 4) % 2 == 0 {
            Rgb([220, 30, 30])
        } else {
            Rgb([90, 10, 10])
        }
    })
}

/// High-frequency color noise.
pub fn noise_patch(w: u32, h: u32, seed: u32) -> Frame {
    Frame::from_fn(w, h, |x, y| {
        let v = ((x * 37 + y * 91 + seed * 13) % 251) as u8;
        Rgb([v, v.wrapping_mul(7), 255 - v])
    })
}

/// Copy `patch` into `frame` at (x, y).
pub fn paste(frame: &mut Frame, patch: &Frame, x: u32, y: u32) {
    image::imageops::replace(frame, patch, x as i64, y as i64);
}

pub fn bbox_of(patch: &Frame, x: u32, y: u32) -> BoundingBox {
    BoundingBox::new(x as f64, y as f64, patch.width() as f64, patch.height() as f64)
}

/// Luma variance over a region.
pub fn region_variance(frame: &Frame, bbox: &BoundingBox) -> f64 {
    let mut values = Vec::new();
    for y in bbox.y as u32..bbox.y2() as u32 {
        for x in bbox.x as u32..bbox.x2() as u32 {
            let p = frame.get_pixel(x, y);
            values.push(0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64);
        }
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}
