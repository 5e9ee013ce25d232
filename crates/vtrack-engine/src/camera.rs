//! Virtual camera.
//!
//! Pans and zooms by cropping each frame and scaling the crop back to the
//! full frame size. The pan follows the tracked box through an exponential
//! moving average whose weight adapts to how far the target jumped: large
//! moves get a faster response, small jitter is damped. When the target is
//! missing the zoom decays toward 1.0 and the center drifts back to the
//! frame center.

use image::imageops::{self, FilterType};
use serde::Serialize;
use vtrack_models::BoundingBox;

use crate::frame::Frame;

// === Smoothing constants ===
/// Jumps shorter than this (pixels) use `SMALL_MOVE_FACTOR`.
const LARGE_MOVE_DISTANCE: f64 = 50.0;
const SMALL_MOVE_FACTOR: f64 = 0.08;
/// Distance divisor for large moves, capped at `MAX_MOVE_FACTOR`.
const MOVE_DISTANCE_SCALE: f64 = 200.0;
const MAX_MOVE_FACTOR: f64 = 0.3;
const MOMENTUM_RETAIN: f64 = 0.85;
const MIN_SMOOTHING: f64 = 0.05;
const MAX_SMOOTHING: f64 = 0.25;
const ZOOM_BLEND: f64 = 0.12;

// === Decay constants (no target) ===
const ZOOM_DECAY: f64 = 0.92;
const MOMENTUM_DECAY: f64 = 0.9;
const CENTER_PULL: f64 = 0.02;

/// Smoothed pan/zoom state for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraState {
    pub center_x: f64,
    pub center_y: f64,
    /// Always >= 1.0
    pub zoom: f64,
    /// Always >= 0.0
    pub momentum: f64,
}

impl CameraState {
    /// Frame center, no zoom, no momentum.
    pub fn centered(frame_width: u32, frame_height: u32) -> Self {
        Self {
            center_x: frame_width as f64 / 2.0,
            center_y: frame_height as f64 / 2.0,
            zoom: 1.0,
            momentum: 0.0,
        }
    }
}

/// Integer crop window, always inside the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn full(frame_width: u32, frame_height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width: frame_width,
            height: frame_height,
        }
    }
}

/// Pan/zoom controller.
#[derive(Debug, Clone)]
pub struct VirtualCamera {
    state: CameraState,
    frame_width: u32,
    frame_height: u32,
    zoom_factor: f64,
}

impl VirtualCamera {
    /// Camera for frames of the given size converging on `zoom_factor`.
    pub fn new(frame_width: u32, frame_height: u32, zoom_factor: f64) -> Self {
        Self {
            state: CameraState::centered(frame_width, frame_height),
            frame_width,
            frame_height,
            zoom_factor: zoom_factor.max(1.0),
        }
    }

    pub fn state(&self) -> &CameraState {
        &self.state
    }

    /// Advance one frame and return the crop window for it.
    pub fn advance(&mut self, target: Option<&BoundingBox>) -> CropRect {
        let s = &mut self.state;
        match target {
            Some(bbox) => {
                let (cx, cy) = bbox.center();
                let distance = (cx - s.center_x).hypot(cy - s.center_y);
                let factor = if distance > LARGE_MOVE_DISTANCE {
                    (distance / MOVE_DISTANCE_SCALE).min(MAX_MOVE_FACTOR)
                } else {
                    SMALL_MOVE_FACTOR
                };
                s.momentum = MOMENTUM_RETAIN * s.momentum + (1.0 - MOMENTUM_RETAIN) * factor;
                let smoothing = s.momentum.clamp(MIN_SMOOTHING, MAX_SMOOTHING);

                s.center_x = (1.0 - smoothing) * s.center_x + smoothing * cx;
                s.center_y = (1.0 - smoothing) * s.center_y + smoothing * cy;
                s.zoom = (1.0 - ZOOM_BLEND) * s.zoom + ZOOM_BLEND * self.zoom_factor;
            }
            None => {
                s.zoom = (s.zoom * ZOOM_DECAY).max(1.0);
                s.momentum *= MOMENTUM_DECAY;
                let (fx, fy) = (self.frame_width as f64 / 2.0, self.frame_height as f64 / 2.0);
                s.center_x = (1.0 - CENTER_PULL) * s.center_x + CENTER_PULL * fx;
                s.center_y = (1.0 - CENTER_PULL) * s.center_y + CENTER_PULL * fy;
            }
        }
        self.crop_rect()
    }

    /// Crop window for the current state.
    pub fn crop_rect(&self) -> CropRect {
        let zoom = self.state.zoom.max(1.0);
        let (fw, fh) = (self.frame_width, self.frame_height);
        let width = ((fw as f64 / zoom).round() as u32).clamp(1.min(fw), fw);
        let height = ((fh as f64 / zoom).round() as u32).clamp(1.min(fh), fh);

        let max_x = (fw - width) as f64;
        let max_y = (fh - height) as f64;
        let x = (self.state.center_x - width as f64 / 2.0).clamp(0.0, max_x).round() as u32;
        let y = (self.state.center_y - height as f64 / 2.0).clamp(0.0, max_y).round() as u32;

        CropRect { x, y, width, height }
    }

    /// Cut `rect` out of `frame` and scale it back to full size.
    pub fn render(&self, frame: &Frame, rect: &CropRect) -> Frame {
        let (fw, fh) = frame.dimensions();
        if *rect == CropRect::full(fw, fh) {
            return frame.clone();
        }
        let region = imageops::crop_imm(frame, rect.x, rect.y, rect.width, rect.height).to_image();
        imageops::resize(&region, fw, fh, FilterType::Triangle)
    }
}
