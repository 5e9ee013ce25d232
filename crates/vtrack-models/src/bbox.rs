//! Axis-aligned bounding boxes in pixel space.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    /// Left edge x-coordinate
    pub x: f64,
    /// Top edge y-coordinate
    pub y: f64,
    /// Box width
    pub width: f64,
    /// Box height
    pub height: f64,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Center x-coordinate.
    #[inline]
    pub fn cx(&self) -> f64 {
        self.x + self.width / 2.0
    }

    /// Center y-coordinate.
    #[inline]
    pub fn cy(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Center point.
    #[inline]
    pub fn center(&self) -> (f64, f64) {
        (self.cx(), self.cy())
    }

    /// Right edge x-coordinate.
    #[inline]
    pub fn x2(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge y-coordinate.
    #[inline]
    pub fn y2(&self) -> f64 {
        self.y + self.height
    }

    /// Box area in pixels.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Length of the shorter side.
    #[inline]
    pub fn min_side(&self) -> f64 {
        self.width.min(self.height)
    }

    /// Compute Intersection over Union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.x2().min(other.x2());
        let y2 = self.y2().min(other.y2());

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Multiply every coordinate by `factor`.
    ///
    /// Used to map boxes found on a downscaled frame back to full-frame space.
    pub fn scale(&self, factor: f64) -> BoundingBox {
        BoundingBox {
            x: self.x * factor,
            y: self.y * factor,
            width: self.width * factor,
            height: self.height * factor,
        }
    }

    /// Intersect the box with the frame rectangle.
    ///
    /// Returns `None` when nothing of the box lies inside the frame.
    pub fn clip_to_frame(&self, frame_width: u32, frame_height: u32) -> Option<BoundingBox> {
        let x1 = self.x.max(0.0);
        let y1 = self.y.max(0.0);
        let x2 = self.x2().min(frame_width as f64);
        let y2 = self.y2().min(frame_height as f64);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some(BoundingBox::new(x1, y1, x2 - x1, y2 - y1))
    }

    /// Integer pixel rectangle `(x, y, w, h)` covered by the box inside the frame.
    ///
    /// Coordinates are floored at the origin and the far edge is rounded up, so
    /// the rectangle always covers the whole box. Returns `None` for boxes that
    /// are empty after clipping.
    pub fn to_pixel_rect(&self, frame_width: u32, frame_height: u32) -> Option<(u32, u32, u32, u32)> {
        let clipped = self.clip_to_frame(frame_width, frame_height)?;
        let x = clipped.x.floor() as u32;
        let y = clipped.y.floor() as u32;
        let x2 = (clipped.x2().ceil() as u32).min(frame_width);
        let y2 = (clipped.y2().ceil() as u32).min(frame_height);

        if x2 <= x || y2 <= y {
            return None;
        }

        Some((x, y, x2 - x, y2 - y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center() {
        let bbox = BoundingBox::new(100.0, 100.0, 50.0, 50.0);
        assert_eq!(bbox.center(), (125.0, 125.0));
    }

    #[test]
    fn test_iou_identical_and_disjoint() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 10.0, 10.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-9);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_scale_back_from_downscaled_frame() {
        let small = BoundingBox::new(30.0, 15.0, 75.0, 45.0);
        let full = small.scale(1.0 / 0.75);
        assert!((full.x - 40.0).abs() < 1e-9);
        assert!((full.width - 100.0).abs() < 1e-9);
        assert!((full.height - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_clip_to_frame() {
        let bbox = BoundingBox::new(-10.0, 90.0, 40.0, 40.0);
        let clipped = bbox.clip_to_frame(100, 100).unwrap();
        assert_eq!(clipped, BoundingBox::new(0.0, 90.0, 30.0, 10.0));

        let outside = BoundingBox::new(200.0, 200.0, 10.0, 10.0);
        assert!(outside.clip_to_frame(100, 100).is_none());
    }

    #[test]
    fn test_pixel_rect_covers_fractional_box() {
        let bbox = BoundingBox::new(10.4, 20.6, 5.2, 5.0);
        assert_eq!(bbox.to_pixel_rect(100, 100), Some((10, 20, 6, 6)));
    }
}
