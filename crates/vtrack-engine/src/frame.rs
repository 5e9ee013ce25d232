//! Frame source and sink boundaries.
//!
//! The engine never demuxes or encodes video itself. Hosts hand it an
//! ordered [`FrameSource`] of decoded RGB frames and an ordered
//! [`FrameSink`] that receives output frames of identical dimensions.

use std::collections::VecDeque;

use image::{imageops, RgbImage};
use vtrack_models::BoundingBox;

use crate::error::{EngineError, EngineResult};

/// One decoded RGB frame.
pub type Frame = RgbImage;

/// Ordered, finite source of decoded frames.
pub trait FrameSource: Send {
    /// Next frame, or `None` at end of stream.
    ///
    /// Corrupt or truncated input surfaces as [`EngineError::FrameRead`].
    fn next_frame(&mut self) -> EngineResult<Option<Frame>>;

    /// Frame dimensions as (width, height).
    fn dimensions(&self) -> (u32, u32);

    /// Frames per second.
    fn frame_rate(&self) -> f64;

    /// Total frame count when known up front.
    fn frame_count(&self) -> Option<u64> {
        None
    }
}

/// Ordered sink for output frames.
pub trait FrameSink: Send {
    /// Append one frame.
    fn write_frame(&mut self, frame: &Frame) -> EngineResult<()>;

    /// Flush after the last frame. Called once on successful completion.
    fn finish(&mut self) -> EngineResult<()> {
        Ok(())
    }
}

/// In-memory frame source.
#[derive(Debug, Clone)]
pub struct VecFrameSource {
    frames: VecDeque<Frame>,
    dimensions: (u32, u32),
    frame_rate: f64,
    total: u64,
}

impl VecFrameSource {
    /// Build a source over `frames`. All frames must share one size.
    pub fn new(frames: Vec<Frame>, frame_rate: f64) -> EngineResult<Self> {
        let dimensions = frames.first().map(|f| f.dimensions()).unwrap_or((0, 0));
        if let Some(index) = frames.iter().position(|f| f.dimensions() != dimensions) {
            return Err(EngineError::frame_read(
                index as u64,
                format!(
                    "frame size {:?} differs from stream size {:?}",
                    frames[index].dimensions(),
                    dimensions
                ),
            ));
        }
        Ok(Self {
            total: frames.len() as u64,
            frames: frames.into(),
            dimensions,
            frame_rate,
        })
    }
}

impl FrameSource for VecFrameSource {
    fn next_frame(&mut self) -> EngineResult<Option<Frame>> {
        Ok(self.frames.pop_front())
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn frame_count(&self) -> Option<u64> {
        Some(self.total)
    }
}

/// In-memory frame sink.
#[derive(Debug, Default, Clone)]
pub struct VecFrameSink {
    pub frames: Vec<Frame>,
    pub finished: bool,
}

impl VecFrameSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSink for VecFrameSink {
    fn write_frame(&mut self, frame: &Frame) -> EngineResult<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> EngineResult<()> {
        self.finished = true;
        Ok(())
    }
}

/// Copy the region under `bbox` out of `frame`.
///
/// Returns `None` when the box lies entirely outside the frame.
pub fn crop(frame: &Frame, bbox: &BoundingBox) -> Option<Frame> {
    let (x, y, w, h) = bbox.to_pixel_rect(frame.width(), frame.height())?;
    Some(imageops::crop_imm(frame, x, y, w, h).to_image())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_source_drains_in_order() {
        let frames = (0..3u8)
            .map(|i| RgbImage::from_pixel(4, 4, image::Rgb([i, i, i])))
            .collect();
        let mut source = VecFrameSource::new(frames, 30.0).unwrap();
        assert_eq!(source.frame_count(), Some(3));
        for expected in 0..3u8 {
            let frame = source.next_frame().unwrap().unwrap();
            assert_eq!(frame.get_pixel(0, 0)[0], expected);
        }
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_vec_source_rejects_mixed_sizes() {
        let frames = vec![RgbImage::new(4, 4), RgbImage::new(8, 4)];
        assert!(matches!(
            VecFrameSource::new(frames, 30.0),
            Err(EngineError::FrameRead { frame_index: 1, .. })
        ));
    }

    #[test]
    fn test_crop_clips_to_frame() {
        let frame = RgbImage::new(100, 80);
        let region = crop(&frame, &BoundingBox::new(90.0, 70.0, 30.0, 30.0)).unwrap();
        assert_eq!(region.dimensions(), (10, 10));
        assert!(crop(&frame, &BoundingBox::new(200.0, 0.0, 10.0, 10.0)).is_none());
    }
}
