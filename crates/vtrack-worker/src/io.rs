//! Image-sequence frame source/sink and gallery export.
//!
//! Input is a directory of PNG or JPEG frames processed in file name order.
//! Output frames are written as zero-padded PNGs so they sort back into the
//! same order.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use vtrack_engine::{EngineError, EngineResult, Frame, FrameSink, FrameSource, GalleryEntry, GalleryEntryInfo};

use crate::error::{WorkerError, WorkerResult};

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Name of the gallery catalog written next to the crops.
pub const GALLERY_INDEX_FILE: &str = "index.json";

/// Sorted frame files in `dir`.
pub fn list_frames(dir: &Path) -> WorkerResult<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_frame = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if is_frame && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Frame source over a directory of still images.
#[derive(Debug, Clone)]
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    next: usize,
    dimensions: (u32, u32),
    frame_rate: f64,
}

impl ImageSequenceSource {
    /// Open `dir`; fails when it holds no frames.
    pub fn open(dir: &Path, frame_rate: f64) -> WorkerResult<Self> {
        let paths = list_frames(dir)?;
        let first = paths.first().ok_or_else(|| WorkerError::EmptyInput(dir.to_path_buf()))?;
        let dimensions = image::image_dimensions(first)?;
        debug!(dir = %dir.display(), frames = paths.len(), width = dimensions.0, height = dimensions.1, "Opened image sequence");
        Ok(Self {
            paths,
            next: 0,
            dimensions,
            frame_rate,
        })
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> EngineResult<Option<Frame>> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };
        let frame = image::open(path)
            .map_err(|e| EngineError::invalid_image(format!("{}: {e}", path.display())))?
            .to_rgb8();
        if frame.dimensions() != self.dimensions {
            return Err(EngineError::invalid_image(format!(
                "{} is {}x{}, sequence is {}x{}",
                path.display(),
                frame.width(),
                frame.height(),
                self.dimensions.0,
                self.dimensions.1
            )));
        }
        self.next += 1;
        Ok(Some(frame))
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn frame_count(&self) -> Option<u64> {
        Some(self.paths.len() as u64)
    }
}

/// Writes `frame_000000.png`, `frame_000001.png`, ...
#[derive(Debug)]
pub struct PngSequenceSink {
    dir: PathBuf,
    written: u64,
}

impl PngSequenceSink {
    pub fn create(dir: &Path) -> WorkerResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            written: 0,
        })
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl FrameSink for PngSequenceSink {
    fn write_frame(&mut self, frame: &Frame) -> EngineResult<()> {
        let path = self.dir.join(format!("frame_{:06}.png", self.written));
        frame.save(&path)?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> EngineResult<()> {
        info!(dir = %self.dir.display(), frames = self.written, "Frame sequence written");
        Ok(())
    }
}

/// Write each entry's crop as `<id>.jpg` and a JSON catalog of all entries.
/// Returns the catalog path.
pub fn export_gallery(entries: &[GalleryEntry], dir: &Path) -> WorkerResult<PathBuf> {
    fs::create_dir_all(dir)?;
    for entry in entries {
        entry
            .representative_crop
            .save(dir.join(format!("{}.jpg", entry.id)))?;
    }

    let index: Vec<GalleryEntryInfo> = entries.iter().map(GalleryEntry::info).collect();
    let index_path = dir.join(GALLERY_INDEX_FILE);
    serde_json::to_writer_pretty(BufWriter::new(File::create(&index_path)?), &index)?;
    info!(dir = %dir.display(), entries = entries.len(), "Gallery exported");
    Ok(index_path)
}
