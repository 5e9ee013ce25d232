//! Object detection using a YOLOv8 ONNX model.
//!
//! Runs inference through ONNX Runtime, then decodes the `[1, 84, 8400]`
//! output into pixel-space boxes over the 80-class COCO vocabulary and
//! applies per-class non-maximum suppression.

use std::path::Path;
use std::sync::Mutex;

use image::imageops::{self, FilterType};
use ndarray::Array;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};
use vtrack_models::{BoundingBox, Detection};

use super::DetectionBackend;
use crate::error::{EngineError, EngineResult};
use crate::frame::Frame;
use crate::onnx;

/// COCO class names (80 classes).
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck",
    "boat", "traffic light", "fire hydrant", "stop sign", "parking meter", "bench",
    "bird", "cat", "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra",
    "giraffe", "backpack", "umbrella", "handbag", "tie", "suitcase", "frisbee",
    "skis", "snowboard", "sports ball", "kite", "baseball bat", "baseball glove",
    "skateboard", "surfboard", "tennis racket", "bottle", "wine glass", "cup",
    "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink",
    "refrigerator", "book", "clock", "vase", "scissors", "teddy bear", "hair drier",
    "toothbrush",
];

const NUM_BOXES: usize = 8400;
const NUM_FEATURES: usize = 4 + 80;

/// YOLO model settings.
#[derive(Debug, Clone)]
pub struct YoloConfig {
    /// Path to ONNX model file
    pub model_path: String,
    /// Model-level score threshold, applied before the engine's own floor
    pub score_threshold: f32,
    /// IoU threshold for NMS
    pub nms_threshold: f64,
    /// Square input size expected by the model
    pub input_size: u32,
}

impl Default for YoloConfig {
    fn default() -> Self {
        Self {
            model_path: "models/object_detection/yolov8n.onnx".to_string(),
            score_threshold: 0.25,
            nms_threshold: 0.45,
            input_size: 640,
        }
    }
}

/// YOLOv8 object detector.
pub struct YoloBackend {
    session: Mutex<Session>,
    config: YoloConfig,
}

impl YoloBackend {
    /// Load the model. Fails if the model file doesn't exist or can't be loaded.
    pub fn new(config: YoloConfig) -> EngineResult<Self> {
        let session = onnx::create_session(Path::new(&config.model_path), "object_detection")?;
        info!(
            model_path = %config.model_path,
            input_size = config.input_size,
            "Object detector initialized"
        );
        Ok(Self {
            session: Mutex::new(session),
            config,
        })
    }

    fn preprocess(&self, frame: &Frame) -> EngineResult<Value> {
        let size = self.config.input_size;
        let resized = imageops::resize(frame, size, size, FilterType::Triangle);
        let (shape, data) = onnx::to_nchw(&resized);
        Tensor::from_array((shape, data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| EngineError::detection(self.name(), format!("Failed to create tensor: {e}")))
    }

    fn run_inference(&self, input: Value) -> EngineResult<Vec<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| EngineError::detection(self.name(), "Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| EngineError::detection(self.name(), format!("ONNX inference failed: {e}")))?;

        let output = outputs
            .get("output0")
            .ok_or_else(|| EngineError::detection(self.name(), "Missing output0 tensor"))?;

        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| EngineError::detection(self.name(), format!("Failed to extract tensor: {e}")))?;

        Ok(tensor.1.iter().copied().collect())
    }

    /// Decode `[1, 84, 8400]` into pixel-space candidates above the score
    /// threshold, then suppress overlaps.
    fn postprocess(&self, outputs: Vec<f32>, width: u32, height: u32) -> EngineResult<Vec<Detection>> {
        if outputs.len() != NUM_FEATURES * NUM_BOXES {
            return Err(EngineError::detection(
                self.name(),
                format!(
                    "Unexpected output size: expected {}, got {}",
                    NUM_FEATURES * NUM_BOXES,
                    outputs.len()
                ),
            ));
        }

        let output = Array::from_shape_vec((NUM_FEATURES, NUM_BOXES), outputs)
            .map_err(|e| EngineError::detection(self.name(), format!("Failed to reshape output: {e}")))?;
        let rows = output.t();

        let input_size = self.config.input_size as f64;
        let scale_w = width as f64 / input_size;
        let scale_h = height as f64 / input_size;

        let mut candidates = Vec::new();
        for i in 0..NUM_BOXES {
            let (class_id, score) = (0..COCO_CLASSES.len())
                .map(|c| (c, rows[[i, 4 + c]]))
                .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

            if score < self.config.score_threshold {
                continue;
            }

            let (cx, cy, w, h) = (
                rows[[i, 0]] as f64,
                rows[[i, 1]] as f64,
                rows[[i, 2]] as f64,
                rows[[i, 3]] as f64,
            );
            let bbox = BoundingBox::new(
                (cx - w / 2.0) * scale_w,
                (cy - h / 2.0) * scale_h,
                w * scale_w,
                h * scale_h,
            );
            candidates.push(Detection::new(bbox, COCO_CLASSES[class_id], score as f64));
        }

        Ok(non_maximum_suppression(candidates, self.config.nms_threshold))
    }
}

impl DetectionBackend for YoloBackend {
    fn name(&self) -> &'static str {
        "yolo"
    }

    fn detect(&self, frame: &Frame) -> EngineResult<Vec<Detection>> {
        let (width, height) = frame.dimensions();
        let input = self.preprocess(frame)?;
        let outputs = self.run_inference(input)?;
        let detections = self.postprocess(outputs, width, height)?;
        debug!(count = detections.len(), "Object detection completed");
        Ok(detections)
    }
}

/// Greedy per-label NMS, highest confidence first.
pub(crate) fn non_maximum_suppression(mut detections: Vec<Detection>, iou_threshold: f64) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let suppressed = keep
            .iter()
            .any(|k| k.label == candidate.label && k.bbox.iou(&candidate.bbox) > iou_threshold);
        if !suppressed {
            keep.push(candidate);
        }
    }
    keep
}
