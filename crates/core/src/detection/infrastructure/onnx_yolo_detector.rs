/// YOLO face detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference and NMS post-processing for
/// single still images. Regions are returned most-confident first.
use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::Frame;
use crate::shared::onnx_session::{ort_error, SharedSession};
use crate::shared::region::Region;
use crate::CapabilityError;

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default confidence threshold for face detection.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// YOLO face detector backed by a shared ONNX Runtime session.
pub struct OnnxYoloDetector {
    session: SharedSession,
    confidence: f64,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Load a YOLO ONNX model and prepare for inference.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    /// Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, CapabilityError> {
        let session = SharedSession::load(model_path)?;
        let input_size = {
            let guard = session.lock()?;
            guard
                .inputs()
                .first()
                .and_then(|input| match input.dtype() {
                    ort::value::ValueType::Tensor { ref shape, .. }
                        if shape.len() >= 4 && shape[2] > 0 =>
                    {
                        Some(shape[2] as u32)
                    }
                    _ => None,
                })
                .unwrap_or(DEFAULT_INPUT_SIZE)
        };
        log::debug!("YOLO input size {input_size}, confidence {confidence}");

        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }
}

impl FaceDetector for OnnxYoloDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<Region>, CapabilityError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(Vec::new());
        }

        let (input_tensor, letterbox) = letterbox(frame, self.input_size);
        let input_value = ort::value::Tensor::from_array(input_tensor).map_err(ort_error)?;

        let mut raw_dets = {
            let mut session = self.session.lock()?;
            let outputs = session
                .run(ort::inputs![input_value])
                .map_err(ort_error)?;
            if outputs.len() == 0 {
                return Err("YOLO model produced no outputs".into());
            }
            let tensor = outputs[0].try_extract_array::<f32>().map_err(ort_error)?;
            let shape = tensor.shape().to_vec();
            let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;
            parse_detections(data, &shape, self.confidence, &letterbox)?
        };

        let kept = nms(&mut raw_dets, NMS_IOU_THRESH);
        Ok(kept
            .iter()
            .filter_map(|d| d.to_region(frame.width(), frame.height()))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Geometry needed to map letterboxed coordinates back to the frame.
#[derive(Clone, Copy, Debug)]
struct Letterbox {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

/// Letterbox-resize a frame to `target_size` × `target_size` NCHW float32.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, Letterbox) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // Padding is 114/255 gray, the YOLO convention
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (
        tensor,
        Letterbox {
            scale,
            pad_x,
            pad_y,
        },
    )
}

// ---------------------------------------------------------------------------
// Post-processing
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct RawDetection {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    confidence: f64,
}

impl RawDetection {
    fn to_region(&self, frame_w: u32, frame_h: u32) -> Option<Region> {
        let x1 = self.x1.round() as i32;
        let y1 = self.y1.round() as i32;
        let region = Region::new(
            x1,
            y1,
            self.x2.round() as i32 - x1,
            self.y2.round() as i32 - y1,
        )
        .with_score(self.confidence as f32);
        region.clamped(frame_w, frame_h)
    }
}

/// Decodes rows of `[cx, cy, w, h, conf, ...]` into frame coordinates.
///
/// YOLO exports either `[1, features, detections]` (transposed) or
/// `[1, detections, features]`; both are accepted.
fn parse_detections(
    data: &[f32],
    shape: &[usize],
    confidence: f64,
    letterbox: &Letterbox,
) -> Result<Vec<RawDetection>, CapabilityError> {
    if shape.len() != 3 {
        return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < 5 || data.len() < num_dets * num_feats {
        return Err(format!("YOLO output too small for shape {shape:?}").into());
    }

    let feature = |det: usize, feat: usize| -> f64 {
        let idx = if transposed {
            feat * num_dets + det
        } else {
            det * num_feats + feat
        };
        data[idx] as f64
    };

    let mut dets = Vec::new();
    for i in 0..num_dets {
        let conf = feature(i, 4);
        if conf < confidence {
            continue;
        }
        let (cx, cy, w, h) = (feature(i, 0), feature(i, 1), feature(i, 2), feature(i, 3));
        let pad_x = letterbox.pad_x as f64;
        let pad_y = letterbox.pad_y as f64;
        dets.push(RawDetection {
            x1: ((cx - w / 2.0) - pad_x) / letterbox.scale,
            y1: ((cy - h / 2.0) - pad_y) / letterbox.scale,
            x2: ((cx + w / 2.0) - pad_x) / letterbox.scale,
            y2: ((cy + h / 2.0) - pad_y) / letterbox.scale,
            confidence: conf,
        });
    }
    Ok(dets)
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
fn nms(dets: &mut [RawDetection], iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i].clone());
        for j in (i + 1)..dets.len() {
            if !suppressed[j] && bbox_iou(&dets[i], &dets[j]) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

fn bbox_iou(a: &RawDetection, b: &RawDetection) -> f64 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    inter / (area_a + area_b - inter)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
