//! SCRFD face detector via ONNX Runtime.
//!
//! Anchor-free decoding over three stride levels followed by IoU-based
//! non-maximum suppression. Box coordinates are mapped back to the source
//! image space.

use std::path::Path;
use std::sync::Mutex;

use image::{DynamicImage, GenericImageView};
use ort::session::Session;
use ort::value::TensorRef;

use super::preprocess::{letterbox_to_tensor, LetterboxMap};
use super::EngineError;

const DETECTOR_INPUT_SIZE: u32 = 640;
const DETECTOR_STRIDES: [usize; 3] = [8, 16, 32];
const ANCHORS_PER_CELL: usize = 2;
const SCORE_THRESHOLD: f32 = 0.5;
const NMS_IOU_THRESHOLD: f32 = 0.4;

/// One detected face in source-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedFace {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl DetectedFace {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }
}

pub struct FaceDetector {
    session: Mutex<Session>,
}

impl FaceDetector {
    /// Load the SCRFD ONNX model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, EngineError> {
        if !model_path.exists() {
            return Err(EngineError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = %model_path.display(), "loaded face detector model");

        Ok(Self {
            session: Mutex::new(session),
        })
    }

    /// Detect faces, returning boxes sorted by confidence (highest first).
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<DetectedFace>, EngineError> {
        let (tensor, map) = letterbox_to_tensor(image, DETECTOR_INPUT_SIZE);

        let mut session = self.session.lock().expect("detector session poisoned");
        let outputs = session.run(ort::inputs![TensorRef::from_array_view(tensor.view())?])?;

        // Output layout: [0..3) per-stride scores, [3..6) per-stride box deltas
        let mut candidates = Vec::new();
        for (level, &stride) in DETECTOR_STRIDES.iter().enumerate() {
            let (_, scores) = outputs[level]
                .try_extract_tensor::<f32>()
                .map_err(|e| EngineError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, deltas) = outputs[level + DETECTOR_STRIDES.len()]
                .try_extract_tensor::<f32>()
                .map_err(|e| EngineError::InferenceFailed(format!("boxes stride {stride}: {e}")))?;

            decode_stride(scores, deltas, stride, &map, &mut candidates);
        }
        drop(outputs);
        drop(session);

        let mut faces = nms(candidates, NMS_IOU_THRESHOLD);

        // Clamp into the source frame
        let (img_w, img_h) = image.dimensions();
        for face in faces.iter_mut() {
            face.x1 = face.x1.clamp(0.0, img_w as f32);
            face.y1 = face.y1.clamp(0.0, img_h as f32);
            face.x2 = face.x2.clamp(0.0, img_w as f32);
            face.y2 = face.y2.clamp(0.0, img_h as f32);
        }
        faces.retain(|f| f.area() > 0.0);

        Ok(faces)
    }
}

/// Decode one stride level into candidate boxes above the score threshold.
fn decode_stride(
    scores: &[f32],
    deltas: &[f32],
    stride: usize,
    map: &LetterboxMap,
    out: &mut Vec<DetectedFace>,
) {
    let grid = DETECTOR_INPUT_SIZE as usize / stride;
    let num_anchors = grid * grid * ANCHORS_PER_CELL;

    for idx in 0..num_anchors {
        let score = match scores.get(idx) {
            Some(&s) if s > SCORE_THRESHOLD => s,
            _ => continue,
        };

        let delta_base = idx * 4;
        if delta_base + 3 >= deltas.len() {
            continue;
        }

        let cell = idx / ANCHORS_PER_CELL;
        let anchor_cx = ((cell % grid) * stride) as f32;
        let anchor_cy = ((cell / grid) * stride) as f32;

        // Offsets are expressed in stride units from the anchor center
        let x1 = anchor_cx - deltas[delta_base] * stride as f32;
        let y1 = anchor_cy - deltas[delta_base + 1] * stride as f32;
        let x2 = anchor_cx + deltas[delta_base + 2] * stride as f32;
        let y2 = anchor_cy + deltas[delta_base + 3] * stride as f32;

        let (x1, y1) = map.to_original(x1, y1);
        let (x2, y2) = map.to_original(x2, y2);

        out.push(DetectedFace {
            x1,
            y1,
            x2,
            y2,
            confidence: score,
        });
    }
}

/// Non-maximum suppression keeping the highest-confidence box per cluster.
fn nms(mut candidates: Vec<DetectedFace>, iou_threshold: f32) -> Vec<DetectedFace> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<DetectedFace> = Vec::new();
    for candidate in candidates {
        if kept.iter().all(|k| iou(k, &candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

/// Intersection-over-union of two boxes.
fn iou(a: &DetectedFace, b: &DetectedFace) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.area() + b.area() - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> DetectedFace {
        DetectedFace {
            x1,
            y1,
            x2,
            y2,
            confidence,
        }
    }

    #[test]
    fn test_iou_identical() {
        let a = face(0.0, 0.0, 100.0, 100.0, 1.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint() {
        let a = face(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = face(20.0, 20.0, 30.0, 30.0, 1.0);
        assert!(iou(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_iou_half_overlap() {
        let a = face(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = face(5.0, 0.0, 15.0, 10.0, 1.0);
        // intersection 50, union 150
        assert!((iou(&a, &b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_nms_suppresses_overlapping() {
        let candidates = vec![
            face(0.0, 0.0, 100.0, 100.0, 0.9),
            face(5.0, 5.0, 105.0, 105.0, 0.8),
            face(200.0, 200.0, 250.0, 250.0, 0.7),
        ];
        let kept = nms(candidates, 0.4);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].confidence - 0.9).abs() < 1e-6);
        assert!((kept[1].confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_nms_keeps_distinct_faces() {
        let candidates = vec![
            face(0.0, 0.0, 10.0, 10.0, 0.9),
            face(50.0, 50.0, 60.0, 60.0, 0.8),
        ];
        assert_eq!(nms(candidates, 0.4).len(), 2);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms(vec![], 0.4).is_empty());
    }

    #[test]
    fn test_decode_stride_respects_threshold() {
        let grid = DETECTOR_INPUT_SIZE as usize / 32;
        let num_anchors = grid * grid * ANCHORS_PER_CELL;
        let mut scores = vec![0.0f32; num_anchors];
        scores[0] = 0.95;
        let deltas = vec![1.0f32; num_anchors * 4];

        let map = LetterboxMap {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
        };

        let mut out = Vec::new();
        decode_stride(&scores, &deltas, 32, &map, &mut out);

        assert_eq!(out.len(), 1);
        assert!((out[0].confidence - 0.95).abs() < 1e-6);
        // Anchor 0 is at the origin; offsets of 1.0 stride units give a 64-wide box
        assert!((out[0].x1 - -32.0).abs() < 1e-3);
        assert!((out[0].x2 - 32.0).abs() < 1e-3);
    }

    #[test]
    fn test_detected_face_area() {
        let f = face(10.0, 10.0, 30.0, 50.0, 0.5);
        assert!((f.area() - 800.0).abs() < 1e-6);
        assert!((f.width() - 20.0).abs() < 1e-6);
        assert!((f.height() - 40.0).abs() < 1e-6);
    }
}
