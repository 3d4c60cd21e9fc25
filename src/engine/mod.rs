//! ONNX-backed face inference.
//!
//! All models are loaded once at startup and are read-only afterwards. The
//! `FaceInference` trait is the seam between the HTTP workflows and the
//! engine, so tests can substitute a stub.

pub mod attribute;
pub mod detector;
pub mod embedder;
pub mod preprocess;

use image::{DynamicImage, GenericImageView};
use thiserror::Error;

use crate::config::ModelSettings;
use crate::models::{FaceAnalysis, FaceRegion, Verification};

pub use attribute::{AttributeAnalyzer, Demographics};
pub use detector::{DetectedFace, FaceDetector};
pub use embedder::{FaceEmbedder, FaceEmbedding};

/// Fraction of the detected box added on each side before attribute or
/// embedding crops.
const CROP_MARGIN: f32 = 0.25;

/// Errors that can occur inside the face engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("model file not found: {0} — place the ONNX models under models/")]
    ModelNotFound(String),

    #[error("invalid image format: {0}")]
    InvalidImage(#[from] image::ImageError),

    #[error("no face detected in image")]
    NoFaceDetected,

    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("onnx runtime error: {0}")]
    Ort(#[from] ort::Error),
}

/// Face analysis and verification capability consumed by the HTTP workflows.
pub trait FaceInference: Send + Sync {
    /// Demographic analysis of the most prominent face in the image.
    fn analyze(&self, image: &DynamicImage) -> Result<FaceAnalysis, EngineError>;

    /// Embedding of the most prominent face. Fails when no face is found.
    fn embed(&self, image: &DynamicImage) -> Result<FaceEmbedding, EngineError>;

    /// Pairwise verification of a candidate image against a reference
    /// embedding.
    fn verify(
        &self,
        reference: &FaceEmbedding,
        target: &DynamicImage,
    ) -> Result<Verification, EngineError>;
}

pub struct OnnxFaceEngine {
    detector: FaceDetector,
    embedder: FaceEmbedder,
    attributes: AttributeAnalyzer,
    require_face: bool,
}

impl std::fmt::Debug for OnnxFaceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxFaceEngine")
            .field("require_face", &self.require_face)
            .finish_non_exhaustive()
    }
}

impl OnnxFaceEngine {
    /// Load every model named in the settings. Called once at startup.
    pub fn load(settings: &ModelSettings) -> Result<Self, EngineError> {
        let detector = FaceDetector::load(&settings.detector)?;
        let embedder = FaceEmbedder::load(&settings.embedder)?;
        let attributes =
            AttributeAnalyzer::load(&settings.genderage, &settings.emotion, &settings.race)?;

        Ok(Self {
            detector,
            embedder,
            attributes,
            require_face: settings.require_face,
        })
    }

    fn largest_face(faces: &[DetectedFace]) -> Option<DetectedFace> {
        faces
            .iter()
            .max_by(|a, b| {
                a.area()
                    .partial_cmp(&b.area())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .copied()
    }
}

impl FaceInference for OnnxFaceEngine {
    fn analyze(&self, image: &DynamicImage) -> Result<FaceAnalysis, EngineError> {
        let faces = self.detector.detect(image)?;
        let (width, height) = image.dimensions();

        let (crop, region, face_confidence) = match Self::largest_face(&faces) {
            Some(face) => {
                let region = FaceRegion {
                    x: face.x1.max(0.0) as u32,
                    y: face.y1.max(0.0) as u32,
                    w: face.width().max(1.0) as u32,
                    h: face.height().max(1.0) as u32,
                };
                let crop = preprocess::crop_face(image, &face, CROP_MARGIN);
                (crop, region, face.confidence)
            }
            None if self.require_face => return Err(EngineError::NoFaceDetected),
            None => {
                // Permissive mode: analyze the whole frame
                (image.clone(), FaceRegion::full_frame(width, height), 0.0)
            }
        };

        let demographics = self.attributes.analyze(&crop)?;

        Ok(FaceAnalysis {
            age: demographics.age,
            dominant_gender: demographics.dominant_gender,
            gender: demographics.gender,
            dominant_race: demographics.dominant_race,
            race: demographics.race,
            dominant_emotion: demographics.dominant_emotion,
            emotion: demographics.emotion,
            region,
            face_confidence,
        })
    }

    fn embed(&self, image: &DynamicImage) -> Result<FaceEmbedding, EngineError> {
        let faces = self.detector.detect(image)?;
        let face = Self::largest_face(&faces).ok_or(EngineError::NoFaceDetected)?;
        let crop = preprocess::crop_face(image, &face, CROP_MARGIN);
        self.embedder.embed(&crop)
    }

    fn verify(
        &self,
        reference: &FaceEmbedding,
        target: &DynamicImage,
    ) -> Result<Verification, EngineError> {
        let candidate = self.embed(target)?;
        Ok(embedder::verify_embeddings(reference, &candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_largest_face_picks_biggest() {
        let faces = vec![
            DetectedFace {
                x1: 0.0,
                y1: 0.0,
                x2: 10.0,
                y2: 10.0,
                confidence: 0.99,
            },
            DetectedFace {
                x1: 20.0,
                y1: 20.0,
                x2: 120.0,
                y2: 120.0,
                confidence: 0.6,
            },
        ];
        let face = OnnxFaceEngine::largest_face(&faces).unwrap();
        assert!((face.area() - 10000.0).abs() < 1e-3);
    }

    #[test]
    fn test_largest_face_empty() {
        assert!(OnnxFaceEngine::largest_face(&[]).is_none());
    }

    #[test]
    fn test_missing_model_is_explicit() {
        let settings = ModelSettings {
            detector: "does/not/exist.onnx".into(),
            ..ModelSettings::default()
        };
        let err = OnnxFaceEngine::load(&settings).unwrap_err();
        assert!(matches!(err, EngineError::ModelNotFound(_)));
        assert!(err.to_string().contains("does/not/exist.onnx"));
    }
}
