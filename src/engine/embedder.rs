//! ArcFace face embedder and pairwise verification.
//!
//! Produces L2-normalized 512-dimensional embeddings; verification compares
//! cosine distance against a fixed per-model threshold.

use std::path::Path;
use std::sync::Mutex;

use image::DynamicImage;
use ort::session::Session;
use ort::value::TensorRef;

use crate::models::Verification;

use super::preprocess::to_nchw;
use super::EngineError;

const EMBEDDER_INPUT_SIZE: u32 = 112;
const EMBEDDER_MEAN: f32 = 127.5;
const EMBEDDER_STD: f32 = 127.5;
const EMBEDDING_DIM: usize = 512;

/// Name reported in verification records.
pub const VERIFY_MODEL_NAME: &str = "arcface_r50";

/// Cosine-distance decision threshold for `VERIFY_MODEL_NAME`.
pub const VERIFY_DISTANCE_THRESHOLD: f32 = 0.68;

/// An L2-normalized face embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceEmbedding {
    values: Vec<f32>,
}

impl FaceEmbedding {
    /// Normalize the raw model output into a unit vector.
    pub fn new(mut values: Vec<f32>) -> Self {
        let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in values.iter_mut() {
                *v /= norm;
            }
        }
        Self { values }
    }

    /// Unit vectors make the dot product the cosine similarity.
    pub fn cosine_similarity(&self, other: &FaceEmbedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Cosine distance between two embeddings, in [0, 2].
pub fn cosine_distance(a: &FaceEmbedding, b: &FaceEmbedding) -> f32 {
    1.0 - a.cosine_similarity(b)
}

/// Decide whether two embeddings belong to the same person.
pub fn verify_embeddings(reference: &FaceEmbedding, candidate: &FaceEmbedding) -> Verification {
    let similarity = reference.cosine_similarity(candidate);
    let distance = 1.0 - similarity;

    Verification {
        verified: distance <= VERIFY_DISTANCE_THRESHOLD,
        distance,
        threshold: VERIFY_DISTANCE_THRESHOLD,
        similarity,
        model: VERIFY_MODEL_NAME.to_string(),
    }
}

pub struct FaceEmbedder {
    session: Mutex<Session>,
}

impl FaceEmbedder {
    /// Load the ArcFace ONNX model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, EngineError> {
        if !model_path.exists() {
            return Err(EngineError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = %model_path.display(), "loaded face embedder model");

        Ok(Self {
            session: Mutex::new(session),
        })
    }

    /// Extract an embedding from a cropped face image.
    pub fn embed(&self, face: &DynamicImage) -> Result<FaceEmbedding, EngineError> {
        let tensor = to_nchw(face, EMBEDDER_INPUT_SIZE, EMBEDDER_MEAN, EMBEDDER_STD);

        let mut session = self.session.lock().expect("embedder session poisoned");
        let outputs = session.run(ort::inputs![TensorRef::from_array_view(tensor.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EngineError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.len() != EMBEDDING_DIM {
            return Err(EngineError::InferenceFailed(format!(
                "expected {EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(FaceEmbedding::new(raw.to_vec()))
    }
}
