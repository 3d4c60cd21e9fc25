use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Location of a face within the analyzed frame
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl FaceRegion {
    /// Region covering the whole frame, used when detection finds nothing
    /// and permissive mode analyzes the full image.
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            w: width,
            h: height,
        }
    }
}

/// Demographic analysis of one face
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceAnalysis {
    pub age: u32,
    pub dominant_gender: String,
    /// Per-class percentages, 0..100
    pub gender: BTreeMap<String, f32>,
    pub dominant_race: String,
    pub race: BTreeMap<String, f32>,
    pub dominant_emotion: String,
    pub emotion: BTreeMap<String, f32>,
    pub region: FaceRegion,
    /// Detector confidence for `region`; 0.0 when no face was detected
    pub face_confidence: f32,
}

/// Outcome of one pairwise face verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    pub verified: bool,
    pub distance: f32,
    pub threshold: f32,
    pub similarity: f32,
    pub model: String,
}

/// Per-target record produced by the comparator. Entries keep the input URL
/// order; a failed target never displaces or aborts the others.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetComparison {
    Verified(TargetVerification),
    Failed(TargetFailure),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetVerification {
    pub url: String,
    #[serde(flatten)]
    pub verification: Verification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetFailure {
    pub url: String,
    pub error: String,
}

impl TargetComparison {
    pub fn verified(url: impl Into<String>, verification: Verification) -> Self {
        Self::Verified(TargetVerification {
            url: url.into(),
            verification,
        })
    }

    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Failed(TargetFailure {
            url: url.into(),
            error: error.into(),
        })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}
