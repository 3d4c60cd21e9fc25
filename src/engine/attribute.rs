//! Demographic attribute heads: age/gender, emotion, and race.
//!
//! Each head is a separate ONNX model fed a resized crop of the face (or the
//! whole frame in permissive mode). Every classifier returns a full class
//! distribution in percent.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use image::DynamicImage;
use ort::session::Session;
use ort::value::TensorRef;

use super::preprocess::{to_nchw, to_nchw_gray};
use super::EngineError;

const GENDERAGE_INPUT_SIZE: u32 = 96;
const EMOTION_INPUT_SIZE: u32 = 64;
const RACE_INPUT_SIZE: u32 = 224;

const GENDER_LABELS: [&str; 2] = ["female", "male"];

/// FER+ output order.
const EMOTION_LABELS: [&str; 8] = [
    "neutral", "happy", "surprise", "sad", "angry", "disgust", "fear", "contempt",
];

const RACE_LABELS: [&str; 6] = [
    "asian",
    "black",
    "indian",
    "latino hispanic",
    "middle eastern",
    "white",
];

/// Demographic read-out for one face crop.
#[derive(Debug, Clone)]
pub struct Demographics {
    pub age: u32,
    pub dominant_gender: String,
    pub gender: BTreeMap<String, f32>,
    pub dominant_race: String,
    pub race: BTreeMap<String, f32>,
    pub dominant_emotion: String,
    pub emotion: BTreeMap<String, f32>,
}

pub struct AttributeAnalyzer {
    genderage: Mutex<Session>,
    emotion: Mutex<Session>,
    race: Mutex<Session>,
}

impl AttributeAnalyzer {
    /// Load the three attribute models.
    pub fn load(
        genderage_path: &Path,
        emotion_path: &Path,
        race_path: &Path,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            genderage: Mutex::new(load_session(genderage_path)?),
            emotion: Mutex::new(load_session(emotion_path)?),
            race: Mutex::new(load_session(race_path)?),
        })
    }

    /// Run all heads over one face crop.
    pub fn analyze(&self, face: &DynamicImage) -> Result<Demographics, EngineError> {
        let (age, gender) = self.genderage(face)?;
        let emotion = self.emotion(face)?;
        let race = self.race(face)?;

        let (dominant_gender, gender) = distribution(&GENDER_LABELS, &gender);
        let (dominant_emotion, emotion) = distribution(&EMOTION_LABELS, &emotion);
        let (dominant_race, race) = distribution(&RACE_LABELS, &race);

        Ok(Demographics {
            age,
            dominant_gender,
            gender,
            dominant_race,
            race,
            dominant_emotion,
            emotion,
        })
    }

    /// InsightFace-style combined head: [female_logit, male_logit, age_scale].
    fn genderage(&self, face: &DynamicImage) -> Result<(u32, Vec<f32>), EngineError> {
        let tensor = to_nchw(face, GENDERAGE_INPUT_SIZE, 127.5, 128.0);

        let mut session = self.genderage.lock().expect("genderage session poisoned");
        let outputs = session.run(ort::inputs![TensorRef::from_array_view(tensor.view())?])?;
        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EngineError::InferenceFailed(format!("genderage head: {e}")))?;

        if raw.len() < 3 {
            return Err(EngineError::InferenceFailed(format!(
                "genderage head returned {} values, expected 3",
                raw.len()
            )));
        }

        let gender_probs = softmax(&raw[..2]);
        // age_scale is normalized to [0, 1]
        let age = (raw[2] * 100.0).round().clamp(1.0, 100.0) as u32;

        Ok((age, gender_probs))
    }

    /// FER+ emotion head over a raw grayscale crop.
    fn emotion(&self, face: &DynamicImage) -> Result<Vec<f32>, EngineError> {
        let tensor = to_nchw_gray(face, EMOTION_INPUT_SIZE);

        let mut session = self.emotion.lock().expect("emotion session poisoned");
        let outputs = session.run(ort::inputs![TensorRef::from_array_view(tensor.view())?])?;
        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EngineError::InferenceFailed(format!("emotion head: {e}")))?;

        if raw.len() < EMOTION_LABELS.len() {
            return Err(EngineError::InferenceFailed(format!(
                "emotion head returned {} values, expected {}",
                raw.len(),
                EMOTION_LABELS.len()
            )));
        }

        Ok(softmax(&raw[..EMOTION_LABELS.len()]))
    }

    /// Race head over a [0, 1]-scaled RGB crop.
    fn race(&self, face: &DynamicImage) -> Result<Vec<f32>, EngineError> {
        let tensor = to_nchw(face, RACE_INPUT_SIZE, 0.0, 255.0);

        let mut session = self.race.lock().expect("race session poisoned");
        let outputs = session.run(ort::inputs![TensorRef::from_array_view(tensor.view())?])?;
        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EngineError::InferenceFailed(format!("race head: {e}")))?;

        if raw.len() < RACE_LABELS.len() {
            return Err(EngineError::InferenceFailed(format!(
                "race head returned {} values, expected {}",
                raw.len(),
                RACE_LABELS.len()
            )));
        }

        Ok(softmax(&raw[..RACE_LABELS.len()]))
    }
}

fn load_session(model_path: &Path) -> Result<Session, EngineError> {
    if !model_path.exists() {
        return Err(EngineError::ModelNotFound(model_path.display().to_string()));
    }

    let session = Session::builder()?
        .with_intra_threads(2)?
        .commit_from_file(model_path)?;

    tracing::info!(path = %model_path.display(), "loaded attribute model");

    Ok(session)
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|v| v / sum).collect()
}

/// Turn class probabilities into a percent distribution plus the top label.
fn distribution(labels: &[&str], probs: &[f32]) -> (String, BTreeMap<String, f32>) {
    let mut map = BTreeMap::new();
    let mut dominant = (labels[0], f32::NEG_INFINITY);

    for (label, &prob) in labels.iter().zip(probs.iter()) {
        map.insert(label.to_string(), prob * 100.0);
        if prob > dominant.1 {
            dominant = (label, prob);
        }
    }

    (dominant.0.to_string(), map)
}
