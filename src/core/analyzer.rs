//! Demographic analysis workflow for one uploaded reference image.

use std::path::Path;

use image::imageops::FilterType;
use thiserror::Error;

use crate::engine::{preprocess, EngineError, FaceInference};
use crate::models::FaceAnalysis;

/// Uploads are shrunk to this resolution before inference to bound the cost
/// of one request.
const ANALYSIS_RESOLUTION: u32 = 160;

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("invalid image format")]
    InvalidImage,

    #[error("failed to read uploaded image: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Engine(EngineError),
}

impl From<EngineError> for AnalyzeError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidImage(_) => AnalyzeError::InvalidImage,
            other => AnalyzeError::Engine(other),
        }
    }
}

/// Decode the persisted upload, shrink it, and run demographic inference.
pub fn analyze_reference(
    engine: &dyn FaceInference,
    upload_path: &Path,
) -> Result<FaceAnalysis, AnalyzeError> {
    let bytes = std::fs::read(upload_path)?;
    let image = preprocess::decode_image(&bytes)?;
    let image = image.resize_exact(ANALYSIS_RESOLUTION, ANALYSIS_RESOLUTION, FilterType::Triangle);

    Ok(engine.analyze(&image)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FaceEmbedding;
    use crate::models::{FaceRegion, Verification};
    use image::DynamicImage;
    use std::collections::BTreeMap;
    use std::io::Write;

    struct StubEngine;

    impl FaceInference for StubEngine {
        fn analyze(&self, image: &DynamicImage) -> Result<FaceAnalysis, EngineError> {
            // The workflow must hand the engine the shrunk frame
            assert_eq!(image.width(), ANALYSIS_RESOLUTION);
            assert_eq!(image.height(), ANALYSIS_RESOLUTION);

            Ok(FaceAnalysis {
                age: 30,
                dominant_gender: "female".to_string(),
                gender: BTreeMap::new(),
                dominant_race: "white".to_string(),
                race: BTreeMap::new(),
                dominant_emotion: "happy".to_string(),
                emotion: BTreeMap::new(),
                region: FaceRegion::full_frame(160, 160),
                face_confidence: 0.0,
            })
        }

        fn embed(&self, _image: &DynamicImage) -> Result<FaceEmbedding, EngineError> {
            unreachable!("analyzer never embeds")
        }

        fn verify(
            &self,
            _reference: &FaceEmbedding,
            _target: &DynamicImage,
        ) -> Result<Verification, EngineError> {
            unreachable!("analyzer never verifies")
        }
    }

    fn write_png(dir: &tempfile::TempDir, name: &str, w: u32, h: u32) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let image = DynamicImage::new_rgb8(w, h);
        image.save_with_format(&path, image::ImageFormat::Png).unwrap();
        path
    }

    #[test]
    fn test_analyze_reference_resizes_and_delegates() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(&dir, "upload.png", 640, 480);

        let report = analyze_reference(&StubEngine, &path).unwrap();
        assert_eq!(report.age, 30);
        assert_eq!(report.dominant_emotion, "happy");
    }

    #[test]
    fn test_analyze_reference_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.bin");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"not an image at all").unwrap();

        let err = analyze_reference(&StubEngine, &path).unwrap_err();
        assert!(matches!(err, AnalyzeError::InvalidImage));
        assert_eq!(err.to_string(), "invalid image format");
    }

    #[test]
    fn test_analyze_reference_missing_file() {
        let err = analyze_reference(&StubEngine, Path::new("/nonexistent/upload.png")).unwrap_err();
        assert!(matches!(err, AnalyzeError::Io(_)));
    }
}
