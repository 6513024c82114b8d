//! # ONNX Backend
//!
//! Runs an InsightFace model pack with tract, a pure-Rust inference engine.
//!
//! ## Model Packs
//! Each [`ModelProfile`] is a directory under the model root holding one
//! detector and one recognizer:
//!
//! | Profile      | Detector              | Recognizer       |
//! |--------------|-----------------------|------------------|
//! | `buffalo_l`  | `det_10g.onnx`        | `w600k_r50.onnx` |
//! | `buffalo_sc` | `det_500m.onnx`       | `w600k_mbf.onnx` |
//! | `antelopev2` | `scrfd_10g_bnkps.onnx`| `glintr100.onnx` |
//!
//! ## Pipeline
//! 1. SCRFD finds face boxes and five landmarks
//! 2. Each face is aligned to the 112x112 ArcFace template
//! 3. ArcFace produces a 512-d embedding, L2-normalized here

mod arcface;
mod scrfd;

pub use arcface::{estimate_similarity, ArcFaceRecognizer, SimilarityTransform, ARCFACE_TEMPLATE};
pub use scrfd::{
    decode_outputs, non_max_suppression, FaceBox, Letterbox, ScrfdDetector, ScrfdLayout,
};

use super::{Backend, DetectedFace, FaceBackend, FaceSession, ModelProfile, ProviderSettings};
use crate::core::loader::PixelBuffer;
use crate::error::{DetectionError, ModelInitError};
use std::path::{Path, PathBuf};
use tract_onnx::prelude::*;

pub(crate) type OnnxPlan = TypedSimplePlan<TypedModel>;

/// Default location of InsightFace model packs (`~/.insightface/models`)
pub fn default_model_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".insightface")
        .join("models")
}

/// File names of the detector and recognizer for a profile
pub fn model_files(profile: ModelProfile) -> (&'static str, &'static str) {
    match profile {
        ModelProfile::BuffaloL => ("det_10g.onnx", "w600k_r50.onnx"),
        ModelProfile::BuffaloSc => ("det_500m.onnx", "w600k_mbf.onnx"),
        ModelProfile::AntelopeV2 => ("scrfd_10g_bnkps.onnx", "glintr100.onnx"),
    }
}

/// Load an ONNX file with a fixed NCHW float input
pub(crate) fn load_plan(path: &Path, input_shape: [usize; 4]) -> Result<OnnxPlan, ModelInitError> {
    if !path.is_file() {
        return Err(ModelInitError::ModelFileMissing {
            path: path.to_path_buf(),
        });
    }

    let load_error = |e: TractError| ModelInitError::Load {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    tract_onnx::onnx()
        .model_for_path(path)
        .map_err(load_error)?
        .with_input_fact(0, f32::fact(input_shape).into())
        .map_err(load_error)?
        .into_optimized()
        .map_err(load_error)?
        .into_runnable()
        .map_err(load_error)
}

/// SCRFD + ArcFace backend
#[derive(Debug, Clone)]
pub struct OnnxBackend {
    model_root: PathBuf,
}

impl OnnxBackend {
    pub fn new(model_root: impl Into<PathBuf>) -> Self {
        Self {
            model_root: model_root.into(),
        }
    }

    pub fn model_root(&self) -> &Path {
        &self.model_root
    }

    /// Paths of the detector and recognizer for a profile
    pub fn model_paths(&self, profile: ModelProfile) -> (PathBuf, PathBuf) {
        let dir = self.model_root.join(profile.name());
        let (detector, recognizer) = model_files(profile);
        (dir.join(detector), dir.join(recognizer))
    }
}

impl Default for OnnxBackend {
    fn default() -> Self {
        Self::new(default_model_root())
    }
}

impl FaceBackend for OnnxBackend {
    fn load(&self, settings: &ProviderSettings) -> Result<Box<dyn FaceSession>, ModelInitError> {
        if settings.backend == Backend::Gpu {
            return Err(ModelInitError::BackendUnavailable {
                backend: settings.backend.to_string(),
                reason: "the tract runtime only executes on the CPU".to_string(),
            });
        }

        let (detector_path, recognizer_path) = self.model_paths(settings.model);
        let detector = ScrfdDetector::load(
            &detector_path,
            settings.detection_size,
            settings.detection_threshold,
        )?;
        let recognizer = ArcFaceRecognizer::load(&recognizer_path)?;

        Ok(Box::new(OnnxSession {
            detector,
            recognizer,
        }))
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

struct OnnxSession {
    detector: ScrfdDetector,
    recognizer: ArcFaceRecognizer,
}

impl FaceSession for OnnxSession {
    fn detect(&mut self, image: &PixelBuffer) -> Result<Vec<DetectedFace>, DetectionError> {
        let boxes = self.detector.detect(image.rgb())?;
        tracing::debug!(
            path = %image.path().display(),
            faces = boxes.len(),
            "detector finished"
        );

        boxes
            .into_iter()
            .map(|face| -> Result<DetectedFace, DetectionError> {
                let embedding = self.recognizer.embed(image.rgb(), &face)?;
                Ok(DetectedFace {
                    bbox: face.bbox,
                    landmarks: face.landmarks,
                    embedding,
                })
            })
            .collect()
    }
}
