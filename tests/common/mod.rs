//! Shared fixtures for integration tests.

#![allow(dead_code)]

use face_compare::core::provider::{
    BoundingBox, DetectedFace, Embedding, FaceBackend, FaceSession, ProviderSettings,
};
use face_compare::core::PixelBuffer;
use face_compare::error::{DetectionError, ModelInitError};
use image::{Rgb, RgbImage};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Write a small solid-color PNG
pub fn write_photo(path: &Path, color: [u8; 3]) {
    RgbImage::from_pixel(16, 16, Rgb(color)).save(path).unwrap();
}

/// Face with the given raw embedding
pub fn face(values: Vec<f32>) -> DetectedFace {
    DetectedFace {
        bbox: BoundingBox {
            x1: 2.0,
            y1: 2.0,
            x2: 14.0,
            y2: 14.0,
            confidence: 0.98,
        },
        landmarks: None,
        embedding: Embedding::normalized(values),
    }
}

/// Pair of faces whose cosine similarity is `similarity`
pub fn faces_with_similarity(similarity: f32) -> (DetectedFace, DetectedFace) {
    let other = (1.0 - similarity * similarity).max(0.0).sqrt();
    (
        face(vec![1.0, 0.0, 0.0]),
        face(vec![similarity, other, 0.0]),
    )
}

/// Backend that replays one detection result per image, in order
pub struct ScriptedBackend {
    script: Vec<Vec<DetectedFace>>,
    loads: Arc<AtomicUsize>,
    fail_init: bool,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Vec<DetectedFace>>) -> Self {
        Self {
            script,
            loads: Arc::new(AtomicUsize::new(0)),
            fail_init: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_init: true,
            ..Self::new(Vec::new())
        }
    }

    /// Number of model loads, shared with the backend after it is boxed
    pub fn loads(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.loads)
    }
}

impl FaceBackend for ScriptedBackend {
    fn load(&self, _settings: &ProviderSettings) -> Result<Box<dyn FaceSession>, ModelInitError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_init {
            return Err(ModelInitError::ModelFileMissing {
                path: PathBuf::from("models/buffalo_l/det_10g.onnx"),
            });
        }
        Ok(Box::new(ScriptedSession {
            script: self.script.iter().cloned().collect(),
        }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct ScriptedSession {
    script: VecDeque<Vec<DetectedFace>>,
}

impl FaceSession for ScriptedSession {
    fn detect(&mut self, _image: &PixelBuffer) -> Result<Vec<DetectedFace>, DetectionError> {
        Ok(self.script.pop_front().unwrap_or_default())
    }
}
