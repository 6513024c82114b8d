//! Scripted backend for unit tests.

use super::{BoundingBox, DetectedFace, Embedding, FaceBackend, FaceSession, ProviderSettings};
use crate::core::loader::PixelBuffer;
use crate::error::{DetectionError, ModelInitError};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub(crate) const FAKE_DIM: usize = 4;

/// Builders for scripted faces
pub(crate) struct FakeFace;

impl FakeFace {
    /// Face whose embedding is the unit vector along `axis`
    pub(crate) fn along(axis: usize) -> DetectedFace {
        let mut values = vec![0.0; FAKE_DIM];
        values[axis % FAKE_DIM] = 1.0;
        Self::with_embedding(values)
    }

    /// Face with an embedding exactly as given (not normalized)
    pub(crate) fn with_embedding(values: Vec<f32>) -> DetectedFace {
        DetectedFace {
            bbox: BoundingBox {
                x1: 0.0,
                y1: 0.0,
                x2: 1.0,
                y2: 1.0,
                confidence: 0.99,
            },
            landmarks: None,
            embedding: Embedding::new(values),
        }
    }
}

#[derive(Clone, Default)]
pub(crate) struct LoadCounter(Arc<AtomicUsize>);

impl LoadCounter {
    pub(crate) fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

enum Mode {
    Script(Vec<Vec<DetectedFace>>),
    FailInit,
    FailDetect,
}

/// Returns one scripted detection result per `detect` call, in order
pub(crate) struct FakeBackend {
    mode: Mode,
    loads: LoadCounter,
}

impl FakeBackend {
    pub(crate) fn new(script: Vec<Vec<DetectedFace>>) -> Self {
        Self {
            mode: Mode::Script(script),
            loads: LoadCounter::default(),
        }
    }

    pub(crate) fn failing_init() -> Self {
        Self {
            mode: Mode::FailInit,
            loads: LoadCounter::default(),
        }
    }

    pub(crate) fn failing_detect() -> Self {
        Self {
            mode: Mode::FailDetect,
            loads: LoadCounter::default(),
        }
    }

    pub(crate) fn load_counter(&self) -> LoadCounter {
        self.loads.clone()
    }
}

impl FaceBackend for FakeBackend {
    fn load(&self, _settings: &ProviderSettings) -> Result<Box<dyn FaceSession>, ModelInitError> {
        self.loads.0.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            Mode::Script(script) => Ok(Box::new(FakeSession {
                script: script.iter().cloned().collect(),
                fail: false,
            })),
            Mode::FailDetect => Ok(Box::new(FakeSession {
                script: VecDeque::new(),
                fail: true,
            })),
            Mode::FailInit => Err(ModelInitError::ModelFileMissing {
                path: PathBuf::from("/models/missing.onnx"),
            }),
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}

struct FakeSession {
    script: VecDeque<Vec<DetectedFace>>,
    fail: bool,
}

impl FaceSession for FakeSession {
    fn detect(&mut self, _image: &PixelBuffer) -> Result<Vec<DetectedFace>, DetectionError> {
        if self.fail {
            return Err(DetectionError::Inference("scripted failure".to_string()));
        }
        Ok(self.script.pop_front().unwrap_or_default())
    }
}
