//! # Provider Module
//!
//! Face detection and embedding extraction behind a narrow interface.
//!
//! ## Layers
//! - [`FaceBackend`] / [`FaceSession`] - what a concrete model runtime implements
//! - [`ProviderHandle`] - lazy, idempotent initialization around a backend
//! - [`onnx`] - SCRFD + ArcFace models executed with tract
//!
//! The comparison engine only ever talks to a `ProviderHandle`, so any
//! backend (including a scripted fake in tests) can be substituted.

#[cfg(test)]
pub(crate) mod fake;
mod handle;
pub mod onnx;
mod profile;
mod traits;

pub use handle::{ProviderHandle, ProviderStatus};
pub use profile::ModelProfile;
pub use traits::{FaceBackend, FaceSession};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Compute target used to run the models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Cpu,
    Gpu,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Cpu => write!(f, "cpu"),
            Backend::Gpu => write!(f, "gpu"),
        }
    }
}

/// Everything a backend needs to load its models
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub model: ModelProfile,
    pub backend: Backend,
    /// Detector input size as (width, height)
    pub detection_size: (u32, u32),
    /// Minimum detector confidence for a face to be reported
    pub detection_threshold: f32,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            model: ModelProfile::default(),
            backend: Backend::Cpu,
            detection_size: (640, 640),
            detection_threshold: 0.5,
        }
    }
}

/// Axis-aligned face box in source image pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with another box
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let intersection = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }
}

/// Five facial keypoints: left eye, right eye, nose, left and right mouth corner
pub type Landmarks = [(f32, f32); 5];

/// Face identity vector
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    values: Vec<f32>,
}

impl Embedding {
    /// Wrap raw values as produced by the model
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Scale to unit length; zero vectors are left untouched
    pub fn normalized(mut values: Vec<f32>) -> Self {
        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in values.iter_mut() {
                *v /= norm;
            }
        }
        Self { values }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    pub fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }
}

/// One face found in an image
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub landmarks: Option<Landmarks>,
    pub embedding: Embedding,
}
