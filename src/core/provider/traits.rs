//! Trait definitions for face detection backends.

use super::{DetectedFace, ProviderSettings};
use crate::core::loader::PixelBuffer;
use crate::error::{DetectionError, ModelInitError};

/// A model runtime that can be brought up for a given set of settings
pub trait FaceBackend: Send {
    /// Load models and return a session ready to run detection.
    ///
    /// This is the expensive step; callers go through
    /// [`ProviderHandle`](super::ProviderHandle) so it happens at most once.
    fn load(&self, settings: &ProviderSettings) -> Result<Box<dyn FaceSession>, ModelInitError>;

    /// Short backend name for logs
    fn name(&self) -> &str;
}

/// Loaded models, ready to find faces
pub trait FaceSession: Send {
    /// Find every face in the image, each with an L2-normalized embedding
    fn detect(&mut self, image: &PixelBuffer) -> Result<Vec<DetectedFace>, DetectionError>;
}
