//! # Engine Module
//!
//! Runs one face comparison from two file paths to a similarity score.
//!
//! ## Steps
//! 1. Load both images (first, then second; stop at the first failure)
//! 2. Detect faces in each
//! 3. Require exactly one face per image
//! 4. Cosine similarity of the two embeddings
//!
//! The engine never guesses which of several faces is the subject, and it
//! never returns a partial result.

mod similarity;

pub use similarity::cosine_similarity;

use crate::core::loader::{ImageLoader, PixelBuffer};
use crate::core::provider::{Embedding, ProviderHandle};
use crate::error::{FaceCompareError, FaceError, ImageSide, ProviderError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Outcome of a successful comparison
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonResult {
    /// Cosine similarity, in [-1, 1]
    pub similarity: f64,
    /// Wall-clock time from start of loading to the score
    pub elapsed: Duration,
    /// Resolved absolute path of the first image
    pub image1: PathBuf,
    /// Resolved absolute path of the second image
    pub image2: PathBuf,
    /// Model profile that produced both embeddings
    pub model: String,
    /// Faces found in (first, second) image
    pub faces_detected: (usize, usize),
}

/// Compares two face images using an owned embedding provider
#[derive(Debug)]
pub struct ComparisonEngine {
    provider: ProviderHandle,
}

impl ComparisonEngine {
    /// Create an engine; the provider is initialized on first use
    pub fn new(provider: ProviderHandle) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &ProviderHandle {
        &self.provider
    }

    /// Compare the faces in two image files
    pub fn compare(&mut self, image1: &Path, image2: &Path) -> Result<ComparisonResult> {
        let start = Instant::now();

        let first = ImageLoader::load(image1)
            .map_err(|e| FaceCompareError::image_load(ImageSide::First, e))?;
        let second = ImageLoader::load(image2)
            .map_err(|e| FaceCompareError::image_load(ImageSide::Second, e))?;

        let (embedding1, count1) = self.single_face(ImageSide::First, &first)?;
        let (embedding2, count2) = self.single_face(ImageSide::Second, &second)?;

        if embedding1.dim() != embedding2.dim() {
            return Err(FaceError::EmbeddingMismatch {
                first: embedding1.dim(),
                second: embedding2.dim(),
            }
            .into());
        }

        let similarity = cosine_similarity(embedding1.as_slice(), embedding2.as_slice());
        let elapsed = start.elapsed();

        tracing::debug!(
            similarity,
            elapsed_ms = elapsed.as_millis() as u64,
            "comparison finished"
        );

        Ok(ComparisonResult {
            similarity,
            elapsed,
            image1: resolve(image1),
            image2: resolve(image2),
            model: self.provider.settings().model.name().to_string(),
            faces_detected: (count1, count2),
        })
    }

    /// Detect faces and return the embedding of the only one
    fn single_face(&mut self, side: ImageSide, image: &PixelBuffer) -> Result<(Embedding, usize)> {
        let path = image.path().to_path_buf();
        let mut faces = self.provider.detect(image).map_err(|e| match e {
            ProviderError::Init(err) => FaceCompareError::ModelInit(err),
            ProviderError::Detection(source) => FaceError::Detection {
                side,
                path: path.clone(),
                source,
            }
            .into(),
        })?;

        tracing::debug!(%side, faces = faces.len(), "faces detected");

        match faces.len() {
            0 => Err(FaceError::NoFace { side, path }.into()),
            1 => {
                let face = faces.remove(0);
                Ok((face.embedding, 1))
            }
            count => Err(FaceError::MultipleFaces { side, path, count }.into()),
        }
    }
}

fn resolve(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
