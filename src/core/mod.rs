//! # Core Module
//!
//! The face comparison pipeline, independent of the command line.
//!
//! ## Modules
//! - `loader` - Decodes image files into oriented RGB buffers
//! - `provider` - Detects faces and extracts embeddings
//! - `engine` - Compares the single faces of two images
//! - `report` - Applies the threshold and renders the verdict

pub mod engine;
pub mod loader;
pub mod provider;
pub mod report;

// Re-export commonly used types
pub use engine::{ComparisonEngine, ComparisonResult};
pub use loader::{ImageLoader, PixelBuffer};
pub use provider::{FaceBackend, ModelProfile, ProviderHandle, ProviderSettings};
pub use report::{DecisionFormatter, Destination, Emitted, OutputFormat, ReportData};

use crate::config::EffectiveConfig;
use crate::error::Result;
use std::io::Write;
use std::path::Path;

/// Compare two image files and emit the report described by `config`.
///
/// The backend is wrapped in a fresh [`ProviderHandle`], so models load at
/// most once and only after both images decoded. Console output goes to
/// `stdout`; nothing is written there when the report goes to a file.
pub fn compare_files<W: Write>(
    backend: Box<dyn FaceBackend>,
    config: &EffectiveConfig,
    image1: &Path,
    image2: &Path,
    stdout: W,
) -> Result<Emitted> {
    let provider = ProviderHandle::new(backend, config.provider_settings());
    let mut engine = ComparisonEngine::new(provider);
    let result = engine.compare(image1, image2)?;

    let formatter = DecisionFormatter::new(config.format, config.destination());
    let emitted = formatter.format_to(&result, config.similarity_threshold, stdout)?;

    tracing::info!(
        verified = emitted.data.verified,
        similarity = emitted.data.similarity,
        threshold = emitted.data.threshold,
        "comparison complete"
    );
    Ok(emitted)
}
