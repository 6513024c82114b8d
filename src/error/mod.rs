//! # Error Module
//!
//! Categorized error types for face comparison.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - which image, which stage, what went wrong
//! - **Stable categories** - every error maps to exactly one exit code

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which of the two compared inputs an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSide {
    First,
    Second,
}

impl fmt::Display for ImageSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSide::First => write!(f, "first image"),
            ImageSide::Second => write!(f, "second image"),
        }
    }
}

/// Top-level application error
#[derive(Error, Debug)]
pub enum FaceCompareError {
    #[error("Failed to load {side}: {source}")]
    ImageLoad {
        side: ImageSide,
        #[source]
        source: ImageLoadError,
    },

    #[error(transparent)]
    Face(#[from] FaceError),

    #[error("Model initialization failed: {0}")]
    ModelInit(#[from] ModelInitError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Coarse error families, one per exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or undecodable input, bad arguments
    Input,
    /// No face, several faces, or detection failure
    Face,
    /// Embedding provider could not be brought up
    ModelInit,
    /// Config file missing or malformed, invalid option values
    Config,
    /// Anything else
    Unexpected,
}

impl ErrorCategory {
    /// Process exit code for this category.
    ///
    /// Codes 0 and 1 are reserved for completed comparisons
    /// (verified / below threshold).
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorCategory::Input => 2,
            ErrorCategory::Face => 3,
            ErrorCategory::ModelInit => 4,
            ErrorCategory::Config => 5,
            ErrorCategory::Unexpected => 10,
        }
    }
}

impl FaceCompareError {
    /// Wrap an image loading error with the side that caused it
    pub fn image_load(side: ImageSide, source: ImageLoadError) -> Self {
        FaceCompareError::ImageLoad { side, source }
    }

    /// Category used for exit code selection
    pub fn category(&self) -> ErrorCategory {
        match self {
            FaceCompareError::ImageLoad { .. } => ErrorCategory::Input,
            FaceCompareError::Face(_) => ErrorCategory::Face,
            FaceCompareError::ModelInit(_) => ErrorCategory::ModelInit,
            FaceCompareError::Config(_) => ErrorCategory::Config,
            FaceCompareError::Output(_) | FaceCompareError::Unexpected(_) => {
                ErrorCategory::Unexpected
            }
        }
    }

    /// Shorthand for `self.category().exit_code()`
    pub fn exit_code(&self) -> u8 {
        self.category().exit_code()
    }
}

/// Errors that occur while reading an image from disk
#[derive(Error, Debug)]
pub enum ImageLoadError {
    #[error("Image not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to read image file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode image {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
}

impl ImageLoadError {
    /// Path of the offending file
    pub fn path(&self) -> &PathBuf {
        match self {
            ImageLoadError::NotFound { path }
            | ImageLoadError::Io { path, .. }
            | ImageLoadError::Decode { path, .. } => path,
        }
    }
}

/// Errors raised by a provider while running detection on a loaded image
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Model produced unexpected output: {0}")]
    InvalidOutput(String),
}

/// Errors about the faces found (or not found) in an image
#[derive(Error, Debug)]
pub enum FaceError {
    #[error("No face detected in {side} ({path})")]
    NoFace { side: ImageSide, path: PathBuf },

    #[error("Multiple faces detected in {side} ({path}): found {count}, expected exactly one")]
    MultipleFaces {
        side: ImageSide,
        path: PathBuf,
        count: usize,
    },

    #[error("Face detection failed for {side} ({path}): {source}")]
    Detection {
        side: ImageSide,
        path: PathBuf,
        #[source]
        source: DetectionError,
    },

    #[error("Embedding dimensions differ ({first} vs {second}); were they produced by the same model?")]
    EmbeddingMismatch { first: usize, second: usize },
}

/// Errors that occur while bringing up the embedding provider
#[derive(Error, Debug, Clone)]
pub enum ModelInitError {
    #[error("Model file not found: {path}. Download the model pack and place it there.")]
    ModelFileMissing { path: PathBuf },

    #[error("Failed to load model {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("Compute backend '{backend}' is not available: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    #[error("Provider already initialized with different settings")]
    SettingsChanged,

    #[error("A previous initialization attempt did not complete")]
    Interrupted,
}

/// Failure of a provider call, split by stage
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error(transparent)]
    Init(#[from] ModelInitError),

    #[error(transparent)]
    Detection(#[from] DetectionError),
}

/// Errors that occur while resolving configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Errors that occur while emitting the report
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write report to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize report: {0}")]
    Serialize(String),
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, FaceCompareError>;
