//! # Config Module
//!
//! Resolves the settings for one invocation.
//!
//! ## Precedence
//! built-in defaults ← TOML file ← command-line flags (flags win)
//!
//! ## File format
//! ```toml
//! model = "buffalo_l"
//! threshold = 0.6
//! format = "json"
//! output = "result.json"
//! gpu = false
//! det_size = [640, 640]
//! det_thresh = 0.5
//! model_root = "/opt/models"
//! ```
//!
//! Every key is optional. Unknown keys are rejected so typos surface.

use crate::core::provider::{Backend, ModelProfile, ProviderSettings};
use crate::core::report::{Destination, OutputFormat};
use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Looked up relative to the working directory when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "configs/default.toml";

pub const DEFAULT_THRESHOLD: f64 = 0.6;
pub const DEFAULT_DETECTION_SIZE: u32 = 640;
pub const DEFAULT_DETECTION_THRESHOLD: f32 = 0.5;

/// Detector inputs must tile evenly into its largest stride
const DETECTION_SIZE_MULTIPLE: u32 = 32;

/// Raw contents of a config file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub model: Option<String>,
    pub threshold: Option<f64>,
    pub format: Option<String>,
    pub output: Option<PathBuf>,
    pub gpu: Option<bool>,
    pub det_size: Option<[u32; 2]>,
    pub det_thresh: Option<f32>,
    pub model_root: Option<PathBuf>,
}

/// Values given on the command line; `None` means "not given"
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub model: Option<ModelProfile>,
    pub threshold: Option<f64>,
    pub format: Option<OutputFormat>,
    pub output: Option<PathBuf>,
    /// `--gpu` can only switch the GPU on
    pub gpu: bool,
    pub det_size: Option<u32>,
    pub det_thresh: Option<f32>,
    pub model_root: Option<PathBuf>,
}

/// Fully resolved settings for one comparison
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub model: ModelProfile,
    pub backend: Backend,
    pub detection_size: (u32, u32),
    pub detection_threshold: f32,
    pub similarity_threshold: f64,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    /// `None` uses the provider's default model directory
    pub model_root: Option<PathBuf>,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            model: ModelProfile::default(),
            backend: Backend::default(),
            detection_size: (DEFAULT_DETECTION_SIZE, DEFAULT_DETECTION_SIZE),
            detection_threshold: DEFAULT_DETECTION_THRESHOLD,
            similarity_threshold: DEFAULT_THRESHOLD,
            format: OutputFormat::default(),
            output: None,
            model_root: None,
        }
    }
}

impl EffectiveConfig {
    /// Settings handed to the embedding provider
    pub fn provider_settings(&self) -> ProviderSettings {
        ProviderSettings {
            model: self.model,
            backend: self.backend,
            detection_size: self.detection_size,
            detection_threshold: self.detection_threshold,
        }
    }

    pub fn destination(&self) -> Destination {
        match &self.output {
            Some(path) => Destination::File(path.clone()),
            None => Destination::Stdout,
        }
    }
}

/// Read a config file.
///
/// A missing file is only an error when the user named it (`explicit`);
/// the conventional default location is allowed to be absent.
pub fn load_config_file(path: &Path, explicit: bool) -> Result<ConfigFile, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if explicit {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            tracing::debug!(path = %path.display(), "no config file, using built-in defaults");
            return Ok(ConfigFile::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let file: ConfigFile = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(file)
}

/// Layer the file and command line over the built-in defaults
pub fn resolve(file: ConfigFile, overrides: CliOverrides) -> Result<EffectiveConfig, ConfigError> {
    let mut config = EffectiveConfig::default();

    if let Some(name) = file.model {
        config.model = name
            .parse()
            .map_err(|reason| ConfigError::Invalid { key: "model", reason })?;
    }
    if let Some(threshold) = file.threshold {
        config.similarity_threshold = threshold;
    }
    if let Some(format) = file.format {
        config.format = format
            .parse()
            .map_err(|reason| ConfigError::Invalid { key: "format", reason })?;
    }
    if file.output.is_some() {
        config.output = file.output;
    }
    if file.gpu == Some(true) {
        config.backend = Backend::Gpu;
    }
    if let Some([width, height]) = file.det_size {
        config.detection_size = (width, height);
    }
    if let Some(det_thresh) = file.det_thresh {
        config.detection_threshold = det_thresh;
    }
    if file.model_root.is_some() {
        config.model_root = file.model_root;
    }

    if let Some(model) = overrides.model {
        config.model = model;
    }
    if let Some(threshold) = overrides.threshold {
        config.similarity_threshold = threshold;
    }
    if let Some(format) = overrides.format {
        config.format = format;
    }
    if overrides.output.is_some() {
        config.output = overrides.output;
    }
    if overrides.gpu {
        config.backend = Backend::Gpu;
    }
    if let Some(size) = overrides.det_size {
        config.detection_size = (size, size);
    }
    if let Some(det_thresh) = overrides.det_thresh {
        config.detection_threshold = det_thresh;
    }
    if overrides.model_root.is_some() {
        config.model_root = overrides.model_root;
    }

    validate(&config)?;
    tracing::debug!(?config, "resolved configuration");
    Ok(config)
}

fn validate(config: &EffectiveConfig) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&config.similarity_threshold) {
        return Err(ConfigError::Invalid {
            key: "threshold",
            reason: format!("{} is outside 0.0..=1.0", config.similarity_threshold),
        });
    }
    if !(0.0..=1.0).contains(&config.detection_threshold) {
        return Err(ConfigError::Invalid {
            key: "det_thresh",
            reason: format!("{} is outside 0.0..=1.0", config.detection_threshold),
        });
    }

    let (width, height) = config.detection_size;
    for side in [width, height] {
        if side == 0 || side % DETECTION_SIZE_MULTIPLE != 0 {
            return Err(ConfigError::Invalid {
                key: "det_size",
                reason: format!(
                    "{}x{} must be positive multiples of {}",
                    width, height, DETECTION_SIZE_MULTIPLE
                ),
            });
        }
    }
    Ok(())
}
