//! Lazy, idempotent provider initialization.

use super::{DetectedFace, FaceBackend, FaceSession, ProviderSettings};
use crate::core::loader::PixelBuffer;
use crate::error::{ModelInitError, ProviderError};
use std::time::Instant;

/// Observable lifecycle of a [`ProviderHandle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

enum State {
    Uninitialized,
    Initializing,
    Ready(Box<dyn FaceSession>),
    Failed(ModelInitError),
}

/// Single owned handle to an embedding provider.
///
/// Models are loaded on the first [`detect`](Self::detect) (or an explicit
/// [`initialize`](Self::initialize)), never at construction. Once `Ready` or
/// `Failed` the handle never loads again.
pub struct ProviderHandle {
    backend: Box<dyn FaceBackend>,
    settings: ProviderSettings,
    state: State,
}

impl ProviderHandle {
    /// Create a handle; no models are loaded yet
    pub fn new(backend: Box<dyn FaceBackend>, settings: ProviderSettings) -> Self {
        Self {
            backend,
            settings,
            state: State::Uninitialized,
        }
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    pub fn status(&self) -> ProviderStatus {
        match self.state {
            State::Uninitialized => ProviderStatus::Uninitialized,
            State::Initializing => ProviderStatus::Initializing,
            State::Ready(_) => ProviderStatus::Ready,
            State::Failed(_) => ProviderStatus::Failed,
        }
    }

    /// Load the models if that has not happened yet.
    ///
    /// A failed attempt is remembered and returned again on later calls.
    pub fn initialize(&mut self) -> Result<(), ModelInitError> {
        match &self.state {
            State::Ready(_) => return Ok(()),
            State::Failed(err) => return Err(err.clone()),
            State::Initializing => return Err(ModelInitError::Interrupted),
            State::Uninitialized => {}
        }

        self.state = State::Initializing;
        let started = Instant::now();
        tracing::debug!(
            backend = self.backend.name(),
            model = %self.settings.model,
            compute = %self.settings.backend,
            "initializing face provider"
        );

        match self.backend.load(&self.settings) {
            Ok(session) => {
                tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "face provider ready");
                self.state = State::Ready(session);
                Ok(())
            }
            Err(err) => {
                tracing::debug!(error = %err, "face provider failed to initialize");
                self.state = State::Failed(err.clone());
                Err(err)
            }
        }
    }

    /// Initialize with explicit settings.
    ///
    /// Identical settings are a no-op once initialized; different settings
    /// are only accepted before the first load.
    pub fn initialize_with(&mut self, settings: ProviderSettings) -> Result<(), ModelInitError> {
        if settings != self.settings {
            if self.status() != ProviderStatus::Uninitialized {
                return Err(ModelInitError::SettingsChanged);
            }
            self.settings = settings;
        }
        self.initialize()
    }

    /// Detect faces, initializing the provider first if needed
    pub fn detect(&mut self, image: &PixelBuffer) -> Result<Vec<DetectedFace>, ProviderError> {
        self.initialize()?;
        match &mut self.state {
            State::Ready(session) => Ok(session.detect(image)?),
            _ => Err(ProviderError::Init(ModelInitError::Interrupted)),
        }
    }
}

impl std::fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("backend", &self.backend.name())
            .field("settings", &self.settings)
            .field("status", &self.status())
            .finish()
    }
}
