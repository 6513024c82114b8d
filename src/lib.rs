//! # Face Compare
//!
//! Decides whether two photographs show the same person.
//!
//! ## Pipeline
//! image loading → face detection and embedding → cosine similarity →
//! threshold verdict → text, JSON or table report
//!
//! ## Architecture
//! - `core` - The comparison pipeline and its embedding provider seam
//! - `config` - Defaults, TOML file and command-line layering
//! - `error` - Categorized error types with stable exit codes
//! - `cli` - Command-line interface (binary only)

pub mod config;
pub mod core;
pub mod error;

// Re-export commonly used types at the crate root
pub use error::{FaceCompareError, Result};

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the application.
///
/// Logs go to stderr so reports on stdout stay machine-readable.
/// `RUST_LOG` takes precedence; otherwise the level is `warn`, or `debug`
/// when `verbose` is set. Calling this twice keeps the first subscriber.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
