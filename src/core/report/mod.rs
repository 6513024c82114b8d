//! # Report Module
//!
//! Turns a [`ComparisonResult`] into a verdict and renders it.
//!
//! ## Verdict
//! `verified = similarity >= threshold` (a score equal to the threshold
//! is a match).
//!
//! ## Formats
//! All formats render the same [`ReportData`], whose similarity is rounded
//! to 4 decimals and detection time to 3:
//! - **text** - fixed multi-line summary
//! - **json** - machine-readable document
//! - **table** - labeled grid for terminals
//!
//! ## Destinations
//! Reports go to stdout or to a file, never both. File names are given the
//! conventional suffix of the format when they lack it (`.json` for json,
//! `.txt` or `.md` for text and table).

mod table;

pub use table::render_table;

use crate::core::engine::ComparisonResult;
use crate::error::OutputError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const SIMILARITY_DECIMALS: i32 = 4;
const TIME_DECIMALS: i32 = 3;

/// `true` when the similarity meets the threshold (inclusive)
pub fn is_verified(similarity: f64, threshold: f64) -> bool {
    similarity >= threshold
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Output rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Table,
}

impl OutputFormat {
    /// Suffix given to file destinations that lack an accepted one
    pub fn default_extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Text | OutputFormat::Table => "txt",
        }
    }

    /// Whether a file extension (without dot, any case) suits this format
    pub fn accepts_extension(&self, extension: &str) -> bool {
        let extension = extension.to_ascii_lowercase();
        match self {
            OutputFormat::Json => extension == "json",
            OutputFormat::Text | OutputFormat::Table => extension == "txt" || extension == "md",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Table => write!(f, "table"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "table" => Ok(OutputFormat::Table),
            other => Err(format!(
                "unknown output format '{}' (supported: text, json, table)",
                other
            )),
        }
    }
}

/// Where the rendered report goes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Destination {
    #[default]
    Stdout,
    File(PathBuf),
}

/// Both input paths as shown in reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportImages {
    pub image1: String,
    pub image2: String,
}

/// Face counts as shown in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFaceCounts {
    pub image1: usize,
    pub image2: usize,
}

/// Rounded, format-independent view of one comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub verified: bool,
    pub similarity: f64,
    pub threshold: f64,
    /// Seconds
    pub detection_time: f64,
    pub model: String,
    pub images: ReportImages,
    pub faces_detected: ReportFaceCounts,
}

impl ReportData {
    /// Apply the threshold and round for display.
    ///
    /// The verdict uses the unrounded similarity.
    pub fn new(result: &ComparisonResult, threshold: f64) -> Self {
        Self {
            verified: is_verified(result.similarity, threshold),
            similarity: round_to(result.similarity, SIMILARITY_DECIMALS),
            threshold,
            detection_time: round_to(result.elapsed.as_secs_f64(), TIME_DECIMALS),
            model: result.model.clone(),
            images: ReportImages {
                image1: result.image1.display().to_string(),
                image2: result.image2.display().to_string(),
            },
            faces_detected: ReportFaceCounts {
                image1: result.faces_detected.0,
                image2: result.faces_detected.1,
            },
        }
    }
}

/// Render report data in the requested format
pub fn render(data: &ReportData, format: OutputFormat) -> Result<String, OutputError> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(data).map_err(|e| OutputError::Serialize(e.to_string()))
        }
        OutputFormat::Text => Ok(render_text(data)),
        OutputFormat::Table => Ok(render_table_report(data)),
    }
}

fn verdict_mark(verified: bool) -> &'static str {
    if verified {
        "✅"
    } else {
        "❌"
    }
}

fn render_text(data: &ReportData) -> String {
    format!(
        "Comparison Result:\n  \
         Images: {} vs {}\n  \
         Verified: {}\n  \
         Similarity: {:.2}%\n  \
         Threshold: {:.2}%\n  \
         Model: {}\n  \
         Detection Time: {:.3}s\n  \
         Faces Detected: Image1={}, Image2={}",
        data.images.image1,
        data.images.image2,
        verdict_mark(data.verified),
        data.similarity * 100.0,
        data.threshold * 100.0,
        data.model,
        data.detection_time,
        data.faces_detected.image1,
        data.faces_detected.image2,
    )
}

fn render_table_report(data: &ReportData) -> String {
    let status = if data.verified {
        format!("{} Verified", verdict_mark(true))
    } else {
        format!("{} Not Verified", verdict_mark(false))
    };

    let rows = vec![
        ("Verification Status".to_string(), status),
        (
            "Similarity Score".to_string(),
            format!("{:.2}%", data.similarity * 100.0),
        ),
        (
            "Threshold".to_string(),
            format!("{:.2}%", data.threshold * 100.0),
        ),
        (
            "Detection Time".to_string(),
            format!("{:.3} seconds", data.detection_time),
        ),
        ("Model Used".to_string(), data.model.clone()),
        ("Image 1 Path".to_string(), data.images.image1.clone()),
        ("Image 2 Path".to_string(), data.images.image2.clone()),
        (
            "Faces Detected".to_string(),
            format!(
                "Image 1: {}, Image 2: {}",
                data.faces_detected.image1, data.faces_detected.image2
            ),
        ),
    ];

    render_table("Face Comparison Results", ("Metric", "Value"), &rows)
}

/// Give `path` the format's conventional suffix if it lacks an accepted one
pub fn resolve_output_path(path: &Path, format: OutputFormat) -> PathBuf {
    let accepted = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| format.accepts_extension(e));
    if accepted {
        path.to_path_buf()
    } else {
        path.with_extension(format.default_extension())
    }
}

/// What [`DecisionFormatter::format`] produced
#[derive(Debug, Clone, PartialEq)]
pub struct Emitted {
    pub data: ReportData,
    /// File actually written, after suffix correction
    pub written_to: Option<PathBuf>,
}

/// Applies the threshold and sends the rendered report to its destination
#[derive(Debug, Clone, Default)]
pub struct DecisionFormatter {
    format: OutputFormat,
    destination: Destination,
}

impl DecisionFormatter {
    pub fn new(format: OutputFormat, destination: Destination) -> Self {
        Self {
            format,
            destination,
        }
    }

    /// Render and emit, printing to the process stdout when no file is set
    pub fn format(&self, result: &ComparisonResult, threshold: f64) -> Result<Emitted, OutputError> {
        let stdout = std::io::stdout();
        self.format_to(result, threshold, stdout.lock())
    }

    /// Render and emit, using `stdout` as the console sink
    pub fn format_to<W: Write>(
        &self,
        result: &ComparisonResult,
        threshold: f64,
        mut stdout: W,
    ) -> Result<Emitted, OutputError> {
        let data = ReportData::new(result, threshold);
        let content = render(&data, self.format)?;

        let written_to = match &self.destination {
            Destination::Stdout => {
                writeln!(stdout, "{}", content)
                    .and_then(|_| stdout.flush())
                    .map_err(|source| OutputError::Write {
                        path: PathBuf::from("<stdout>"),
                        source,
                    })?;
                None
            }
            Destination::File(requested) => {
                let path = resolve_output_path(requested, self.format);
                if &path != requested {
                    tracing::warn!(
                        requested = %requested.display(),
                        actual = %path.display(),
                        "adjusted output file suffix to match {} format",
                        self.format
                    );
                }
                fs::write(&path, content.as_bytes()).map_err(|source| OutputError::Write {
                    path: path.clone(),
                    source,
                })?;
                tracing::info!(path = %path.display(), "report written");
                Some(path)
            }
        };

        Ok(Emitted { data, written_to })
    }
}
