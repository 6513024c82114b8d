//! # CLI Module
//!
//! Command-line interface for face comparison.
//!
//! ## Usage
//! ```bash
//! # Compare two photos with the default model and threshold
//! face-compare alice_1.jpg alice_2.jpg
//!
//! # Stricter threshold, JSON report written to a file
//! face-compare a.jpg b.jpg --threshold 0.7 --format json --output result.json
//!
//! # Smaller model, debug logging
//! face-compare a.jpg b.jpg --model buffalo_sc --verbose
//! ```
//!
//! ## Exit codes
//! | Code | Meaning |
//! |------|---------|
//! | 0 | same person (similarity >= threshold) |
//! | 1 | different person |
//! | 2 | bad input or arguments |
//! | 3 | no face, several faces, or detection failure |
//! | 4 | model initialization failure |
//! | 5 | configuration error |
//! | 10 | unexpected failure |

use clap::{Parser, ValueEnum};
use console::{style, Term};
use face_compare::config::{self, CliOverrides, EffectiveConfig, DEFAULT_CONFIG_PATH};
use face_compare::core::provider::onnx::{default_model_root, OnnxBackend};
use face_compare::core::{compare_files, FaceBackend, ModelProfile, OutputFormat};
use face_compare::error::{ErrorCategory, FaceCompareError, ImageLoadError, ImageSide};
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Exit code for a completed comparison below the threshold
const EXIT_NOT_VERIFIED: u8 = 1;

/// Face Compare - Check whether two photos show the same person
#[derive(Parser, Debug)]
#[command(name = "face-compare")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// First image
    image1: PathBuf,

    /// Second image
    image2: PathBuf,

    /// Model profile used for detection and embedding
    #[arg(short, long)]
    model: Option<ModelArg>,

    /// Similarity needed to count as the same person (0.0-1.0)
    #[arg(short, long, value_parser = unit_interval_f64)]
    threshold: Option<f64>,

    /// Report format
    #[arg(short, long)]
    format: Option<FormatArg>,

    /// Write the report to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run the models on the GPU
    #[arg(long)]
    gpu: bool,

    /// Config file supplying defaults for options not given here
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the model profiles
    #[arg(long)]
    model_root: Option<PathBuf>,

    /// Square detector input size (multiple of 32)
    #[arg(long, value_parser = detection_size)]
    det_size: Option<u32>,

    /// Minimum detector confidence (0.0-1.0)
    #[arg(long, value_parser = unit_interval_f32)]
    det_thresh: Option<f32>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModelArg {
    /// ResNet-50 recognizer, best accuracy (default)
    #[value(name = "buffalo_l")]
    BuffaloL,
    /// MobileFaceNet recognizer, fastest
    #[value(name = "buffalo_sc")]
    BuffaloSc,
    /// ResNet-100 recognizer trained on Glint360K
    #[value(name = "antelopev2")]
    AntelopeV2,
}

impl From<ModelArg> for ModelProfile {
    fn from(model: ModelArg) -> Self {
        match model {
            ModelArg::BuffaloL => ModelProfile::BuffaloL,
            ModelArg::BuffaloSc => ModelProfile::BuffaloSc,
            ModelArg::AntelopeV2 => ModelProfile::AntelopeV2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    /// Human-readable summary
    Text,
    /// JSON document for scripting
    Json,
    /// Bordered table
    Table,
}

impl From<FormatArg> for OutputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Table => OutputFormat::Table,
        }
    }
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            model: self.model.map(Into::into),
            threshold: self.threshold,
            format: self.format.map(Into::into),
            output: self.output.clone(),
            gpu: self.gpu,
            det_size: self.det_size,
            det_thresh: self.det_thresh,
            model_root: self.model_root.clone(),
        }
    }
}

fn unit_interval_f64(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{} is outside 0.0..=1.0", value))
    }
}

fn unit_interval_f32(s: &str) -> Result<f32, String> {
    unit_interval_f64(s).map(|v| v as f32)
}

fn detection_size(s: &str) -> Result<u32, String> {
    let value: u32 = s
        .parse()
        .map_err(|_| format!("'{}' is not a positive integer", s))?;
    if value > 0 && value % 32 == 0 {
        Ok(value)
    } else {
        Err(format!("{} is not a positive multiple of 32", value))
    }
}

/// Run the CLI and return the process exit code
pub fn run() -> u8 {
    run_with(
        std::env::args_os(),
        onnx_backend,
        &mut io::stdout(),
        &mut Term::stderr(),
    )
}

/// Run with explicit arguments, backend and console sinks.
///
/// The report (or help text) goes to `stdout`; failures are written once to
/// `stderr`. A successful run with a file destination writes to neither.
pub fn run_with<I, T, F, O, E>(args: I, backend_for: F, stdout: &mut O, stderr: &mut E) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    F: FnOnce(&EffectiveConfig) -> Box<dyn FaceBackend>,
    O: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version also arrive here, on stdout with code 0
            if e.use_stderr() {
                write!(stderr, "{}", e.render()).ok();
                return ErrorCategory::Input.exit_code();
            }
            write!(stdout, "{}", e.render()).ok();
            return 0;
        }
    };

    match execute(cli, backend_for, stdout) {
        Ok(code) => code,
        Err(err) => {
            report_error(&err, stderr);
            err.exit_code()
        }
    }
}

fn onnx_backend(config: &EffectiveConfig) -> Box<dyn FaceBackend> {
    let model_root = config
        .model_root
        .clone()
        .unwrap_or_else(default_model_root);
    Box::new(OnnxBackend::new(model_root))
}

fn execute<F, O>(cli: Cli, backend_for: F, stdout: &mut O) -> Result<u8, FaceCompareError>
where
    F: FnOnce(&EffectiveConfig) -> Box<dyn FaceBackend>,
    O: Write,
{
    face_compare::init_tracing(cli.verbose);

    ensure_exists(ImageSide::First, &cli.image1)?;
    ensure_exists(ImageSide::Second, &cli.image2)?;

    let (config_path, explicit) = match &cli.config {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };
    let file = config::load_config_file(&config_path, explicit)?;
    let config = config::resolve(file, cli.overrides())?;

    let emitted = compare_files(
        backend_for(&config),
        &config,
        &cli.image1,
        &cli.image2,
        stdout,
    )?;

    Ok(if emitted.data.verified {
        0
    } else {
        EXIT_NOT_VERIFIED
    })
}

/// Fail early on inputs that cannot be stat'ed, keeping "missing" apart
/// from other I/O failures such as permission errors
fn ensure_exists(side: ImageSide, path: &Path) -> Result<(), FaceCompareError> {
    fs::metadata(path).map(|_| ()).map_err(|e| {
        let source = match e.kind() {
            io::ErrorKind::NotFound => ImageLoadError::NotFound {
                path: path.to_path_buf(),
            },
            _ => ImageLoadError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        };
        FaceCompareError::image_load(side, source)
    })
}

/// Print a failure once, as `Error <code>: <message>`
pub fn report_error<E: Write + ?Sized>(err: &FaceCompareError, stderr: &mut E) {
    writeln!(
        stderr,
        "{} {}",
        style(format!("Error {}:", err.exit_code()))
            .for_stderr()
            .red()
            .bold(),
        err
    )
    .ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use face_compare::core::provider::{
        BoundingBox, DetectedFace, Embedding, FaceSession, ProviderSettings,
    };
    use face_compare::core::PixelBuffer;
    use face_compare::error::{DetectionError, ModelInitError};
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("face-compare").chain(args.iter().copied()))
    }

    #[test]
    fn positional_images_only() {
        let cli = parse(&["a.jpg", "b.jpg"]).unwrap();
        assert_eq!(cli.image1, PathBuf::from("a.jpg"));
        assert_eq!(cli.image2, PathBuf::from("b.jpg"));
        assert_eq!(cli.overrides(), CliOverrides::default());
    }

    #[test]
    fn all_options() {
        let cli = parse(&[
            "a.jpg",
            "b.jpg",
            "-m",
            "antelopev2",
            "-t",
            "0.7",
            "-f",
            "json",
            "-o",
            "out.json",
            "--gpu",
            "-c",
            "custom.toml",
            "--model-root",
            "/models",
            "--det-size",
            "320",
            "--det-thresh",
            "0.4",
            "-v",
        ])
        .unwrap();

        let overrides = cli.overrides();
        assert_eq!(overrides.model, Some(ModelProfile::AntelopeV2));
        assert_eq!(overrides.threshold, Some(0.7));
        assert_eq!(overrides.format, Some(OutputFormat::Json));
        assert_eq!(overrides.output, Some(PathBuf::from("out.json")));
        assert!(overrides.gpu);
        assert_eq!(overrides.det_size, Some(320));
        assert_eq!(overrides.det_thresh, Some(0.4));
        assert_eq!(overrides.model_root, Some(PathBuf::from("/models")));
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(cli.verbose);
    }

    #[test]
    fn missing_second_image_is_usage_error() {
        let err = parse(&["a.jpg"]).unwrap_err();
        assert!(err.use_stderr());
    }

    #[test]
    fn threshold_outside_unit_interval_is_rejected() {
        assert!(parse(&["a.jpg", "b.jpg", "--threshold", "1.2"]).is_err());
        assert!(parse(&["a.jpg", "b.jpg", "--threshold", "-0.1"]).is_err());
        assert!(parse(&["a.jpg", "b.jpg", "--threshold", "high"]).is_err());
        assert!(parse(&["a.jpg", "b.jpg", "--threshold", "1.0"]).is_ok());
    }

    #[test]
    fn unknown_model_is_rejected() {
        assert!(parse(&["a.jpg", "b.jpg", "--model", "facenet"]).is_err());
    }

    #[test]
    fn detection_size_must_be_multiple_of_32() {
        assert!(parse(&["a.jpg", "b.jpg", "--det-size", "500"]).is_err());
        assert!(parse(&["a.jpg", "b.jpg", "--det-size", "0"]).is_err());
        assert!(parse(&["a.jpg", "b.jpg", "--det-size", "480"]).is_ok());
    }

    #[test]
    fn missing_image_is_input_error() {
        let err = ensure_exists(ImageSide::Second, Path::new("/no/such/photo.jpg")).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Input);
        assert!(err.to_string().contains("second image"));
        assert!(matches!(
            err,
            FaceCompareError::ImageLoad {
                source: ImageLoadError::NotFound { .. },
                ..
            }
        ));
    }

    #[test]
    fn unstatable_image_is_io_error_not_missing() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.png");
        fs::write(&file, b"x").unwrap();

        // A regular file used as a directory fails with ENOTDIR, not ENOENT
        let err = ensure_exists(ImageSide::First, &file.join("inner.jpg")).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Input);
        assert!(matches!(
            err,
            FaceCompareError::ImageLoad {
                side: ImageSide::First,
                source: ImageLoadError::Io { .. },
            }
        ));
    }

    /// Finds one face with the same embedding in every image
    struct SameFace;

    impl FaceBackend for SameFace {
        fn load(&self, _settings: &ProviderSettings) -> Result<Box<dyn FaceSession>, ModelInitError> {
            Ok(Box::new(SameFace))
        }

        fn name(&self) -> &str {
            "same-face"
        }
    }

    impl FaceSession for SameFace {
        fn detect(&mut self, _image: &PixelBuffer) -> Result<Vec<DetectedFace>, DetectionError> {
            Ok(vec![DetectedFace {
                bbox: BoundingBox {
                    x1: 1.0,
                    y1: 1.0,
                    x2: 7.0,
                    y2: 7.0,
                    confidence: 0.97,
                },
                landmarks: None,
                embedding: Embedding::new(vec![0.6, 0.8]),
            }])
        }
    }

    struct Workspace {
        dir: TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            for name in ["a.png", "b.png"] {
                RgbImage::from_pixel(8, 8, Rgb([180, 140, 120]))
                    .save(dir.path().join(name))
                    .unwrap();
            }
            fs::write(dir.path().join("face.toml"), "").unwrap();
            Self { dir }
        }

        fn arg(&self, name: &str) -> String {
            self.dir.path().join(name).display().to_string()
        }

        fn run(&self, extra: &[&str]) -> (u8, String, String) {
            let mut args = vec![
                "face-compare".to_string(),
                self.arg("a.png"),
                self.arg("b.png"),
                "--config".to_string(),
                self.arg("face.toml"),
            ];
            args.extend(extra.iter().map(|s| s.to_string()));

            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            let code = run_with(
                args,
                |_| Box::new(SameFace) as Box<dyn FaceBackend>,
                &mut stdout,
                &mut stderr,
            );
            (
                code,
                String::from_utf8(stdout).unwrap(),
                String::from_utf8(stderr).unwrap(),
            )
        }
    }

    #[test]
    fn verified_report_goes_to_stdout_only() {
        let ws = Workspace::new();
        let (code, stdout, stderr) = ws.run(&[]);

        assert_eq!(code, 0);
        assert!(stdout.starts_with("Comparison Result:"), "{}", stdout);
        assert!(stderr.is_empty(), "{}", stderr);
    }

    #[test]
    fn file_destination_leaves_terminal_silent() {
        let ws = Workspace::new();
        let output = ws.arg("result");
        let (code, stdout, stderr) = ws.run(&["--format", "json", "--output", &output]);

        assert_eq!(code, 0);
        assert!(stdout.is_empty(), "{}", stdout);
        assert!(stderr.is_empty(), "{}", stderr);
        assert!(ws.dir.path().join("result.json").exists());
    }

    #[test]
    fn missing_image_is_reported_once_without_loading_models() {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let code = run_with(
            ["face-compare", "missing.png", "b.png"],
            |_| -> Box<dyn FaceBackend> { panic!("backend must not be built") },
            &mut stdout,
            &mut stderr,
        );

        let stderr = String::from_utf8(stderr).unwrap();
        assert_eq!(code, 2);
        assert_eq!(stderr.matches("Error 2:").count(), 1, "{}", stderr);
        assert!(stdout.is_empty());
    }

    #[test]
    fn usage_errors_go_to_stderr_and_help_to_stdout() {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let code = run_with(
            ["face-compare", "only-one.jpg"],
            |_| -> Box<dyn FaceBackend> { unreachable!() },
            &mut stdout,
            &mut stderr,
        );
        assert_eq!(code, 2);
        assert!(stdout.is_empty());
        assert!(!stderr.is_empty());

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let code = run_with(
            ["face-compare", "--help"],
            |_| -> Box<dyn FaceBackend> { unreachable!() },
            &mut stdout,
            &mut stderr,
        );
        assert_eq!(code, 0);
        assert!(String::from_utf8(stdout).unwrap().contains("--threshold"));
        assert!(stderr.is_empty());
    }
}
