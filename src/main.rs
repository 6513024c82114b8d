//! # face-compare CLI
//!
//! Decides whether two photos show the same person.
//!
//! ## Usage
//! ```bash
//! face-compare alice_1.jpg alice_2.jpg
//! face-compare a.jpg b.jpg --threshold 0.7 --format json
//! ```

mod cli;

use console::Term;
use face_compare::error::ErrorCategory;
use face_compare::FaceCompareError;
use std::any::Any;
use std::io::Write;
use std::panic::{self, UnwindSafe};
use std::process::ExitCode;

fn main() -> ExitCode {
    ExitCode::from(guarded(cli::run, &mut Term::stderr()))
}

/// Run `body`, turning a panic into a single `Error 10` report on `stderr`.
///
/// The default hook is swapped for one that only logs at debug level, so the
/// panic is not printed a second time.
fn guarded<F, E>(body: F, stderr: &mut E) -> u8
where
    F: FnOnce() -> u8 + UnwindSafe,
    E: Write,
{
    let previous = panic::take_hook();
    panic::set_hook(Box::new(|info| {
        tracing::debug!(%info, "panic");
    }));
    let outcome = panic::catch_unwind(body);
    panic::set_hook(previous);

    match outcome {
        Ok(code) => code,
        Err(payload) => {
            let err = FaceCompareError::Unexpected(panic_message(payload.as_ref()));
            cli::report_error(&err, stderr);
            ErrorCategory::Unexpected.exit_code()
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
