//! Unified error type for the conversion core.
//!
//! Backend-level failures (timeout, process failure, missing output) are
//! non-fatal for a request while fallback candidates remain; the
//! orchestrator catches them and moves to the next backend. Only
//! `UnsupportedFormat` and `InvalidInput` terminate a request directly.

use std::path::PathBuf;

use thiserror::Error;

use crate::formats::ToolKind;
use crate::geometry::KernelError;

/// Unified error type for all conversion operations.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The classifier has no entry for this extension.
    #[error("Unsupported format: '{extension}'")]
    UnsupportedFormat {
        /// The extension that could not be classified (with leading dot).
        extension: String,
    },

    /// The backend's executable could not be located.
    #[error("Backend '{kind}' is not available on this system")]
    BackendUnavailable {
        /// The backend that failed its availability probe.
        kind: ToolKind,
    },

    /// The conversion subprocess exceeded its time budget and was killed.
    #[error("Conversion timed out after {timeout_seconds}s")]
    Timeout {
        /// The budget that was exceeded.
        timeout_seconds: u64,
    },

    /// The conversion subprocess exited with a non-zero status.
    #[error("Conversion tool exited with code {code}: {stderr}")]
    ProcessFailed {
        /// The exit code (-1 for signal termination).
        code: i32,
        /// Captured stderr output, truncated.
        stderr: String,
    },

    /// The subprocess exited cleanly but the expected output file is missing.
    #[error("Expected output file not created: {path}")]
    NoOutput {
        /// The output path that was expected.
        path: PathBuf,
    },

    /// The output file exists but is below the minimum size.
    #[error("Output file is empty: {path}")]
    OutputEmpty {
        /// Path to the undersized output file.
        path: PathBuf,
    },

    /// The input file or topology cannot be processed at all.
    #[error("Invalid input: {reason}")]
    InvalidInput {
        /// Why the input is unusable.
        reason: String,
    },

    /// Stitching tolerance outside the accepted (0, 10] range.
    #[error("Stitch tolerance {value} is out of range (0, 10]")]
    InvalidTolerance {
        /// The rejected tolerance value.
        value: f64,
    },

    /// The geometry collaborator signalled an error.
    #[error("Geometry kernel error: {0}")]
    Kernel(#[from] KernelError),

    /// Configuration could not be loaded or failed validation.
    #[error("Configuration error: {reason}")]
    Configuration {
        /// Description of the failure.
        reason: String,
    },

    /// A path contains invalid UTF-8 and cannot be passed to a tool.
    #[error("Path is not valid UTF-8: {path}")]
    InvalidUtf8Path {
        /// The offending path.
        path: PathBuf,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConversionError {
    /// Whether this failure should trigger the orchestrator's fallback to
    /// the next candidate backend rather than terminating the request.
    pub fn triggers_fallback(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable { .. }
                | Self::Timeout { .. }
                | Self::ProcessFailed { .. }
                | Self::NoOutput { .. }
                | Self::OutputEmpty { .. }
                | Self::Io(_)
        )
    }
}
