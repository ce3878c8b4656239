//! Domain models: requests, outcomes, availability, and attempt audit
//! records.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::formats::ToolKind;
use crate::manual::ManualInstructions;

/// A single conversion request. Immutable once created.
///
/// The declared extension is derived from the source path exactly once, at
/// construction — it is never re-derived mid-pipeline, so a backend renaming
/// its output cannot re-classify the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionRequest {
    /// Path to the input file.
    pub source_path: PathBuf,
    /// Lower-cased extension including the leading dot (e.g. `".stl"`).
    pub declared_extension: String,
    /// Requested output extension (without dot); `None` means the route's
    /// default product.
    pub requested_output: Option<String>,
}

impl ConversionRequest {
    /// Build a request for a file path, deriving the declared extension.
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        let source_path = source_path.into();
        let declared_extension = source_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default();

        Self {
            source_path,
            declared_extension,
            requested_output: None,
        }
    }

    /// Request a specific output extension (without dot).
    pub fn with_output_format(mut self, extension: impl Into<String>) -> Self {
        self.requested_output = Some(extension.into().to_ascii_lowercase());
        self
    }

    /// Input file name, for reports.
    pub fn file_name(&self) -> String {
        self.source_path
            .file_name()
            .and_then(|f| f.to_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown_file".to_string())
    }
}

/// Why a request terminated in `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FailureReason {
    /// The classifier has no entry for the extension.
    UnsupportedFormat {
        /// The unclassifiable extension.
        extension: String,
    },
    /// The input file or topology is unusable (missing file, zero triangles).
    InvalidInput {
        /// Description of the defect.
        reason: String,
    },
    /// The geometry collaborator failed on import or recompute.
    Kernel {
        /// Kernel-provided message.
        message: String,
    },
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedFormat { extension } => {
                write!(f, "unsupported format '{extension}'")
            }
            Self::InvalidInput { reason } => write!(f, "invalid input: {reason}"),
            Self::Kernel { message } => write!(f, "kernel error: {message}"),
        }
    }
}

/// Terminal state of a conversion request. Exactly one variant applies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ConversionOutcome {
    /// The host ingests the file as-is; no conversion was needed.
    Direct {
        /// The original input path.
        path: PathBuf,
    },
    /// An external backend produced a usable artifact.
    Converted {
        /// Path to the converted artifact in the scratch directory.
        path: PathBuf,
        /// The backend that produced it.
        produced_by: ToolKind,
    },
    /// No automatic path exists; the user must convert remotely. Terminal —
    /// never retried.
    ManualRequired {
        /// Structured instructions naming services and URLs.
        instructions: ManualInstructions,
    },
    /// The request failed with a terminal reason.
    Failed {
        /// Why.
        reason: FailureReason,
    },
}

impl ConversionOutcome {
    /// Path of the usable artifact, if one was produced.
    pub fn artifact(&self) -> Option<&Path> {
        match self {
            Self::Direct { path } | Self::Converted { path, .. } => Some(path),
            Self::ManualRequired { .. } | Self::Failed { .. } => None,
        }
    }
}

/// Result of a backend availability probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendAvailability {
    /// Whether the executable was found.
    pub available: bool,
    /// Resolved executable path, when found.
    pub resolved_executable_path: Option<PathBuf>,
}

impl BackendAvailability {
    /// An unavailable result.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            resolved_executable_path: None,
        }
    }

    /// An available result with its resolved path.
    pub fn at(path: PathBuf) -> Self {
        Self {
            available: true,
            resolved_executable_path: Some(path),
        }
    }
}

/// How a single backend attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptDisposition {
    /// Probe reported unavailable; `convert` was never invoked.
    SkippedUnavailable,
    /// The backend produced the artifact.
    Succeeded,
    /// The subprocess exceeded its budget and was killed.
    TimedOut,
    /// The subprocess exited non-zero.
    ProcessFailed {
        /// Exit code.
        code: i32,
    },
    /// Exit status and output-file existence disagreed.
    NoOutput,
    /// Some other backend-level error (IO, staging).
    Errored,
}

/// One entry in a request's audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// The backend that was considered.
    pub backend: ToolKind,
    /// How the attempt ended.
    pub disposition: AttemptDisposition,
}

/// Full report for one request: terminal outcome plus the audited attempt
/// sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestReport {
    /// The request as submitted.
    pub request: ConversionRequest,
    /// Terminal outcome.
    pub outcome: ConversionOutcome,
    /// Backend attempts, in the order they were made.
    pub attempts: Vec<AttemptRecord>,
    /// Wall-clock duration of the conversion phase.
    pub duration_ms: u64,
}
