//! Sequential batch driver.
//!
//! Applies the pipeline to N files in a strict sequential loop — one file's
//! conversion (including any subprocess) runs to completion before the next
//! begins, and one file's failure never aborts the batch. Per-file reports
//! keep input order.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::geometry::GeometryKernel;
use crate::models::{ConversionOutcome, ConversionRequest};
use crate::processor::{ConversionPipeline, IngestReport};
use crate::promotion::SolidPromotionResult;

/// How one batch entry ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchDisposition {
    /// Imported without promotion (boundary representation or no kernel).
    Imported,
    /// Imported and promoted to a closed solid.
    Promoted,
    /// Imported but degraded to a shell.
    Degraded,
    /// Needs manual conversion; instructions were produced.
    ManualRequired,
    /// Terminal failure.
    Failed,
}

/// Per-file batch result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFileReport {
    /// The input file.
    pub path: PathBuf,
    /// How it ended.
    pub disposition: BatchDisposition,
    /// Human-readable detail (failure reason, manual hint, artifact path).
    pub detail: String,
}

/// Aggregated batch outcome. File reports preserve input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Per-file reports in input order.
    pub files: Vec<BatchFileReport>,
    /// Files imported without promotion.
    pub imported: usize,
    /// Files promoted to solids.
    pub promoted: usize,
    /// Files degraded to shells.
    pub degraded: usize,
    /// Files requiring manual conversion.
    pub manual: usize,
    /// Files that failed.
    pub failed: usize,
}

impl BatchSummary {
    fn new(files: Vec<BatchFileReport>) -> Self {
        let count = |d: BatchDisposition| files.iter().filter(|f| f.disposition == d).count();
        Self {
            imported: count(BatchDisposition::Imported),
            promoted: count(BatchDisposition::Promoted),
            degraded: count(BatchDisposition::Degraded),
            manual: count(BatchDisposition::ManualRequired),
            failed: count(BatchDisposition::Failed),
            files,
        }
    }

    /// Total files processed.
    pub fn total(&self) -> usize {
        self.files.len()
    }

    /// Files that produced a usable artifact (a shell counts — it is the
    /// accepted degraded outcome, not a failure).
    pub fn successes(&self) -> usize {
        self.imported + self.promoted + self.degraded
    }
}

/// The batch driver.
pub struct BatchDriver;

impl BatchDriver {
    /// Run every file through the pipeline, sequentially and in order.
    ///
    /// With a kernel, each artifact is imported and tessellated artifacts
    /// are promoted; without one the batch stops at conversion.
    pub async fn run(
        pipeline: &ConversionPipeline,
        mut kernel: Option<&mut dyn GeometryKernel>,
        files: &[PathBuf],
    ) -> BatchSummary {
        let mut reports = Vec::with_capacity(files.len());

        for path in files {
            let request = ConversionRequest::new(path);
            let report = match kernel.as_mut() {
                Some(k) => pipeline.ingest(&mut **k, &request).await,
                None => IngestReport {
                    conversion: pipeline.convert(&request).await,
                    promotion: None,
                },
            };
            reports.push(Self::file_report(path, &report));
        }

        let summary = BatchSummary::new(reports);
        info!(
            total = summary.total(),
            successes = summary.successes(),
            manual = summary.manual,
            failed = summary.failed,
            "Batch completed"
        );
        summary
    }

    fn file_report(path: &Path, report: &IngestReport) -> BatchFileReport {
        let (disposition, detail) = match &report.conversion.outcome {
            ConversionOutcome::Failed { reason } => (BatchDisposition::Failed, reason.to_string()),
            ConversionOutcome::ManualRequired { instructions } => (
                BatchDisposition::ManualRequired,
                format!(
                    "manual conversion via {} ({})",
                    instructions.services[0].name, instructions.services[0].url
                ),
            ),
            ConversionOutcome::Direct { path } | ConversionOutcome::Converted { path, .. } => {
                match &report.promotion {
                    Some(SolidPromotionResult::Solid { .. }) => (
                        BatchDisposition::Promoted,
                        format!("promoted to solid from {}", path.display()),
                    ),
                    Some(SolidPromotionResult::Shell { .. }) => (
                        BatchDisposition::Degraded,
                        format!("kept as shell from {}", path.display()),
                    ),
                    None => (
                        BatchDisposition::Imported,
                        format!("imported {}", path.display()),
                    ),
                }
            }
        };

        BatchFileReport {
            path: path.to_path_buf(),
            disposition,
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConverterConfig;

    fn pipeline() -> ConversionPipeline {
        let config = ConverterConfig {
            scratch_root: Some(std::env::temp_dir().join("cadbridge_batch_tests")),
            ..Default::default()
        };
        ConversionPipeline::with_backends(config, Vec::new()).expect("pipeline")
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let summary = BatchDriver::run(&pipeline(), None, &[]).await;
        assert_eq!(summary.total(), 0);
        assert_eq!(summary.successes(), 0);
    }

    #[tokio::test]
    async fn test_order_preserved_and_failure_does_not_abort() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut files = Vec::new();
        for name in ["a.step", "b.step", "corrupt.zzz", "d.step", "e.step"] {
            let path = dir.path().join(name);
            std::fs::write(&path, b"data").expect("write");
            files.push(path);
        }

        let summary = BatchDriver::run(&pipeline(), None, &files).await;
        assert_eq!(summary.total(), 5);
        assert_eq!(summary.successes(), 4);
        assert_eq!(summary.failed, 1);
        // Input order preserved
        for (report, path) in summary.files.iter().zip(&files) {
            assert_eq!(&report.path, path);
        }
        assert_eq!(summary.files[2].disposition, BatchDisposition::Failed);
    }
}
