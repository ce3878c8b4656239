//! The conversion orchestrator.
//!
//! Classifies a request, walks the route's ordered candidate backends with
//! probe-gated fallback, and hands the winning artifact to the geometry
//! collaborator — through the mesh promotion engine when the artifact is
//! tessellated. Every backend attempt is recorded, so a request's terminal
//! state is always auditable.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::backend::ConversionBackend;
use crate::backends::{ContentToolBackend, DrawingToolBackend};
use crate::config::ConverterConfig;
use crate::error::ConversionError;
use crate::filesystem::{self, ScratchSpace};
use crate::formats::{self, HandlerClass, NativeKind, ToolKind};
use crate::geometry::GeometryKernel;
use crate::manual::ManualInstructions;
use crate::metrics::{ConversionMetrics, MetricsSnapshot};
use crate::models::{
    AttemptDisposition, AttemptRecord, BackendAvailability, ConversionOutcome, ConversionRequest,
    FailureReason, RequestReport,
};
use crate::promotion::{MeshPromoter, SolidPromotionResult};
use crate::scripting;

/// Single-candidate route through the content tool.
const CONTENT_ROUTE: &[ToolKind] = &[ToolKind::ContentTool];
/// Single-candidate route through the drawing tool.
const DRAWING_ROUTE: &[ToolKind] = &[ToolKind::DrawingTool];
/// Drawing route with content-tool fallback, for formats both support.
const DRAWING_ROUTE_WITH_FALLBACK: &[ToolKind] = &[ToolKind::DrawingTool, ToolKind::ContentTool];

/// Result of one ingestion: the conversion report plus the promotion
/// outcome when the artifact went through the mesh engine.
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Conversion outcome and attempt trail.
    pub conversion: RequestReport,
    /// Promotion result for tessellated artifacts.
    pub promotion: Option<SolidPromotionResult>,
}

/// Availability and coverage of one registered backend.
#[derive(Debug, Clone, Serialize)]
pub struct BackendReport {
    /// The backend.
    pub kind: ToolKind,
    /// Its probe result.
    pub availability: BackendAvailability,
    /// Extensions this backend is the primary route for.
    pub formats: Vec<&'static str>,
}

/// The conversion pipeline.
pub struct ConversionPipeline {
    config: ConverterConfig,
    scratch: ScratchSpace,
    backends: Vec<Box<dyn ConversionBackend>>,
    metrics: Arc<ConversionMetrics>,
}

impl ConversionPipeline {
    /// Build a pipeline with the standard backends.
    pub fn new(config: ConverterConfig) -> Result<Self, ConversionError> {
        let backends: Vec<Box<dyn ConversionBackend>> = vec![
            Box::new(ContentToolBackend::new(
                config.content_tool_path.clone(),
                config.content_tool_timeout_seconds,
                config.min_output_bytes,
                config.capture_output,
            )),
            Box::new(DrawingToolBackend::new(
                config.drawing_tool_path.clone(),
                config.drawing_tool_timeout_seconds,
                config.min_output_bytes,
                config.capture_output,
            )),
        ];
        Self::with_backends(config, backends)
    }

    /// Build a pipeline with explicit backends. Used by hosts that wrap
    /// tools differently, and by tests.
    pub fn with_backends(
        config: ConverterConfig,
        backends: Vec<Box<dyn ConversionBackend>>,
    ) -> Result<Self, ConversionError> {
        let scratch = ScratchSpace::create(&config.effective_scratch_root())?;
        Ok(Self {
            config,
            scratch,
            backends,
            metrics: Arc::new(ConversionMetrics::new()),
        })
    }

    /// Run a conversion request to its terminal outcome. Never panics and
    /// never returns `Err` — failures are folded into the outcome.
    #[instrument(skip(self, request), fields(file = %request.file_name()))]
    pub async fn convert(&self, request: &ConversionRequest) -> RequestReport {
        self.metrics.record_started();
        let start = Instant::now();
        let mut attempts = Vec::new();

        let outcome = self.convert_inner(request, &mut attempts).await;

        let duration = start.elapsed();
        match &outcome {
            ConversionOutcome::Direct { .. } => self.metrics.record_direct(duration),
            ConversionOutcome::Converted { .. } => self.metrics.record_converted(duration),
            ConversionOutcome::ManualRequired { .. } => self.metrics.record_manual(),
            ConversionOutcome::Failed { .. } => self.metrics.record_failed(),
        }

        RequestReport {
            request: request.clone(),
            outcome,
            attempts,
            duration_ms: duration.as_millis() as u64,
        }
    }

    async fn convert_inner(
        &self,
        request: &ConversionRequest,
        attempts: &mut Vec<AttemptRecord>,
    ) -> ConversionOutcome {
        if !request.source_path.is_file() {
            return ConversionOutcome::Failed {
                reason: FailureReason::InvalidInput {
                    reason: format!("input file not found: {}", request.source_path.display()),
                },
            };
        }

        // Classified exactly once, from the extension derived at request
        // construction.
        let class = formats::classify(&request.declared_extension);
        info!(
            extension = %request.declared_extension,
            route = class.route_label(),
            "Classified input"
        );

        match class {
            HandlerClass::Native(_) => ConversionOutcome::Direct {
                path: request.source_path.clone(),
            },
            HandlerClass::RemoteManual => self.manual_outcome(request),
            HandlerClass::Unknown => ConversionOutcome::Failed {
                reason: FailureReason::UnsupportedFormat {
                    extension: request.declared_extension.clone(),
                },
            },
            HandlerClass::External(primary) => {
                self.run_backend_chain(request, primary, attempts).await
            }
        }
    }

    /// Walk the candidate chain for an external-tool route. The first
    /// backend producing a usable file wins; exhaustion terminates in
    /// `ManualRequired`, never a retry.
    async fn run_backend_chain(
        &self,
        request: &ConversionRequest,
        primary: ToolKind,
        attempts: &mut Vec<AttemptRecord>,
    ) -> ConversionOutcome {
        for kind in Self::route(primary, &request.declared_extension) {
            let Some(backend) = self.backend(*kind) else {
                continue;
            };

            // Probe first: a missing executable must not cost a subprocess
            // launch attempt.
            let availability = backend.probe();
            if !availability.available {
                warn!(backend = %kind, "Backend unavailable, skipping to next candidate");
                attempts.push(AttemptRecord {
                    backend: *kind,
                    disposition: AttemptDisposition::SkippedUnavailable,
                });
                continue;
            }

            let desired = request
                .requested_output
                .as_deref()
                .unwrap_or_else(|| backend.default_output_extension());

            match backend
                .convert(&request.source_path, desired, &self.scratch)
                .await
            {
                Ok(path) => {
                    attempts.push(AttemptRecord {
                        backend: *kind,
                        disposition: AttemptDisposition::Succeeded,
                    });
                    return ConversionOutcome::Converted {
                        path,
                        produced_by: *kind,
                    };
                }
                Err(e) => {
                    if matches!(e, ConversionError::Timeout { .. }) {
                        self.metrics.record_timeout();
                    }
                    warn!(backend = %kind, error = %e, "Backend attempt failed");
                    attempts.push(AttemptRecord {
                        backend: *kind,
                        disposition: Self::disposition_for(&e),
                    });
                    // A non-retryable failure ends the chain; trying another
                    // backend cannot help a broken input
                    if !e.triggers_fallback() {
                        return ConversionOutcome::Failed {
                            reason: FailureReason::InvalidInput {
                                reason: e.to_string(),
                            },
                        };
                    }
                }
            }
        }

        // No candidate succeeded; hand the user to the manual tier
        self.manual_outcome(request)
    }

    fn manual_outcome(&self, request: &ConversionRequest) -> ConversionOutcome {
        ConversionOutcome::ManualRequired {
            instructions: ManualInstructions::for_file(
                &request.source_path,
                &request.declared_extension,
            ),
        }
    }

    /// Ordered candidate list per route. Data, not conditionals: the
    /// drawing route gains the content-tool fallback exactly for the
    /// extensions the content tool's import table covers.
    fn route(primary: ToolKind, extension: &str) -> &'static [ToolKind] {
        match primary {
            ToolKind::ContentTool => CONTENT_ROUTE,
            ToolKind::DrawingTool => {
                if scripting::import_operator(extension).is_some() {
                    DRAWING_ROUTE_WITH_FALLBACK
                } else {
                    DRAWING_ROUTE
                }
            }
        }
    }

    fn disposition_for(error: &ConversionError) -> AttemptDisposition {
        match error {
            ConversionError::Timeout { .. } => AttemptDisposition::TimedOut,
            ConversionError::ProcessFailed { code, .. } => {
                AttemptDisposition::ProcessFailed { code: *code }
            }
            ConversionError::NoOutput { .. } | ConversionError::OutputEmpty { .. } => {
                AttemptDisposition::NoOutput
            }
            ConversionError::BackendUnavailable { .. } => AttemptDisposition::SkippedUnavailable,
            _ => AttemptDisposition::Errored,
        }
    }

    /// Convert and hand the artifact to the geometry collaborator,
    /// promoting tessellated artifacts to solids. Kernel failures fold into
    /// the report's outcome; the batch driver relies on this never failing
    /// hard.
    #[instrument(skip(self, kernel, request), fields(file = %request.file_name()))]
    pub async fn ingest(
        &self,
        kernel: &mut dyn GeometryKernel,
        request: &ConversionRequest,
    ) -> IngestReport {
        let mut conversion = self.convert(request).await;

        let Some(artifact) = conversion.outcome.artifact().map(Path::to_path_buf) else {
            return IngestReport {
                conversion,
                promotion: None,
            };
        };

        let was_converted = matches!(conversion.outcome, ConversionOutcome::Converted { .. });
        match self.hand_off(kernel, request, &artifact, was_converted) {
            Ok(promotion) => IngestReport {
                conversion,
                promotion,
            },
            Err(e) => {
                warn!(error = %e, "Kernel hand-off failed");
                self.metrics.record_failed();
                conversion.outcome = ConversionOutcome::Failed {
                    reason: match e {
                        ConversionError::Kernel(k) => FailureReason::Kernel { message: k.message },
                        ConversionError::InvalidInput { reason } => {
                            FailureReason::InvalidInput { reason }
                        }
                        other => FailureReason::InvalidInput {
                            reason: other.to_string(),
                        },
                    },
                };
                IngestReport {
                    conversion,
                    promotion: None,
                }
            }
        }
    }

    fn hand_off(
        &self,
        kernel: &mut dyn GeometryKernel,
        request: &ConversionRequest,
        artifact: &Path,
        was_converted: bool,
    ) -> Result<Option<SolidPromotionResult>, ConversionError> {
        let container =
            kernel.create_or_get_active_container(&filesystem::sanitize_stem(&request.source_path))?;

        // For direct imports the declared extension is authoritative; a
        // converted artifact is a new file whose own extension describes it.
        let ingest_extension = if was_converted {
            artifact
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| format!(".{}", e.to_ascii_lowercase()))
                .unwrap_or_default()
        } else {
            request.declared_extension.clone()
        };

        let is_mesh = matches!(
            formats::classify(&ingest_extension),
            HandlerClass::Native(NativeKind::Mesh)
        );

        let promotion = if is_mesh {
            let mesh = kernel.import_mesh(artifact, container)?;
            let topology = kernel.mesh_topology(mesh)?;
            let result = MeshPromoter::promote(kernel, &topology, self.config.stitch_tolerance)?;
            self.metrics.record_promotion(result.is_solid());
            Some(result)
        } else {
            kernel.import_boundary_representation(artifact, container)?;
            None
        };

        kernel.recompute(container)?;
        Ok(promotion)
    }

    fn backend(&self, kind: ToolKind) -> Option<&dyn ConversionBackend> {
        self.backends
            .iter()
            .find(|b| b.kind() == kind)
            .map(|b| b.as_ref())
    }

    /// Availability and format coverage of every registered backend.
    pub fn backend_report(&self) -> Vec<BackendReport> {
        self.backends
            .iter()
            .map(|b| BackendReport {
                kind: b.kind(),
                availability: b.probe(),
                formats: formats::extensions_for_tool(b.kind()),
            })
            .collect()
    }

    /// Drop all cached probes so the next attempt re-discovers tools.
    pub fn invalidate_probes(&self) {
        for backend in &self.backends {
            backend.invalidate_probe();
        }
    }

    /// The pipeline configuration.
    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// The scratch space artifacts are written into.
    pub fn scratch(&self) -> &ScratchSpace {
        &self.scratch
    }

    /// Metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn pipeline() -> ConversionPipeline {
        let config = ConverterConfig {
            scratch_root: Some(std::env::temp_dir().join("cadbridge_processor_tests")),
            ..Default::default()
        };
        ConversionPipeline::with_backends(config, Vec::new()).expect("pipeline")
    }

    #[test]
    fn test_routes_are_ordered_data() {
        assert_eq!(
            ConversionPipeline::route(ToolKind::ContentTool, ".fbx"),
            &[ToolKind::ContentTool]
        );
        // DXF is importable by the content tool, DWG is not
        assert_eq!(
            ConversionPipeline::route(ToolKind::DrawingTool, ".dxf"),
            &[ToolKind::DrawingTool, ToolKind::ContentTool]
        );
        assert_eq!(
            ConversionPipeline::route(ToolKind::DrawingTool, ".dwg"),
            &[ToolKind::DrawingTool]
        );
    }

    #[tokio::test]
    async fn test_unknown_extension_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("data.zzz");
        std::fs::write(&input, b"?").expect("write");

        let report = pipeline().convert(&ConversionRequest::new(&input)).await;
        assert!(matches!(
            report.outcome,
            ConversionOutcome::Failed {
                reason: FailureReason::UnsupportedFormat { .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_missing_input_fails() {
        let report = pipeline()
            .convert(&ConversionRequest::new(PathBuf::from("/nonexistent/a.step")))
            .await;
        assert!(matches!(
            report.outcome,
            ConversionOutcome::Failed {
                reason: FailureReason::InvalidInput { .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_native_format_is_direct() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("part.step");
        std::fs::write(&input, b"ISO-10303-21;").expect("write");

        let report = pipeline().convert(&ConversionRequest::new(&input)).await;
        match report.outcome {
            ConversionOutcome::Direct { path } => assert_eq!(path, input),
            other => panic!("expected Direct, got {other:?}"),
        }
        assert!(report.attempts.is_empty());
    }

    #[tokio::test]
    async fn test_remote_manual_is_terminal_with_instructions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("assembly.sldprt");
        std::fs::write(&input, b"binary").expect("write");

        let report = pipeline().convert(&ConversionRequest::new(&input)).await;
        match report.outcome {
            ConversionOutcome::ManualRequired { instructions } => {
                assert!(!instructions.services.is_empty());
                assert!(instructions.services[0].url.contains("https://"));
            }
            other => panic!("expected ManualRequired, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_external_route_without_backends_goes_manual() {
        // No registered backends at all: the chain exhausts immediately
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("model.fbx");
        std::fs::write(&input, b"fbx").expect("write");

        let report = pipeline().convert(&ConversionRequest::new(&input)).await;
        assert!(matches!(
            report.outcome,
            ConversionOutcome::ManualRequired { .. }
        ));
    }

    #[tokio::test]
    async fn test_metrics_track_outcomes() {
        let p = pipeline();
        let dir = tempfile::tempdir().expect("tempdir");
        let step = dir.path().join("a.step");
        std::fs::write(&step, b"data").expect("write");

        p.convert(&ConversionRequest::new(&step)).await;
        p.convert(&ConversionRequest::new(PathBuf::from("/nonexistent/b.step")))
            .await;

        let snap = p.metrics_snapshot();
        assert_eq!(snap.requests_started, 2);
        assert_eq!(snap.direct_imports, 1);
        assert_eq!(snap.requests_failed, 1);
    }
}
