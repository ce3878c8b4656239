//! End-to-end pipeline tests against a fake geometry kernel and stub tool
//! executables.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use cadbridge_convert::backend::{ConversionBackend, ProbeCache};
use cadbridge_convert::backends::{ContentToolBackend, DrawingToolBackend};
use cadbridge_convert::batch::{BatchDisposition, BatchDriver};
use cadbridge_convert::config::ConverterConfig;
use cadbridge_convert::error::ConversionError;
use cadbridge_convert::filesystem::ScratchSpace;
use cadbridge_convert::formats::ToolKind;
use cadbridge_convert::geometry::{
    ContainerHandle, GeometryKernel, KernelError, MeshHandle, MeshTopology, ShapeHandle,
    ShapeMetrics,
};
use cadbridge_convert::models::{
    AttemptDisposition, BackendAvailability, ConversionOutcome, ConversionRequest, FailureReason,
};
use cadbridge_convert::processor::ConversionPipeline;
use cadbridge_convert::promotion::SolidPromotionResult;

// ---------------------------------------------------------------------------
// Fake geometry kernel
// ---------------------------------------------------------------------------

/// In-memory kernel: meshes carry a canned topology, and a surface
/// classifies as a solid when every undirected edge is shared by exactly
/// two triangles.
struct FakeKernel {
    topology: MeshTopology,
    shape_closed: HashMap<u64, bool>,
    next_handle: u64,
}

impl FakeKernel {
    fn with_topology(topology: MeshTopology) -> Self {
        Self {
            topology,
            shape_closed: HashMap::new(),
            next_handle: 0,
        }
    }

    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn is_closed(topology: &MeshTopology) -> bool {
        let mut edge_counts: HashMap<(usize, usize), usize> = HashMap::new();
        for tri in &topology.triangles {
            for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                let key = (a.min(b), a.max(b));
                *edge_counts.entry(key).or_insert(0) += 1;
            }
        }
        !edge_counts.is_empty() && edge_counts.values().all(|&c| c == 2)
    }
}

impl GeometryKernel for FakeKernel {
    fn create_or_get_active_container(
        &mut self,
        _name: &str,
    ) -> Result<ContainerHandle, KernelError> {
        Ok(ContainerHandle(1))
    }

    fn import_boundary_representation(
        &mut self,
        path: &Path,
        _container: ContainerHandle,
    ) -> Result<ShapeHandle, KernelError> {
        if !path.exists() {
            return Err(KernelError::new("file not found"));
        }
        Ok(ShapeHandle(self.handle()))
    }

    fn import_mesh(
        &mut self,
        path: &Path,
        _container: ContainerHandle,
    ) -> Result<MeshHandle, KernelError> {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        if stem.contains("corrupt") {
            return Err(KernelError::new("unreadable mesh data"));
        }
        Ok(MeshHandle(self.handle()))
    }

    fn mesh_topology(&self, _mesh: MeshHandle) -> Result<MeshTopology, KernelError> {
        Ok(self.topology.clone())
    }

    fn build_surface_from_topology(
        &mut self,
        topology: &MeshTopology,
        _tolerance: f64,
    ) -> Result<ShapeHandle, KernelError> {
        let closed = Self::is_closed(topology);
        let handle = self.handle();
        self.shape_closed.insert(handle, closed);
        Ok(ShapeHandle(handle))
    }

    fn sew(&mut self, surface: ShapeHandle) -> Result<ShapeHandle, KernelError> {
        let closed = self.shape_closed.get(&surface.0).copied().unwrap_or(false);
        let handle = self.handle();
        self.shape_closed.insert(handle, closed);
        Ok(ShapeHandle(handle))
    }

    fn classify_as_solid(&mut self, surface: ShapeHandle) -> Result<ShapeHandle, KernelError> {
        if self.shape_closed.get(&surface.0).copied().unwrap_or(false) {
            Ok(surface)
        } else {
            Err(KernelError::new("shape does not enclose a volume"))
        }
    }

    fn shape_metrics(&self, shape: ShapeHandle) -> Option<ShapeMetrics> {
        self.shape_closed.get(&shape.0).map(|closed| ShapeMetrics {
            volume: closed.then_some(1.0),
            area: Some(6.0),
        })
    }

    fn recompute(&mut self, _container: ContainerHandle) -> Result<(), KernelError> {
        Ok(())
    }
}

/// A unit cube triangulation: 8 vertices, 12 triangles, every edge shared
/// by exactly two faces.
fn cube_topology() -> MeshTopology {
    MeshTopology {
        vertices: vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
            [0.0, 1.0, 1.0],
        ],
        triangles: vec![
            [0, 1, 2],
            [0, 2, 3],
            [4, 6, 5],
            [4, 7, 6],
            [0, 5, 1],
            [0, 4, 5],
            [3, 2, 6],
            [3, 6, 7],
            [0, 3, 7],
            [0, 7, 4],
            [1, 5, 6],
            [1, 6, 2],
        ],
    }
}

/// A single open triangle: sews, but never closes.
fn open_topology() -> MeshTopology {
    MeshTopology {
        vertices: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        triangles: vec![[0, 1, 2]],
    }
}

// ---------------------------------------------------------------------------
// Stub backend for routing tests
// ---------------------------------------------------------------------------

/// Scriptable in-process backend: configurable availability and conversion
/// behavior, with a shared flag recording whether `convert` was invoked.
struct StubBackend {
    kind: ToolKind,
    available: bool,
    convert_called: Arc<AtomicBool>,
    probe_cache: ProbeCache,
}

impl StubBackend {
    fn new(kind: ToolKind, available: bool) -> (Self, Arc<AtomicBool>) {
        let convert_called = Arc::new(AtomicBool::new(false));
        (
            Self {
                kind,
                available,
                convert_called: Arc::clone(&convert_called),
                probe_cache: ProbeCache::new(),
            },
            convert_called,
        )
    }
}

#[async_trait]
impl ConversionBackend for StubBackend {
    fn kind(&self) -> ToolKind {
        self.kind
    }

    fn probe(&self) -> BackendAvailability {
        self.probe_cache.get_or_probe(|| {
            if self.available {
                BackendAvailability::at(PathBuf::from("/stub/tool"))
            } else {
                BackendAvailability::unavailable()
            }
        })
    }

    fn invalidate_probe(&self) {
        self.probe_cache.invalidate();
    }

    fn default_output_extension(&self) -> &'static str {
        "stl"
    }

    async fn convert(
        &self,
        input: &Path,
        desired_extension: &str,
        scratch: &ScratchSpace,
    ) -> Result<PathBuf, ConversionError> {
        self.convert_called.store(true, Ordering::SeqCst);
        let output = scratch.output_path(input, desired_extension);
        tokio::fs::copy(input, &output).await?;
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn test_config(scratch: &Path) -> ConverterConfig {
    ConverterConfig {
        scratch_root: Some(scratch.to_path_buf()),
        ..Default::default()
    }
}

#[cfg(unix)]
fn write_stub_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write stub");
    let mut perms = std::fs::metadata(&path).expect("meta").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod");
    path
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scenario_a_manifold_stl_promotes_to_solid() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("part.stl");
    std::fs::write(&input, b"solid cube\nendsolid cube\n").expect("write");

    let pipeline =
        ConversionPipeline::with_backends(test_config(dir.path()), Vec::new()).expect("pipeline");
    let mut kernel = FakeKernel::with_topology(cube_topology());

    let report = pipeline
        .ingest(&mut kernel, &ConversionRequest::new(&input))
        .await;

    assert!(matches!(
        report.conversion.outcome,
        ConversionOutcome::Direct { .. }
    ));
    match report.promotion {
        Some(SolidPromotionResult::Solid { metrics, .. }) => {
            assert_eq!(metrics.and_then(|m| m.volume), Some(1.0));
        }
        other => panic!("expected solid promotion, got {other:?}"),
    }
}

#[tokio::test]
async fn open_mesh_degrades_to_shell() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("patch.stl");
    std::fs::write(&input, b"solid patch\nendsolid patch\n").expect("write");

    let pipeline =
        ConversionPipeline::with_backends(test_config(dir.path()), Vec::new()).expect("pipeline");
    let mut kernel = FakeKernel::with_topology(open_topology());

    let report = pipeline
        .ingest(&mut kernel, &ConversionRequest::new(&input))
        .await;

    assert!(matches!(
        report.promotion,
        Some(SolidPromotionResult::Shell { .. })
    ));
    // Degraded geometry is a reported success, not a failure
    assert!(report.conversion.outcome.artifact().is_some());
}

#[tokio::test]
async fn scenario_b_proprietary_format_yields_manual_instructions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("assembly.sldprt");
    std::fs::write(&input, b"proprietary").expect("write");

    let pipeline =
        ConversionPipeline::with_backends(test_config(dir.path()), Vec::new()).expect("pipeline");
    let report = pipeline.convert(&ConversionRequest::new(&input)).await;

    match report.outcome {
        ConversionOutcome::ManualRequired { instructions } => {
            assert!(!instructions.services.is_empty());
            assert!(instructions.services.iter().any(|s| s.url.starts_with("https://")));
            assert!(instructions.to_string().contains(".sldprt"));
        }
        other => panic!("expected ManualRequired, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_c_unavailable_content_tool_is_manual_not_failed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("model.fbx");
    std::fs::write(&input, b"fbx-data").expect("write");

    let (stub, _called) = StubBackend::new(ToolKind::ContentTool, false);
    let backends: Vec<Box<dyn ConversionBackend>> = vec![Box::new(stub)];
    let pipeline =
        ConversionPipeline::with_backends(test_config(dir.path()), backends).expect("pipeline");

    let report = pipeline.convert(&ConversionRequest::new(&input)).await;

    assert!(matches!(
        report.outcome,
        ConversionOutcome::ManualRequired { .. }
    ));
    assert_eq!(report.attempts.len(), 1);
    assert_eq!(
        report.attempts[0].disposition,
        AttemptDisposition::SkippedUnavailable
    );
}

#[tokio::test]
async fn fallback_skips_unavailable_primary_without_invoking_convert() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("plan.dxf");
    std::fs::write(&input, b"0\nSECTION\n").expect("write");

    let (drawing, drawing_called) = StubBackend::new(ToolKind::DrawingTool, false);
    let (content, content_called) = StubBackend::new(ToolKind::ContentTool, true);

    let pipeline = ConversionPipeline::with_backends(
        test_config(dir.path()),
        vec![
            Box::new(drawing) as Box<dyn ConversionBackend>,
            Box::new(content),
        ],
    )
    .expect("pipeline");

    let report = pipeline.convert(&ConversionRequest::new(&input)).await;

    match &report.outcome {
        ConversionOutcome::Converted { produced_by, .. } => {
            assert_eq!(*produced_by, ToolKind::ContentTool);
        }
        other => panic!("expected Converted, got {other:?}"),
    }

    // Primary was skipped on probe alone; its convert was never invoked
    assert!(!drawing_called.load(Ordering::SeqCst));
    assert!(content_called.load(Ordering::SeqCst));

    assert_eq!(
        report
            .attempts
            .iter()
            .map(|a| (a.backend, a.disposition.clone()))
            .collect::<Vec<_>>(),
        vec![
            (
                ToolKind::DrawingTool,
                AttemptDisposition::SkippedUnavailable
            ),
            (ToolKind::ContentTool, AttemptDisposition::Succeeded),
        ]
    );
}

#[tokio::test]
async fn dwg_has_no_content_tool_fallback() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("plan.dwg");
    std::fs::write(&input, b"AC1032").expect("write");

    let (drawing, _drawing_called) = StubBackend::new(ToolKind::DrawingTool, false);
    let (content, content_called) = StubBackend::new(ToolKind::ContentTool, true);
    let backends: Vec<Box<dyn ConversionBackend>> =
        vec![Box::new(drawing), Box::new(content)];
    let pipeline =
        ConversionPipeline::with_backends(test_config(dir.path()), backends).expect("pipeline");

    let report = pipeline.convert(&ConversionRequest::new(&input)).await;

    // Only the drawing tool supports .dwg; exhaustion goes manual
    assert!(matches!(
        report.outcome,
        ConversionOutcome::ManualRequired { .. }
    ));
    assert!(!content_called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn scenario_d_batch_completes_despite_corrupt_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let names = ["a.stl", "b.stl", "corrupt.stl", "d.stl", "e.stl"];
    let files: Vec<PathBuf> = names
        .iter()
        .map(|name| {
            let path = dir.path().join(name);
            std::fs::write(&path, b"solid x\nendsolid x\n").expect("write");
            path
        })
        .collect();

    let pipeline =
        ConversionPipeline::with_backends(test_config(dir.path()), Vec::new()).expect("pipeline");
    let mut kernel = FakeKernel::with_topology(cube_topology());

    let summary = BatchDriver::run(&pipeline, Some(&mut kernel), &files).await;

    assert_eq!(summary.total(), 5);
    assert_eq!(summary.successes(), 4);
    assert_eq!(summary.failed, 1);
    // Order preserved; the corrupt file sits where it was submitted
    assert_eq!(summary.files[2].disposition, BatchDisposition::Failed);
    assert_eq!(summary.files[2].path, files[2]);
    assert_eq!(summary.files[4].disposition, BatchDisposition::Promoted);
}

// ---------------------------------------------------------------------------
// Real adapters against stub executables (Unix)
// ---------------------------------------------------------------------------

#[cfg(unix)]
#[tokio::test]
async fn content_tool_end_to_end_with_stub_executable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("model.fbx");
    std::fs::write(&input, b"fbx-payload").expect("write");

    // Stub "blender": --background --python <script> -- <input> <output>
    let tool = write_stub_tool(dir.path(), "blender-stub", "cp \"$5\" \"$6\"");

    let backend = ContentToolBackend::new(tool, 30, 1, true);
    let pipeline = ConversionPipeline::with_backends(
        test_config(dir.path()),
        vec![Box::new(backend) as Box<dyn ConversionBackend>],
    )
    .expect("pipeline");

    let report = pipeline.convert(&ConversionRequest::new(&input)).await;

    let first_path = match &report.outcome {
        ConversionOutcome::Converted { path, produced_by } => {
            assert_eq!(*produced_by, ToolKind::ContentTool);
            assert_eq!(path.extension().and_then(|e| e.to_str()), Some("stl"));
            path.clone()
        }
        other => panic!("expected Converted, got {other:?}"),
    };
    let first_bytes = std::fs::read(&first_path).expect("read artifact");

    // Idempotence: a re-run overwrites the same artifact, byte-identical,
    // with no stale duplicates accumulating in scratch
    let report = pipeline.convert(&ConversionRequest::new(&input)).await;
    let second_path = report.outcome.artifact().expect("artifact").to_path_buf();
    assert_eq!(first_path, second_path);
    assert_eq!(first_bytes, std::fs::read(&second_path).expect("read"));

    let artifacts: Vec<_> = std::fs::read_dir(pipeline.scratch().root())
        .expect("read scratch")
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path().extension().and_then(|x| x.to_str()) == Some("stl")
        })
        .collect();
    assert_eq!(artifacts.len(), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn requested_output_override_is_honored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("model.fbx");
    std::fs::write(&input, b"fbx-payload").expect("write");

    let tool = write_stub_tool(dir.path(), "blender-stub", "cp \"$5\" \"$6\"");
    let backend = ContentToolBackend::new(tool, 30, 1, true);
    let pipeline = ConversionPipeline::with_backends(
        test_config(dir.path()),
        vec![Box::new(backend) as Box<dyn ConversionBackend>],
    )
    .expect("pipeline");

    let request = ConversionRequest::new(&input).with_output_format("obj");
    let report = pipeline.convert(&request).await;

    let artifact = report.outcome.artifact().expect("artifact");
    assert_eq!(artifact.extension().and_then(|e| e.to_str()), Some("obj"));

    // An unexportable destination falls back to the default product
    let request = ConversionRequest::new(&input).with_output_format("step");
    let report = pipeline.convert(&request).await;
    let artifact = report.outcome.artifact().expect("artifact");
    assert_eq!(artifact.extension().and_then(|e| e.to_str()), Some("stl"));
}

#[cfg(unix)]
#[tokio::test]
async fn drawing_tool_end_to_end_with_stub_executable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("plan.dwg");
    std::fs::write(&input, b"AC1032-payload").expect("write");

    // Stub "ODAFileConverter": <in_dir> <out_dir> <version> <type> <recurse> <audit>
    let tool = write_stub_tool(
        dir.path(),
        "oda-stub",
        "for f in \"$1\"/*; do b=$(basename \"$f\"); echo converted > \"$2/${b%.*}.dxf\"; done",
    );

    let backend = DrawingToolBackend::new(tool, 30, 1, true);
    let pipeline = ConversionPipeline::with_backends(
        test_config(dir.path()),
        vec![Box::new(backend) as Box<dyn ConversionBackend>],
    )
    .expect("pipeline");

    let report = pipeline.convert(&ConversionRequest::new(&input)).await;

    match &report.outcome {
        ConversionOutcome::Converted { path, produced_by } => {
            assert_eq!(*produced_by, ToolKind::DrawingTool);
            assert!(path.ends_with("plan.dxf"));
            assert!(path.exists());
        }
        other => panic!("expected Converted, got {other:?}"),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn timed_out_backend_falls_through_to_manual() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("model.fbx");
    std::fs::write(&input, b"fbx-payload").expect("write");

    let tool = write_stub_tool(dir.path(), "slow-blender", "sleep 60");
    let backend = ContentToolBackend::new(tool, 1, 1, true);
    let pipeline = ConversionPipeline::with_backends(
        test_config(dir.path()),
        vec![Box::new(backend) as Box<dyn ConversionBackend>],
    )
    .expect("pipeline");

    let start = std::time::Instant::now();
    let report = pipeline.convert(&ConversionRequest::new(&input)).await;

    // Bounded by the 1s budget plus grace, never the tool's 60s
    assert!(start.elapsed() < std::time::Duration::from_secs(10));
    assert!(matches!(
        report.outcome,
        ConversionOutcome::ManualRequired { .. }
    ));
    assert_eq!(report.attempts.len(), 1);
    assert_eq!(report.attempts[0].disposition, AttemptDisposition::TimedOut);

    let snap = pipeline.metrics_snapshot();
    assert_eq!(snap.backend_timeouts, 1);
}

#[tokio::test]
async fn invalid_tolerance_folds_into_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("part.stl");
    std::fs::write(&input, b"solid x\nendsolid x\n").expect("write");

    let config = ConverterConfig {
        stitch_tolerance: 0.0,
        scratch_root: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let pipeline = ConversionPipeline::with_backends(config, Vec::new()).expect("pipeline");
    let mut kernel = FakeKernel::with_topology(cube_topology());

    let report = pipeline
        .ingest(&mut kernel, &ConversionRequest::new(&input))
        .await;

    assert!(report.promotion.is_none());
    assert!(matches!(
        report.conversion.outcome,
        ConversionOutcome::Failed {
            reason: FailureReason::InvalidInput { .. }
        }
    ));
}
