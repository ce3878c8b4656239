//! The general 3-D content tool adapter (Blender, headless).
//!
//! Runs the tool in background mode with a generated driver script; the
//! import routine is selected by source extension and the export routine by
//! destination extension from two independent tables (see
//! [`crate::scripting`]).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::backend::{ConversionBackend, ProbeCache};
use crate::discovery;
use crate::error::ConversionError;
use crate::executor::{ExecutionParams, ToolExecutor};
use crate::filesystem::ScratchSpace;
use crate::formats::ToolKind;
use crate::models::BackendAvailability;
use crate::scripting::{self, DriverScript};

/// Binary name searched on PATH.
const BINARY_NAME: &str = "blender";

/// Well-known install locations, checked when no explicit path is set.
fn well_known_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(windows)]
    {
        for pf_var in ["ProgramFiles", "ProgramFiles(x86)"] {
            if let Ok(pf) = std::env::var(pf_var) {
                for version in ["4.4", "4.3", "4.2"] {
                    paths.push(
                        PathBuf::from(&pf)
                            .join("Blender Foundation")
                            .join(format!("Blender {version}"))
                            .join("blender.exe"),
                    );
                }
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        paths.push(PathBuf::from(
            "/Applications/Blender.app/Contents/MacOS/Blender",
        ));
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        paths.push(PathBuf::from("/usr/bin/blender"));
        paths.push(PathBuf::from("/usr/local/bin/blender"));
        paths.push(PathBuf::from("/snap/bin/blender"));
    }

    paths
}

/// Backend adapter for the headless 3-D content tool.
pub struct ContentToolBackend {
    /// Explicitly configured executable; empty = auto-discover.
    configured_path: PathBuf,
    /// Time budget per invocation.
    timeout_seconds: u64,
    executor: ToolExecutor,
    probe_cache: ProbeCache,
}

impl ContentToolBackend {
    /// Create the adapter from configuration values.
    pub fn new(
        configured_path: PathBuf,
        timeout_seconds: u64,
        min_output_bytes: u64,
        capture_output: bool,
    ) -> Self {
        Self {
            configured_path,
            timeout_seconds,
            executor: ToolExecutor::new(min_output_bytes, capture_output),
            probe_cache: ProbeCache::new(),
        }
    }
}

#[async_trait]
impl ConversionBackend for ContentToolBackend {
    fn kind(&self) -> ToolKind {
        ToolKind::ContentTool
    }

    fn probe(&self) -> BackendAvailability {
        self.probe_cache.get_or_probe(|| {
            match discovery::discover(&self.configured_path, &well_known_paths(), BINARY_NAME) {
                Ok(found) => {
                    info!(
                        executable = %found.executable.display(),
                        method = ?found.method,
                        "Content tool located"
                    );
                    BackendAvailability::at(found.executable)
                }
                Err(_) => BackendAvailability::unavailable(),
            }
        })
    }

    fn invalidate_probe(&self) {
        self.probe_cache.invalidate();
    }

    fn default_output_extension(&self) -> &'static str {
        scripting::DEFAULT_EXPORT_EXTENSION
    }

    async fn convert(
        &self,
        input: &Path,
        desired_extension: &str,
        scratch: &ScratchSpace,
    ) -> Result<PathBuf, ConversionError> {
        let availability = self.probe();
        let executable =
            availability
                .resolved_executable_path
                .ok_or(ConversionError::BackendUnavailable {
                    kind: self.kind(),
                })?;

        let source_extension = input
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        // Unmapped destinations export as the fixed default format
        let (target_extension, _) = scripting::resolve_export(desired_extension);
        let output_path = scratch.output_path(input, target_extension);

        let script_path =
            DriverScript::write(scratch, input, &source_extension, target_extension).await?;

        let input_str = path_as_str(input)?;
        let output_str = path_as_str(&output_path)?;
        let script_str = path_as_str(&script_path)?;

        info!(
            input = %input.display(),
            target = target_extension,
            "Converting via content tool"
        );

        let result = self
            .executor
            .run(&ExecutionParams {
                executable,
                args: vec![
                    "--background".to_string(),
                    "--python".to_string(),
                    script_str.to_string(),
                    "--".to_string(),
                    input_str.to_string(),
                    output_str.to_string(),
                ],
                working_dir: Some(scratch.root().to_path_buf()),
                timeout_seconds: self.timeout_seconds,
                expected_output: output_path,
            })
            .await;

        // The script is a scratch artifact; the output is the deliverable
        let _ = tokio::fs::remove_file(&script_path).await;

        result
    }
}

fn path_as_str(path: &Path) -> Result<&str, ConversionError> {
    path.to_str().ok_or_else(|| ConversionError::InvalidUtf8Path {
        path: path.to_path_buf(),
    })
}
