//! The drawing-interchange tool adapter (ODA File Converter).
//!
//! The tool converts by directory, not by single file: the input is staged
//! into a scratch subdirectory, the tool runs once over it with a version
//! tag and an output-type tag, and the output is located afterwards by
//! reconstructing the filename from the input's base name. A clean run that
//! leaves no output is still a failure.

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

/// Binary name searched on PATH.
const BINARY_NAME: &str = "ODAFileConverter";

/// Output file version tag passed to the tool.
const OUTPUT_VERSION: &str = "ACAD2018";

/// Well-known install locations.
fn well_known_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(windows)]
    {
        for pf_var in ["ProgramFiles", "ProgramFiles(x86)"] {
            if let Ok(pf) = std::env::var(pf_var) {
                paths.push(
                    PathBuf::from(&pf)
                        .join("ODA")
                        .join("ODAFileConverter")
                        .join("ODAFileConverter.exe"),
                );
            }
        }
    }

    #[cfg(unix)]
    {
        paths.push(PathBuf::from("/usr/bin/ODAFileConverter"));
        paths.push(PathBuf::from("/opt/ODAFileConverter/ODAFileConverter"));
    }

    paths
}

/// Backend adapter for the DWG/DXF interchange tool.
pub struct DrawingToolBackend {
    /// Explicitly configured executable; empty = auto-discover.
    configured_path: PathBuf,
    /// Time budget per invocation.
    timeout_seconds: u64,
    executor: ToolExecutor,
    probe_cache: ProbeCache,
}

impl DrawingToolBackend {
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

    /// The only output types the tool understands.
    fn output_type_tag(extension: &str) -> &'static str {
        if extension.eq_ignore_ascii_case("dwg") {
            "DWG"
        } else {
            "DXF"
        }
    }
}

#[async_trait]
impl ConversionBackend for DrawingToolBackend {
    fn kind(&self) -> ToolKind {
        ToolKind::DrawingTool
    }

    fn probe(&self) -> BackendAvailability {
        self.probe_cache.get_or_probe(|| {
            match discovery::discover(&self.configured_path, &well_known_paths(), BINARY_NAME) {
                Ok(found) => {
                    info!(
                        executable = %found.executable.display(),
                        method = ?found.method,
                        "Drawing tool located"
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
        "dxf"
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

        let out_ext = if desired_extension.eq_ignore_ascii_case("dwg") {
            "dwg"
        } else {
            "dxf"
        };

        // Stage the input alone into its own directory; the tool converts
        // everything it finds there.
        let staging_dir = scratch.staging_dir(input, "staging")?;
        let output_dir = scratch.staging_dir(input, "out")?;

        let file_name = input
            .file_name()
            .ok_or_else(|| ConversionError::InvalidInput {
                reason: format!("input path has no file name: {}", input.display()),
            })?;
        let staged_input = staging_dir.join(file_name);
        tokio::fs::copy(input, &staged_input).await?;

        // The tool names its output after the staged file's stem
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ConversionError::InvalidUtf8Path {
                path: input.to_path_buf(),
            })?;
        let expected_output = output_dir.join(format!("{stem}.{out_ext}"));

        let staging_str = path_as_str(&staging_dir)?;
        let output_str = path_as_str(&output_dir)?;

        info!(
            input = %input.display(),
            output_type = Self::output_type_tag(out_ext),
            "Converting via drawing tool"
        );

        // Argument order: in_dir out_dir version type recurse audit [filter]
        self.executor
            .run(&ExecutionParams {
                executable,
                args: vec![
                    staging_str.to_string(),
                    output_str.to_string(),
                    OUTPUT_VERSION.to_string(),
                    Self::output_type_tag(out_ext).to_string(),
                    "0".to_string(),
                    "1".to_string(),
                ],
                working_dir: None,
                timeout_seconds: self.timeout_seconds,
                expected_output,
            })
            .await
    }
}

fn path_as_str(path: &Path) -> Result<&str, ConversionError> {
    path.to_str().ok_or_else(|| ConversionError::InvalidUtf8Path {
        path: path.to_path_buf(),
    })
}
