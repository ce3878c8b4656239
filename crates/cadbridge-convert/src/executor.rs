//! Bounded-timeout subprocess execution for conversion tools.
//!
//! Success requires BOTH a zero exit status AND the expected output file
//! present with at least the configured minimum size — a tool may exit 0
//! having produced nothing, or produce output and then crash.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, error, info};

use crate::error::ConversionError;
use crate::filesystem;

/// Cap on stderr carried into error values.
const MAX_STDERR_CHARS: usize = 2000;

/// Parameters for one tool invocation.
#[derive(Debug, Clone)]
pub struct ExecutionParams {
    /// Resolved executable path.
    pub executable: PathBuf,
    /// Argument vector. Never shell-interpolated.
    pub args: Vec<String>,
    /// Working directory, when the tool cares.
    pub working_dir: Option<PathBuf>,
    /// Time budget in seconds.
    pub timeout_seconds: u64,
    /// The output file the tool is expected to produce.
    pub expected_output: PathBuf,
}

/// Runs external conversion tools.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    /// Minimum output size to count as success.
    min_output_bytes: u64,
    /// Whether to capture stdout/stderr.
    capture_output: bool,
}

impl ToolExecutor {
    /// Create an executor.
    pub fn new(min_output_bytes: u64, capture_output: bool) -> Self {
        Self {
            min_output_bytes,
            capture_output,
        }
    }

    /// Run a tool to completion within its budget and validate its output.
    ///
    /// On timeout the child is killed (`kill_on_drop`) and the attempt fails
    /// with [`ConversionError::Timeout`]. The input file is never touched.
    pub async fn run(&self, params: &ExecutionParams) -> Result<PathBuf, ConversionError> {
        let start = Instant::now();

        debug!(
            executable = %params.executable.display(),
            args = ?params.args,
            timeout_s = params.timeout_seconds,
            expected = %params.expected_output.display(),
            "Spawning conversion tool"
        );

        let (stdout_cfg, stderr_cfg) = if self.capture_output {
            (Stdio::piped(), Stdio::piped())
        } else {
            (Stdio::null(), Stdio::null())
        };

        let mut cmd = Command::new(&params.executable);
        cmd.args(&params.args)
            .stdin(Stdio::null())
            .stdout(stdout_cfg)
            .stderr(stderr_cfg)
            .kill_on_drop(true);

        if let Some(dir) = &params.working_dir {
            cmd.current_dir(dir);
        }

        let timeout = Duration::from_secs(params.timeout_seconds);
        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                error!(
                    executable = %params.executable.display(),
                    error = %e,
                    "Failed to spawn conversion tool"
                );
                return Err(ConversionError::Io(e));
            }
            Err(_) => {
                error!(
                    executable = %params.executable.display(),
                    timeout_s = params.timeout_seconds,
                    "Conversion tool timed out, killing process"
                );
                return Err(ConversionError::Timeout {
                    timeout_seconds: params.timeout_seconds,
                });
            }
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            error!(
                executable = %params.executable.display(),
                code,
                elapsed_ms,
                stderr = %stderr.chars().take(500).collect::<String>(),
                "Conversion tool failed"
            );
            return Err(ConversionError::ProcessFailed {
                code,
                stderr: stderr.chars().take(MAX_STDERR_CHARS).collect(),
            });
        }

        // Exit status alone is not enough
        if !params.expected_output.exists() {
            error!(
                expected = %params.expected_output.display(),
                "Tool exited cleanly but produced no output"
            );
            return Err(ConversionError::NoOutput {
                path: params.expected_output.clone(),
            });
        }
        if !filesystem::nonzero_file(&params.expected_output, self.min_output_bytes) {
            return Err(ConversionError::OutputEmpty {
                path: params.expected_output.clone(),
            });
        }

        info!(
            executable = %params.executable.display(),
            elapsed_ms,
            output = %params.expected_output.display(),
            "Conversion tool completed"
        );

        Ok(params.expected_output.clone())
    }
}
