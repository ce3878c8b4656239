//! Configuration for the conversion pipeline.
//!
//! Tool paths left empty trigger auto-discovery (well-known install
//! locations, then PATH). Loaded from TOML with a `CADBRIDGE__`-prefixed
//! environment overlay.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ConversionError;

/// Configuration for the conversion pipeline.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Path to the 3-D content tool executable (Blender).
    ///
    /// Empty = auto-discover.
    #[serde(default)]
    pub content_tool_path: PathBuf,

    /// Path to the drawing-interchange tool executable (ODA File Converter).
    ///
    /// Empty = auto-discover.
    #[serde(default)]
    pub drawing_tool_path: PathBuf,

    /// Timeout for one content-tool invocation. Heavy imports need headroom.
    #[serde(default = "default_content_tool_timeout_seconds")]
    #[validate(range(min = 30, max = 3600))]
    pub content_tool_timeout_seconds: u64,

    /// Timeout for one drawing-tool invocation.
    #[serde(default = "default_drawing_tool_timeout_seconds")]
    #[validate(range(min = 30, max = 3600))]
    pub drawing_tool_timeout_seconds: u64,

    /// Mesh stitching tolerance in length units, in (0, 10].
    #[serde(default = "default_stitch_tolerance")]
    pub stitch_tolerance: f64,

    /// Root directory for scratch files. Defaults to the system temp dir.
    #[serde(default)]
    pub scratch_root: Option<PathBuf>,

    /// Minimum output file size (bytes) to count a conversion as successful.
    #[serde(default = "default_min_output_bytes")]
    #[validate(range(min = 1))]
    pub min_output_bytes: u64,

    /// Whether to capture tool stdout/stderr for diagnostics.
    #[serde(default = "default_capture_output")]
    pub capture_output: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            content_tool_path: PathBuf::new(),
            drawing_tool_path: PathBuf::new(),
            content_tool_timeout_seconds: default_content_tool_timeout_seconds(),
            drawing_tool_timeout_seconds: default_drawing_tool_timeout_seconds(),
            stitch_tolerance: default_stitch_tolerance(),
            scratch_root: None,
            min_output_bytes: default_min_output_bytes(),
            capture_output: default_capture_output(),
        }
    }
}

fn default_content_tool_timeout_seconds() -> u64 {
    300
}

fn default_drawing_tool_timeout_seconds() -> u64 {
    120
}

fn default_stitch_tolerance() -> f64 {
    0.1
}

fn default_min_output_bytes() -> u64 {
    1
}

fn default_capture_output() -> bool {
    true
}

impl ConverterConfig {
    /// Load configuration from a TOML file (optional) plus a
    /// `CADBRIDGE__`-prefixed environment overlay, then validate.
    pub fn load(path: &str) -> Result<Self, ConversionError> {
        let raw = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("CADBRIDGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConversionError::Configuration {
                reason: format!("failed to build config: {e}"),
            })?;

        let cfg: Self = raw
            .try_deserialize()
            .map_err(|e| ConversionError::Configuration {
                reason: format!("failed to deserialize config: {e}"),
            })?;

        cfg.validate().map_err(|e| ConversionError::Configuration {
            reason: format!("invalid config: {e}"),
        })?;

        if !(cfg.stitch_tolerance > 0.0 && cfg.stitch_tolerance <= 10.0) {
            return Err(ConversionError::InvalidTolerance {
                value: cfg.stitch_tolerance,
            });
        }

        Ok(cfg)
    }

    /// Effective scratch root directory.
    pub fn effective_scratch_root(&self) -> PathBuf {
        self.scratch_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("cadbridge"))
    }
}
