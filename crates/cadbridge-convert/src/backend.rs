//! The backend adapter contract and availability caching.
//!
//! Every external tool hides behind the same two-method contract: a cheap
//! filesystem-only `probe` and a timeout-bounded `convert`. Availability is
//! an explicit value computed lazily, cached per adapter instance, and
//! invalidatable — never module-level mutable state.

use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::ConversionError;
use crate::filesystem::ScratchSpace;
use crate::formats::ToolKind;
use crate::models::BackendAvailability;

/// Uniform contract implemented by each external conversion tool.
#[async_trait]
pub trait ConversionBackend: Send + Sync {
    /// Which tool this adapter wraps.
    fn kind(&self) -> ToolKind;

    /// Check whether the tool's executable is present. Filesystem presence
    /// only — never executes the tool. Cached after the first call.
    fn probe(&self) -> BackendAvailability;

    /// Drop the cached probe result so the next `probe` re-discovers.
    fn invalidate_probe(&self);

    /// The extension (without dot) this backend produces when the caller
    /// has no preference.
    fn default_output_extension(&self) -> &'static str;

    /// Convert `input` into the scratch space, producing a file with the
    /// desired extension (or the backend's fixed fallback). The input file
    /// is never modified.
    async fn convert(
        &self,
        input: &Path,
        desired_extension: &str,
        scratch: &ScratchSpace,
    ) -> Result<std::path::PathBuf, ConversionError>;
}

/// Lazily computed, invalidatable availability cache.
#[derive(Debug, Default)]
pub struct ProbeCache {
    cached: RwLock<Option<BackendAvailability>>,
}

impl ProbeCache {
    /// New empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached availability, computing it with `probe_fn` at most
    /// once until invalidated.
    pub fn get_or_probe(&self, probe_fn: impl FnOnce() -> BackendAvailability) -> BackendAvailability {
        if let Ok(guard) = self.cached.read() {
            if let Some(cached) = guard.as_ref() {
                return cached.clone();
            }
        }

        let fresh = probe_fn();
        if let Ok(mut guard) = self.cached.write() {
            *guard = Some(fresh.clone());
        }
        fresh
    }

    /// Drop the cached value.
    pub fn invalidate(&self) {
        if let Ok(mut guard) = self.cached.write() {
            *guard = None;
        }
    }
}
