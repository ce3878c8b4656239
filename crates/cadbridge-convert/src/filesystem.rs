//! Scratch-directory management for conversion artifacts.
//!
//! One `ScratchSpace` is created per pipeline instance under a
//! process-unique directory; artifact names inside it are derived
//! deterministically from the input basename, so re-running a request
//! overwrites its previous output instead of accumulating stale copies.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::ConversionError;

/// A process-scoped scratch directory.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    root: PathBuf,
}

impl ScratchSpace {
    /// Create a scratch space under `base`, scoped by a unique directory.
    pub fn create(base: &Path) -> Result<Self, ConversionError> {
        let root = base.join(format!("scope__{}", Uuid::now_v7().simple()));
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The scratch root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic output path for an input file and target extension:
    /// `<root>/<sanitized-stem>.<ext>`.
    pub fn output_path(&self, input: &Path, extension: &str) -> PathBuf {
        let stem = sanitize_stem(input);
        self.root
            .join(format!("{stem}.{}", extension.trim_start_matches('.')))
    }

    /// Deterministic staging directory for directory-based tools:
    /// `<root>/<sanitized-stem>__<label>/`. Created if absent.
    pub fn staging_dir(&self, input: &Path, label: &str) -> Result<PathBuf, ConversionError> {
        let dir = self.root.join(format!("{}__{label}", sanitize_stem(input)));
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Remove the whole scratch scope. Best-effort.
    pub fn cleanup(&self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

/// Sanitize a path's file stem for safe filesystem usage.
pub fn sanitize_stem(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed_file");

    let sanitized: String = stem
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                Some(c)
            } else if c.is_whitespace() {
                Some('_')
            } else {
                None
            }
        })
        .take(200)
        .collect();

    if sanitized.is_empty() {
        "unnamed_file".to_string()
    } else {
        sanitized
    }
}

/// Whether a file exists with at least `min_bytes` of content.
pub fn nonzero_file(path: &Path, min_bytes: u64) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() >= min_bytes)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_stem_edge_cases() {
        assert_eq!(sanitize_stem(Path::new("/data/a b c.stp")), "a_b_c");
        assert_eq!(sanitize_stem(Path::new("/data/file<>:\"|?*.dwg")), "file");
        assert_eq!(sanitize_stem(Path::new("")), "unnamed_file");
    }

    #[test]
    fn test_output_path_is_deterministic() {
        let base = tempfile::tempdir().expect("tempdir");
        let scratch = ScratchSpace::create(base.path()).expect("scratch");

        let a = scratch.output_path(Path::new("/data/Part One.fbx"), "stl");
        let b = scratch.output_path(Path::new("/data/Part One.fbx"), "stl");
        assert_eq!(a, b);
        assert_eq!(a.file_name().and_then(|f| f.to_str()), Some("Part_One.stl"));
    }

    #[test]
    fn test_scratch_scopes_are_unique() {
        let base = tempfile::tempdir().expect("tempdir");
        let a = ScratchSpace::create(base.path()).expect("scratch");
        let b = ScratchSpace::create(base.path()).expect("scratch");
        assert_ne!(a.root(), b.root());
        assert!(a.root().is_dir());
    }

    #[test]
    fn test_nonzero_file() {
        let base = tempfile::tempdir().expect("tempdir");
        let path = base.path().join("out.stl");
        assert!(!nonzero_file(&path, 1));

        std::fs::write(&path, b"").expect("write");
        assert!(!nonzero_file(&path, 1));

        std::fs::write(&path, b"solid cube").expect("write");
        assert!(nonzero_file(&path, 1));
    }

    #[test]
    fn test_staging_dir_created() {
        let base = tempfile::tempdir().expect("tempdir");
        let scratch = ScratchSpace::create(base.path()).expect("scratch");
        let dir = scratch
            .staging_dir(Path::new("/data/plan.dwg"), "staging")
            .expect("staging");
        assert!(dir.is_dir());
        assert!(dir.ends_with("plan__staging"));
    }
}
