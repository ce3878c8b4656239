//! External tool discovery.
//!
//! Locates a conversion tool's executable by checking, in order:
//! 1. An explicitly configured path
//! 2. A short list of well-known install locations
//! 3. The system PATH
//!
//! Discovery only checks filesystem presence — it never executes the tool.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors from tool discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The tool was not found anywhere.
    #[error("'{binary}' not found in configured path, well-known locations, or PATH")]
    NotFound {
        /// The binary name that was searched for.
        binary: String,
    },
}

/// How an executable was located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    /// Explicitly configured by the user.
    ExplicitConfig,
    /// Found in a well-known install location.
    WellKnownPath,
    /// Found via the PATH environment variable.
    SystemPath,
}

/// A located tool executable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredTool {
    /// Full path to the executable.
    pub executable: PathBuf,
    /// How it was found.
    pub method: DiscoveryMethod,
}

/// Resolve a tool executable.
///
/// `explicit` is consulted first when non-empty; an explicit path that does
/// not exist falls through to the well-known list rather than failing, so a
/// stale config entry degrades to auto-discovery.
pub fn discover(
    explicit: &Path,
    well_known: &[PathBuf],
    binary: &str,
) -> Result<DiscoveredTool, DiscoveryError> {
    if !explicit.as_os_str().is_empty() {
        if explicit.is_file() {
            return Ok(DiscoveredTool {
                executable: explicit.to_path_buf(),
                method: DiscoveryMethod::ExplicitConfig,
            });
        }
        debug!(
            path = %explicit.display(),
            "Configured tool path does not exist, trying well-known locations"
        );
    }

    for candidate in well_known {
        if candidate.is_file() {
            return Ok(DiscoveredTool {
                executable: candidate.clone(),
                method: DiscoveryMethod::WellKnownPath,
            });
        }
    }

    find_in_path(binary)
        .map(|executable| DiscoveredTool {
            executable,
            method: DiscoveryMethod::SystemPath,
        })
        .ok_or_else(|| DiscoveryError::NotFound {
            binary: binary.to_string(),
        })
}

/// Scan the PATH environment variable for a binary, by presence only.
fn find_in_path(binary: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;

    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(binary);
        if candidate.is_file() {
            return Some(candidate);
        }
        #[cfg(windows)]
        {
            let candidate = dir.join(format!("{binary}.exe"));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let dir = tempfile::tempdir().expect("tempdir");
        let exe = dir.path().join("tool");
        std::fs::write(&exe, "#!/bin/sh\n").expect("write");

        let found = discover(&exe, &[], "tool").expect("found");
        assert_eq!(found.executable, exe);
        assert_eq!(found.method, DiscoveryMethod::ExplicitConfig);
    }

    #[test]
    fn test_stale_explicit_falls_through_to_well_known() {
        let dir = tempfile::tempdir().expect("tempdir");
        let exe = dir.path().join("tool");
        std::fs::write(&exe, "#!/bin/sh\n").expect("write");

        let found = discover(Path::new("/nonexistent/tool"), &[exe.clone()], "tool")
            .expect("found");
        assert_eq!(found.executable, exe);
        assert_eq!(found.method, DiscoveryMethod::WellKnownPath);
    }

    #[test]
    fn test_nothing_found() {
        let result = discover(
            Path::new(""),
            &[PathBuf::from("/nonexistent/a"), PathBuf::from("/nonexistent/b")],
            "definitely-not-a-real-binary-name",
        );
        assert!(matches!(result, Err(DiscoveryError::NotFound { .. })));
    }

    #[test]
    fn test_directory_is_not_an_executable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = discover(dir.path(), &[], "definitely-not-a-real-binary-name");
        assert!(result.is_err());
    }
}
