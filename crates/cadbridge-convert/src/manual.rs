//! Manual-conversion instructions for formats with no local backend.
//!
//! Purely informational output: a structured block naming the format and
//! 1–3 external services with URLs. Nothing here is ever executed
//! automatically.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::parasolid;

/// An external conversion service the user can upload to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterService {
    /// Service name.
    pub name: String,
    /// Landing URL.
    pub url: String,
    /// Short usage hint.
    pub note: String,
}

/// Static service table entry.
struct ServiceSpec {
    name: &'static str,
    url: &'static str,
    note: &'static str,
    /// Extensions (without dot) the service accepts.
    formats: &'static [&'static str],
}

impl ServiceSpec {
    fn to_service(&self) -> ConverterService {
        ConverterService {
            name: self.name.to_string(),
            url: self.url.to_string(),
            note: self.note.to_string(),
        }
    }
}

/// Known services, in recommendation order.
static SERVICES: &[ServiceSpec] = &[
    ServiceSpec {
        name: "CAD Exchanger Online",
        url: "https://cadexchanger.com/online/",
        note: "upload the file, download as STEP",
        formats: &[
            "x_t", "x_b", "xmt_txt", "xmt_bin", "catpart", "catproduct", "prt", "sldprt", "ipt",
            "jt", "sat",
        ],
    },
    ServiceSpec {
        name: "Onshape",
        url: "https://cad.onshape.com/",
        note: "import with a free account, export as STEP",
        formats: &[
            "x_t", "sat", "step", "iges", "sldprt", "sldasm", "catpart", "prt", "asm", "ipt", "iam",
        ],
    },
    ServiceSpec {
        name: "CloudConvert",
        url: "https://cloudconvert.com/",
        note: "free tier available",
        formats: &["x_t", "x_b", "sat", "sab", "dwg", "dxf", "fbx", "gltf", "3ds"],
    },
];

/// Maximum services listed per instruction block.
const MAX_SERVICES: usize = 3;

/// Structured manual-conversion instructions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualInstructions {
    /// Input file name.
    pub file_name: String,
    /// The format that has no local route (with leading dot).
    pub extension: String,
    /// Source application, when a format header reveals it.
    pub source_application: Option<String>,
    /// Recommended services, best first. At least one, at most three.
    pub services: Vec<ConverterService>,
}

impl ManualInstructions {
    /// Build instructions for a file, probing format headers where useful.
    pub fn for_file(path: &Path, extension: &str) -> Self {
        let ext_key = extension.trim_start_matches('.').to_ascii_lowercase();

        let mut services: Vec<ConverterService> = SERVICES
            .iter()
            .filter(|s| s.formats.contains(&ext_key.as_str()))
            .take(MAX_SERVICES)
            .map(ServiceSpec::to_service)
            .collect();
        // Always recommend something, even off-table
        if services.is_empty() {
            services.push(SERVICES[0].to_service());
        }

        // Parasolid text files name the application that wrote them
        let source_application = if ext_key == "x_t" || ext_key == "xmt_txt" {
            parasolid::read_header(path).and_then(|h| h.application)
        } else {
            None
        };

        Self {
            file_name: path
                .file_name()
                .and_then(|f| f.to_str())
                .unwrap_or("unknown_file")
                .to_string(),
            extension: extension.to_string(),
            source_application,
            services,
        }
    }
}

impl std::fmt::Display for ManualInstructions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Manual conversion required")?;
        writeln!(f, "  File:   {}", self.file_name)?;
        writeln!(f, "  Format: {}", self.extension)?;
        if let Some(app) = &self.source_application {
            writeln!(f, "  Source application: {app}")?;
            writeln!(
                f,
                "  Recommended: re-export from {app} as STEP, then import the result."
            )?;
        }
        writeln!(f, "  Converter services:")?;
        for (i, service) in self.services.iter().enumerate() {
            writeln!(
                f,
                "    {}. {} — {} ({})",
                i + 1,
                service.name,
                service.url,
                service.note
            )?;
        }
        write!(f, "  After converting, import the resulting file directly.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_sldprt_names_service_and_url() {
        let instructions =
            ManualInstructions::for_file(&PathBuf::from("/data/assembly.sldprt"), ".sldprt");
        assert!(!instructions.services.is_empty());
        assert!(instructions.services.len() <= 3);
        assert!(instructions.services[0].url.starts_with("https://"));

        let rendered = instructions.to_string();
        assert!(rendered.contains(".sldprt"));
        assert!(rendered.contains("https://"));
    }

    #[test]
    fn test_off_table_extension_still_recommends() {
        let instructions = ManualInstructions::for_file(&PathBuf::from("/data/a.zzz"), ".zzz");
        assert_eq!(instructions.services.len(), 1);
    }

    #[test]
    fn test_parasolid_header_tailors_recommendation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("part.x_t");
        std::fs::write(
            &path,
            "**PART1;\nAPPL=SolidWorks 2024;\nDATE=2025-01-10;\n**END_OF_HEADER\n",
        )
        .expect("write");

        let instructions = ManualInstructions::for_file(&path, ".x_t");
        assert_eq!(
            instructions.source_application.as_deref(),
            Some("SolidWorks 2024")
        );
        assert!(instructions.to_string().contains("re-export from SolidWorks 2024"));
    }

    #[test]
    fn test_unreadable_parasolid_falls_back_to_generic() {
        let instructions = ManualInstructions::for_file(&PathBuf::from("/missing/p.x_t"), ".x_t");
        assert!(instructions.source_application.is_none());
        assert!(!instructions.services.is_empty());
    }
}
