//! Driver-script generation for the headless 3-D content tool.
//!
//! The import and export operator tables are independent and deliberately
//! asymmetric: several formats can be imported but not exported. Paths are
//! never interpolated into the script body — the generated script reads
//! them from argv after the `--` separator, so quoting and injection are a
//! non-issue.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::ConversionError;
use crate::filesystem::ScratchSpace;

/// Export format used when the requested destination has no export operator.
pub const DEFAULT_EXPORT_EXTENSION: &str = "stl";

/// Import operators by source extension (without dot).
static IMPORT_OPS: &[(&str, &str)] = &[
    ("fbx", "bpy.ops.import_scene.fbx"),
    ("gltf", "bpy.ops.import_scene.gltf"),
    ("glb", "bpy.ops.import_scene.gltf"),
    ("dae", "bpy.ops.wm.collada_import"),
    ("3ds", "bpy.ops.import_scene.autodesk_3ds"),
    ("obj", "bpy.ops.wm.obj_import"),
    ("ply", "bpy.ops.wm.ply_import"),
    ("stl", "bpy.ops.wm.stl_import"),
    ("usd", "bpy.ops.wm.usd_import"),
    ("usda", "bpy.ops.wm.usd_import"),
    ("usdc", "bpy.ops.wm.usd_import"),
    ("abc", "bpy.ops.wm.alembic_import"),
    ("svg", "bpy.ops.import_curve.svg"),
    ("x3d", "bpy.ops.import_scene.x3d"),
    ("wrl", "bpy.ops.import_scene.x3d"),
    ("blend", "bpy.ops.wm.open_mainfile"),
    ("dxf", "bpy.ops.import_scene.dxf"),
];

/// Export operators by destination extension (without dot).
static EXPORT_OPS: &[(&str, &str)] = &[
    ("stl", "bpy.ops.wm.stl_export"),
    ("obj", "bpy.ops.wm.obj_export"),
    ("ply", "bpy.ops.wm.ply_export"),
    ("gltf", "bpy.ops.export_scene.gltf"),
    ("glb", "bpy.ops.export_scene.gltf"),
    ("fbx", "bpy.ops.export_scene.fbx"),
    ("dae", "bpy.ops.wm.collada_export"),
    ("usd", "bpy.ops.wm.usd_export"),
];

/// Look up the import operator for a source extension.
pub fn import_operator(extension: &str) -> Option<&'static str> {
    let key = extension.trim_start_matches('.').to_ascii_lowercase();
    IMPORT_OPS
        .iter()
        .find(|(ext, _)| *ext == key)
        .map(|(_, op)| *op)
}

/// Export used when the requested destination has no operator.
const DEFAULT_EXPORT: (&str, &str) = ("stl", "bpy.ops.wm.stl_export");

/// Resolve the export operator for a destination extension, falling back to
/// the default export format for unmapped destinations. Returns the actual
/// extension that will be produced alongside its operator.
pub fn resolve_export(extension: &str) -> (&'static str, &'static str) {
    let key = extension.trim_start_matches('.').to_ascii_lowercase();
    EXPORT_OPS
        .iter()
        .find(|(ext, _)| *ext == key)
        .map(|(ext, op)| (*ext, *op))
        .unwrap_or(DEFAULT_EXPORT)
}

/// Generates the per-conversion driver script.
pub struct DriverScript;

impl DriverScript {
    /// Write a driver script for one `source_extension` →
    /// `target_extension` conversion into the scratch space. The target
    /// extension must come from [`resolve_export`].
    pub async fn write(
        scratch: &ScratchSpace,
        input: &Path,
        source_extension: &str,
        target_extension: &str,
    ) -> Result<PathBuf, ConversionError> {
        let import_op = import_operator(source_extension).ok_or_else(|| {
            ConversionError::UnsupportedFormat {
                extension: source_extension.to_string(),
            }
        })?;
        let (_, export_op) = resolve_export(target_extension);

        let content = Self::render(import_op, export_op);
        let script_path = scratch.output_path(input, "driver.py");

        let mut file = tokio::fs::File::create(&script_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;

        Ok(script_path)
    }

    /// Render the script body. Input/output paths come from argv at run
    /// time; only static operator names from the tables are embedded.
    fn render(import_op: &str, export_op: &str) -> String {
        format!(
            r#"import sys

import bpy

argv = sys.argv[sys.argv.index("--") + 1:]
input_path = argv[0]
output_path = argv[1]

bpy.ops.wm.read_factory_settings(use_empty=True)

{import_op}(filepath=input_path)

bpy.ops.object.select_all(action='SELECT')
{export_op}(filepath=output_path)

print("conversion complete: " + output_path)
"#
        )
    }
}
