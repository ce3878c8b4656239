//! Extension → handler-class mapping for CAD and mesh files.
//!
//! The table is data, not behavior: adding or removing format support means
//! editing `define_format_table!` and nothing else. `classify` is total —
//! unmapped extensions resolve to [`HandlerClass::Unknown`].

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// What the host application can ingest directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeKind {
    /// Boundary-representation formats (STEP, IGES, BREP) imported as solids.
    Boundary,
    /// Tessellated formats (STL, OBJ) imported as meshes, then promoted.
    Mesh,
}

/// The external conversion tools known to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// General 3-D content tool (Blender, headless).
    ContentTool,
    /// CAD drawing-interchange tool (ODA File Converter).
    DrawingTool,
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContentTool => write!(f, "content-tool"),
            Self::DrawingTool => write!(f, "drawing-tool"),
        }
    }
}

/// Handler class assigned to a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerClass {
    /// The host ingests this directly; no conversion needed.
    Native(NativeKind),
    /// Conversion through an external tool is required.
    External(ToolKind),
    /// No local conversion path; manual upload to a remote service.
    RemoteManual,
    /// Not in the table.
    Unknown,
}

impl HandlerClass {
    /// Short route label for reports and logs.
    pub fn route_label(&self) -> &'static str {
        match self {
            Self::Native(NativeKind::Boundary) => "native",
            Self::Native(NativeKind::Mesh) => "native-mesh",
            Self::External(ToolKind::ContentTool) => "content-tool",
            Self::External(ToolKind::DrawingTool) => "drawing-tool",
            Self::RemoteManual => "manual",
            Self::Unknown => "unknown",
        }
    }
}

macro_rules! define_format_table {
    ($($ext:literal => $class:expr),* $(,)?) => {
        /// Every extension in the table, paired with its handler class.
        pub static FORMAT_TABLE: &[(&str, HandlerClass)] = &[$(($ext, $class),)*];

        static FORMAT_MAP: LazyLock<HashMap<&'static str, HandlerClass>> =
            LazyLock::new(|| HashMap::from([$(($ext, $class),)*]));
    };
}

define_format_table! {
    // Host-native boundary representation
    "step"       => HandlerClass::Native(NativeKind::Boundary),
    "stp"        => HandlerClass::Native(NativeKind::Boundary),
    "iges"       => HandlerClass::Native(NativeKind::Boundary),
    "igs"        => HandlerClass::Native(NativeKind::Boundary),
    "brep"       => HandlerClass::Native(NativeKind::Boundary),
    "brp"        => HandlerClass::Native(NativeKind::Boundary),

    // Host-native tessellated
    "stl"        => HandlerClass::Native(NativeKind::Mesh),
    "obj"        => HandlerClass::Native(NativeKind::Mesh),

    // General 3-D content tool
    "fbx"        => HandlerClass::External(ToolKind::ContentTool),
    "gltf"       => HandlerClass::External(ToolKind::ContentTool),
    "glb"        => HandlerClass::External(ToolKind::ContentTool),
    "dae"        => HandlerClass::External(ToolKind::ContentTool),
    "3ds"        => HandlerClass::External(ToolKind::ContentTool),
    "ply"        => HandlerClass::External(ToolKind::ContentTool),
    "usd"        => HandlerClass::External(ToolKind::ContentTool),
    "usda"       => HandlerClass::External(ToolKind::ContentTool),
    "usdc"       => HandlerClass::External(ToolKind::ContentTool),
    "abc"        => HandlerClass::External(ToolKind::ContentTool),
    "svg"        => HandlerClass::External(ToolKind::ContentTool),
    "x3d"        => HandlerClass::External(ToolKind::ContentTool),
    "wrl"        => HandlerClass::External(ToolKind::ContentTool),
    "blend"      => HandlerClass::External(ToolKind::ContentTool),

    // Drawing interchange
    "dwg"        => HandlerClass::External(ToolKind::DrawingTool),
    "dxf"        => HandlerClass::External(ToolKind::DrawingTool),

    // Proprietary kernels — no local conversion path
    "x_t"        => HandlerClass::RemoteManual,
    "x_b"        => HandlerClass::RemoteManual,
    "xmt_txt"    => HandlerClass::RemoteManual,
    "xmt_bin"    => HandlerClass::RemoteManual,
    "catpart"    => HandlerClass::RemoteManual,
    "catproduct" => HandlerClass::RemoteManual,
    "prt"        => HandlerClass::RemoteManual,
    "asm"        => HandlerClass::RemoteManual,
    "sldprt"     => HandlerClass::RemoteManual,
    "sldasm"     => HandlerClass::RemoteManual,
    "ipt"        => HandlerClass::RemoteManual,
    "iam"        => HandlerClass::RemoteManual,
    "jt"         => HandlerClass::RemoteManual,
    "sat"        => HandlerClass::RemoteManual,
    "sab"        => HandlerClass::RemoteManual,
}

/// Classify a file extension.
///
/// Accepts the extension with or without the leading dot, any case.
/// Total: never fails, unmapped extensions yield [`HandlerClass::Unknown`].
pub fn classify(extension: &str) -> HandlerClass {
    let key = extension.trim_start_matches('.').to_ascii_lowercase();
    FORMAT_MAP
        .get(key.as_str())
        .copied()
        .unwrap_or(HandlerClass::Unknown)
}

/// All extensions routed through the given handler class.
pub fn extensions_for(class: HandlerClass) -> Vec<&'static str> {
    FORMAT_TABLE
        .iter()
        .filter(|(_, c)| *c == class)
        .map(|(ext, _)| *ext)
        .collect()
}

/// All extensions a given external tool is the primary route for.
pub fn extensions_for_tool(kind: ToolKind) -> Vec<&'static str> {
    extensions_for(HandlerClass::External(kind))
}
