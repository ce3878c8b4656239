//! The consumed interface to the host application's geometry kernel.
//!
//! The pipeline never implements kernel operations itself — meshing, sewing
//! and solid classification happen behind [`GeometryKernel`]. Handles are
//! opaque tokens minted by the kernel implementation; the core only passes
//! them back.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error signalled by the geometry collaborator.
///
/// `classify_as_solid` signalling an error is an expected outcome (the shape
/// is not a closed volume) and is caught by the promotion engine; every
/// other kernel error is fatal for the request.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct KernelError {
    /// Kernel-provided description.
    pub message: String,
}

impl KernelError {
    /// Create a kernel error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Handle to a document/container in the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerHandle(pub u64);

/// Handle to an imported mesh object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u64);

/// Handle to a surface, shell, or solid shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ShapeHandle(pub u64);

/// Shared-vertex triangle topology, as exposed by the kernel.
///
/// Opaque to the pipeline beyond counting: it is produced by
/// [`GeometryKernel::mesh_topology`] and handed back to
/// [`GeometryKernel::build_surface_from_topology`] unchanged.
#[derive(Debug, Clone, Default)]
pub struct MeshTopology {
    /// Vertex coordinates.
    pub vertices: Vec<[f64; 3]>,
    /// Triangles as vertex-index triples.
    pub triangles: Vec<[usize; 3]>,
}

impl MeshTopology {
    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// `true` when the topology carries no triangles.
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

/// Volume and surface area, when the kernel exposes them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeMetrics {
    /// Enclosed volume in cubic length units.
    pub volume: Option<f64>,
    /// Surface area in square length units.
    pub area: Option<f64>,
}

/// Narrow contract to the host geometry kernel.
pub trait GeometryKernel {
    /// Return the active container, creating one with `name` if none exists.
    fn create_or_get_active_container(&mut self, name: &str)
    -> Result<ContainerHandle, KernelError>;

    /// Import a boundary-representation file into the container.
    fn import_boundary_representation(
        &mut self,
        path: &Path,
        container: ContainerHandle,
    ) -> Result<ShapeHandle, KernelError>;

    /// Import a tessellated file into the container as a mesh object.
    fn import_mesh(
        &mut self,
        path: &Path,
        container: ContainerHandle,
    ) -> Result<MeshHandle, KernelError>;

    /// Read the shared-vertex topology of an imported mesh.
    fn mesh_topology(&self, mesh: MeshHandle) -> Result<MeshTopology, KernelError>;

    /// Build a boundary surface from triangle topology with a stitching
    /// tolerance.
    fn build_surface_from_topology(
        &mut self,
        topology: &MeshTopology,
        tolerance: f64,
    ) -> Result<ShapeHandle, KernelError>;

    /// Merge near-coincident edges/vertices to close small gaps.
    fn sew(&mut self, surface: ShapeHandle) -> Result<ShapeHandle, KernelError>;

    /// Classify a sewn surface as a closed solid. Errors when the shape
    /// does not enclose a volume.
    fn classify_as_solid(&mut self, surface: ShapeHandle) -> Result<ShapeHandle, KernelError>;

    /// Volume/area of a shape, when the kernel can compute them.
    fn shape_metrics(&self, shape: ShapeHandle) -> Option<ShapeMetrics>;

    /// Recompute the container after modifications.
    fn recompute(&mut self, container: ContainerHandle) -> Result<(), KernelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology_counts() {
        let topo = MeshTopology::default();
        assert!(topo.is_empty());

        let topo = MeshTopology {
            vertices: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            triangles: vec![[0, 1, 2]],
        };
        assert_eq!(topo.triangle_count(), 1);
        assert!(!topo.is_empty());
    }
}
