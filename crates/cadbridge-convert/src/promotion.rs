//! Mesh-to-boundary-representation promotion.
//!
//! Tessellated surface → sewn shell → solid. Sewing is unconditional: even
//! an apparently closed mesh goes through the sewing pass before solid
//! classification, because unsewn shapes virtually never classify as
//! solids. Solid classification failing is an expected outcome and degrades
//! the result to a shell; only unreadable or empty topology fails the
//! request.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConversionError;
use crate::geometry::{GeometryKernel, MeshTopology, ShapeHandle, ShapeMetrics};

/// Default stitching tolerance in length units.
pub const DEFAULT_TOLERANCE: f64 = 0.1;

/// Outcome of a promotion attempt. Never silently discarded: a `Shell` is
/// the accepted degraded result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum SolidPromotionResult {
    /// A closed solid was built.
    Solid {
        /// Handle to the solid shape.
        #[serde(skip)]
        shape: ShapeHandle,
        /// Volume/area, when the kernel exposes them.
        metrics: Option<ShapeMetrics>,
    },
    /// Solid classification failed; the sewn shell is kept as-is.
    Shell {
        /// Handle to the sewn shell.
        #[serde(skip)]
        shape: ShapeHandle,
        /// Volume/area, when the kernel exposes them.
        metrics: Option<ShapeMetrics>,
    },
}

impl SolidPromotionResult {
    /// `true` for the non-degraded outcome.
    pub fn is_solid(&self) -> bool {
        matches!(self, Self::Solid { .. })
    }

    /// The resulting shape handle, solid or shell.
    pub fn shape(&self) -> ShapeHandle {
        match self {
            Self::Solid { shape, .. } | Self::Shell { shape, .. } => *shape,
        }
    }
}

/// The mesh promotion engine.
pub struct MeshPromoter;

impl MeshPromoter {
    /// Promote triangle topology to a solid, degrading to a shell when
    /// solid classification fails.
    ///
    /// Fails only on an out-of-range tolerance or unusable topology; never
    /// propagates the kernel's solid-classification error.
    pub fn promote(
        kernel: &mut dyn GeometryKernel,
        topology: &MeshTopology,
        tolerance: f64,
    ) -> Result<SolidPromotionResult, ConversionError> {
        if !(tolerance > 0.0 && tolerance <= 10.0) {
            return Err(ConversionError::InvalidTolerance { value: tolerance });
        }
        if topology.is_empty() {
            return Err(ConversionError::InvalidInput {
                reason: "mesh topology has no triangles".to_string(),
            });
        }

        let surface = kernel
            .build_surface_from_topology(topology, tolerance)
            .map_err(|e| ConversionError::InvalidInput {
                reason: format!("unreadable topology: {e}"),
            })?;

        // Always sew before attempting solid classification
        let sewn = match kernel.sew(surface) {
            Ok(sewn) => sewn,
            Err(e) => {
                debug!(error = %e, "Sewing failed, keeping unsewn shell");
                return Ok(Self::shell_result(kernel, surface));
            }
        };

        match kernel.classify_as_solid(sewn) {
            Ok(solid) => {
                let metrics = kernel.shape_metrics(solid);
                Self::report(true, metrics);
                Ok(SolidPromotionResult::Solid {
                    shape: solid,
                    metrics,
                })
            }
            Err(e) => {
                // Expected degradation path, not a bug condition
                debug!(error = %e, "Solid classification failed, degrading to shell");
                Ok(Self::shell_result(kernel, sewn))
            }
        }
    }

    fn shell_result(kernel: &dyn GeometryKernel, shape: ShapeHandle) -> SolidPromotionResult {
        let metrics = kernel.shape_metrics(shape);
        Self::report(false, metrics);
        SolidPromotionResult::Shell { shape, metrics }
    }

    fn report(solid: bool, metrics: Option<ShapeMetrics>) {
        match metrics {
            Some(m) => info!(
                solid,
                volume = ?m.volume,
                area = ?m.area,
                "Mesh promotion finished"
            ),
            None => info!(solid, "Mesh promotion finished (no metrics exposed)"),
        }
    }
}
