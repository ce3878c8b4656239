//! # cadbridge-convert
//!
//! CAD file ingestion core: classifies input files by extension, routes
//! them through external conversion backends (a headless 3-D content tool,
//! a DWG/DXF interchange tool) with probe-gated fallback and bounded
//! timeouts, and promotes tessellated artifacts to boundary-representation
//! solids through a host geometry kernel — degrading to shells when solid
//! classification fails.
//!
//! The pipeline guarantees a deterministic, auditable attempt sequence per
//! request and a well-defined terminal state; it never implements kernel
//! geometry itself.

pub mod backend;
pub mod backends;
pub mod batch;
pub mod config;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod filesystem;
pub mod formats;
pub mod geometry;
pub mod manual;
pub mod metrics;
pub mod models;
pub mod parasolid;
pub mod processor;
pub mod promotion;
pub mod scripting;

pub use backend::ConversionBackend;
pub use batch::{BatchDriver, BatchSummary};
pub use config::ConverterConfig;
pub use error::ConversionError;
pub use formats::{HandlerClass, ToolKind, classify};
pub use geometry::{GeometryKernel, MeshTopology};
pub use models::{ConversionOutcome, ConversionRequest, RequestReport};
pub use processor::{ConversionPipeline, IngestReport};
pub use promotion::{MeshPromoter, SolidPromotionResult};
