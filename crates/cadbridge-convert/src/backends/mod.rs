//! Concrete backend adapters.

pub mod content3d;
pub mod drawing;

pub use content3d::ContentToolBackend;
pub use drawing::DrawingToolBackend;
