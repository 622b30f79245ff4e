//! Fixed-point software rasterizer
//!
//! Pipeline per mesh:
//! - Project vertices with 2048-step trig tables
//! - Bucket faces by depth, then by render priority
//! - Fill Gouraud triangles through an HSL16 palette, optionally z-buffered

mod depth_sort;
mod gouraud;
mod math;
mod projection;
mod render;
mod types;

pub use depth_sort::*;
pub use gouraud::*;
pub use math::*;
pub use projection::*;
pub use render::*;
pub use types::*;

/// Default screen dimensions
pub const WIDTH: usize = 512;
pub const HEIGHT: usize = 384;
