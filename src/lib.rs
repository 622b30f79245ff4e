//! mesh-raster: fixed-point mesh decoder, bone animator and software rasterizer
//!
//! The pipeline runs bytes to pixels:
//! - `model`: decode a compact mesh buffer into a validated `Mesh`
//! - `anim`: decode framemaps and frames, pose a copy of the mesh
//! - `lighting`: normals and per-face HSL16 colours
//! - `rasterizer`: project, depth/priority sort and Gouraud-fill into a `Framebuffer`
//! - `config`: RON render settings

pub mod anim;
pub mod config;
pub mod lighting;
pub mod model;
pub mod rasterizer;

/// Version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
