//! Bone animation
//!
//! A `Framemap` names groups of bones and what kind of transform applies to
//! each group. A `Frame` is a sparse list of transform ops against those
//! groups. `animate` replays a frame onto a `PosedMesh`, a mutable copy of
//! a mesh's positions and alphas.

mod animate;
mod frame;
mod framemap;

pub use animate::{animate, AnimError, PosedMesh};
pub use frame::{Frame, TransformOp};
pub use framemap::{Framemap, TransformKind};
