//! Frame playback onto a posed copy of a mesh

use thiserror::Error;

use super::frame::{Frame, TransformOp};
use super::framemap::{Framemap, TransformKind};
use crate::model::{BoneIndex, Mesh};
use crate::rasterizer::{rotate_pair, TrigTables};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnimError {
    #[error("op {op} targets group set {group_set}, framemap {framemap_id} has {len}")]
    GroupSetOutOfRange {
        op: usize,
        group_set: usize,
        framemap_id: u16,
        len: usize,
    },
}

/// Animated positions and alphas; the source `Mesh` stays untouched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PosedMesh {
    pub vertices_x: Vec<i32>,
    pub vertices_y: Vec<i32>,
    pub vertices_z: Vec<i32>,
    pub face_alphas: Option<Vec<u8>>,
}

impl PosedMesh {
    pub fn from_mesh(mesh: &Mesh) -> Self {
        Self {
            vertices_x: mesh.vertices_x.clone(),
            vertices_y: mesh.vertices_y.clone(),
            vertices_z: mesh.vertices_z.clone(),
            face_alphas: mesh.face_alphas.clone(),
        }
    }

    /// Return to the bind pose without reallocating
    pub fn reset(&mut self, mesh: &Mesh) {
        self.vertices_x.clone_from(&mesh.vertices_x);
        self.vertices_y.clone_from(&mesh.vertices_y);
        self.vertices_z.clone_from(&mesh.vertices_z);
        self.face_alphas.clone_from(&mesh.face_alphas);
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices_x.len()
    }
}

/// Apply every op of `frame` in order. Ops are validated against the
/// framemap before anything moves.
pub fn animate(
    posed: &mut PosedMesh,
    bones: &BoneIndex,
    frame: &Frame,
    framemap: &Framemap,
) -> Result<(), AnimError> {
    for (op, t) in frame.ops.iter().enumerate() {
        if t.group_set >= framemap.len() || t.group_set >= framemap.bone_groups.len() {
            return Err(AnimError::GroupSetOutOfRange {
                op,
                group_set: t.group_set,
                framemap_id: framemap.id,
                len: framemap.len(),
            });
        }
    }

    let mut origin = [0i32; 3];
    for op in &frame.ops {
        let kind = framemap.kinds[op.group_set];
        let groups = &framemap.bone_groups[op.group_set];
        apply(posed, bones, kind, groups, op, &mut origin);
    }
    Ok(())
}

/// Vertex indices of every bone in `groups`, skipping unknown bones
fn group_vertices<'a>(bones: &'a BoneIndex, groups: &'a [u8]) -> impl Iterator<Item = usize> + 'a {
    groups
        .iter()
        .flat_map(move |&bone| bones.vertices(bone as usize).iter().copied())
}

fn apply(
    posed: &mut PosedMesh,
    bones: &BoneIndex,
    kind: TransformKind,
    groups: &[u8],
    op: &TransformOp,
    origin: &mut [i32; 3],
) {
    match kind {
        TransformKind::Origin => {
            let mut sum = [0i64; 3];
            let mut count = 0i64;
            for v in group_vertices(bones, groups) {
                sum[0] += posed.vertices_x[v] as i64;
                sum[1] += posed.vertices_y[v] as i64;
                sum[2] += posed.vertices_z[v] as i64;
                count += 1;
            }
            *origin = [op.x, op.y, op.z];
            if count > 0 {
                for axis in 0..3 {
                    origin[axis] = origin[axis].wrapping_add((sum[axis] / count) as i32);
                }
            }
        }

        TransformKind::Translate => {
            for v in group_vertices(bones, groups) {
                posed.vertices_x[v] = posed.vertices_x[v].wrapping_add(op.x);
                posed.vertices_y[v] = posed.vertices_y[v].wrapping_add(op.y);
                posed.vertices_z[v] = posed.vertices_z[v].wrapping_add(op.z);
            }
        }

        TransformKind::Rotate => {
            let t = TrigTables::get();
            let pitch = (op.x & 255) * 8;
            let yaw = (op.y & 255) * 8;
            let roll = (op.z & 255) * 8;
            let [ox, oy, oz] = origin.map(i64::from);

            for v in group_vertices(bones, groups) {
                let mut x = posed.vertices_x[v] as i64 - ox;
                let mut y = posed.vertices_y[v] as i64 - oy;
                let mut z = posed.vertices_z[v] as i64 - oz;

                if roll != 0 {
                    (x, y) = rotate_pair(x, y, t.sin(roll), t.cos(roll));
                }
                if pitch != 0 {
                    (z, y) = rotate_pair(z, y, t.sin(pitch), t.cos(pitch));
                }
                if yaw != 0 {
                    (x, z) = rotate_pair(x, z, t.sin(yaw), t.cos(yaw));
                }

                posed.vertices_x[v] = (x + ox) as i32;
                posed.vertices_y[v] = (y + oy) as i32;
                posed.vertices_z[v] = (z + oz) as i32;
            }
        }

        TransformKind::Scale => {
            // Widened so large offsets times a large factor cannot overflow;
            // results that leave i32 wrap
            let scale = |v: i32, o: i32, factor: i32| ((v as i64 - o as i64) * factor as i64 / 128 + o as i64) as i32;
            let [ox, oy, oz] = *origin;
            for v in group_vertices(bones, groups) {
                posed.vertices_x[v] = scale(posed.vertices_x[v], ox, op.x);
                posed.vertices_y[v] = scale(posed.vertices_y[v], oy, op.y);
                posed.vertices_z[v] = scale(posed.vertices_z[v], oz, op.z);
            }
        }

        TransformKind::Alpha => {
            let Some(alphas) = posed.face_alphas.as_mut() else {
                return;
            };
            for &bone in groups {
                for &face in bones.faces(bone as usize) {
                    let alpha = alphas[face] as i32 + op.x * 8;
                    alphas[face] = alpha.clamp(0, 255) as u8;
                }
            }
        }

        TransformKind::Other(_) => {}
    }
}
