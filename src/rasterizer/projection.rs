//! Camera and perspective projection
//!
//! Model space is rotated by the model's yaw, pitch and roll, moved to its
//! scene position relative to the camera, rotated by the camera's yaw, pitch
//! and roll, then divided by depth. All angles are 11-bit steps.

use serde::{Deserialize, Serialize};

use super::math::{rotate_pair, TrigTables};
use crate::anim::PosedMesh;

/// Screen coordinate of a vertex behind the near plane
pub const CLIPPED: i32 = -5000;

/// Model-to-screen scale: a point at x == z lands this many pixels off centre
/// when `cot(fov / 2)` is 1.
const UNIT_SCALE: i64 = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Camera {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub pitch: i32,
    pub yaw: i32,
    pub roll: i32,
    /// Field of view in angle steps (512 is roughly 90 degrees)
    pub fov: i32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            z: 0,
            pitch: 0,
            yaw: 0,
            roll: 0,
            fov: 512,
        }
    }
}

/// Where a model sits in the scene
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelPlacement {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub pitch: i32,
    pub yaw: i32,
    pub roll: i32,
}

/// One projected vertex. Screen coordinates are relative to the screen centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projected {
    pub screen_x: i32,
    pub screen_y: i32,
    /// Camera-space depth
    pub z: i32,
    /// Camera-space x and y before the perspective divide
    pub ortho_x: i32,
    pub ortho_y: i32,
    pub clipped: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProjectionOutcome {
    #[default]
    Visible,
    /// The model origin is on or behind the near plane; nothing is drawn
    OriginClipped,
    /// The model origin is well outside the screen
    OffScreen,
}

/// Inputs of `project_vertices` that are not geometry
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub width: i32,
    pub height: i32,
    pub near_plane_z: i32,
    pub reject_offscreen: bool,
}

/// Per-vertex screen positions of the current mesh, reused across frames
#[derive(Debug, Clone, Default)]
pub struct ScreenVertices {
    pub x: Vec<i32>,
    pub y: Vec<i32>,
    /// Depth relative to the model origin
    pub z: Vec<i32>,
    pub ortho_x: Vec<i32>,
    pub ortho_y: Vec<i32>,
    pub ortho_z: Vec<i32>,
}

impl ScreenVertices {
    pub fn reset(&mut self, count: usize) {
        for v in [
            &mut self.x,
            &mut self.y,
            &mut self.z,
            &mut self.ortho_x,
            &mut self.ortho_y,
            &mut self.ortho_z,
        ] {
            v.clear();
            v.resize(count, 0);
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    fn clip_all(&mut self) {
        self.x.fill(CLIPPED);
        self.y.fill(CLIPPED);
    }
}

/// Rotate a point by (pitch, yaw, roll), applied yaw, then pitch, then roll
fn rotate(t: &TrigTables, [mut x, mut y, mut z]: [i64; 3], pitch: i32, yaw: i32, roll: i32) -> [i64; 3] {
    if yaw != 0 {
        (x, z) = rotate_pair(x, z, t.sin(yaw), t.cos(yaw));
    }
    if pitch != 0 {
        (z, y) = rotate_pair(z, y, t.sin(pitch), t.cos(pitch));
    }
    if roll != 0 {
        (x, y) = rotate_pair(x, y, t.sin(roll), t.cos(roll));
    }
    [x, y, z]
}

/// Project one model-space vertex. `z <= near_plane_z` is clipped.
pub fn project(vertex: [i32; 3], placement: &ModelPlacement, camera: &Camera, near_plane_z: i32) -> Projected {
    let t = TrigTables::get();

    let [x, y, z] = rotate(
        t,
        vertex.map(i64::from),
        placement.pitch,
        placement.yaw,
        placement.roll,
    );
    let scene = [
        x + (placement.x as i64 - camera.x as i64),
        y + (placement.y as i64 - camera.y as i64),
        z + (placement.z as i64 - camera.z as i64),
    ];
    let [x, y, z] = rotate(t, scene, camera.pitch, camera.yaw, camera.roll);

    if z <= near_plane_z as i64 {
        return Projected {
            screen_x: CLIPPED,
            screen_y: CLIPPED,
            z: z as i32,
            ortho_x: x as i32,
            ortho_y: y as i32,
            clipped: true,
        };
    }

    // The shift floors, so negative offsets round away from the centre
    let scale = t.tan(1536 - camera.fov / 2) * UNIT_SCALE / z;
    Projected {
        screen_x: ((x * scale) >> 16) as i32,
        screen_y: ((y * scale) >> 16) as i32,
        z: z as i32,
        ortho_x: x as i32,
        ortho_y: y as i32,
        clipped: false,
    }
}

/// Project every vertex of a posed mesh into `out`, offset to the screen
/// centre. Depths are stored relative to the model origin's depth.
pub fn project_vertices(
    out: &mut ScreenVertices,
    posed: &PosedMesh,
    placement: &ModelPlacement,
    camera: &Camera,
    viewport: &Viewport,
) -> ProjectionOutcome {
    out.reset(posed.vertex_count());

    let origin = project([0, 0, 0], placement, camera, viewport.near_plane_z);
    if origin.clipped {
        out.clip_all();
        return ProjectionOutcome::OriginClipped;
    }

    let (half_w, half_h) = (viewport.width / 2, viewport.height / 2);
    if viewport.reject_offscreen
        && (origin.screen_x.abs() > half_w + viewport.width / 4
            || origin.screen_y.abs() > half_h + viewport.height / 4)
    {
        out.clip_all();
        return ProjectionOutcome::OffScreen;
    }

    for i in 0..posed.vertex_count() {
        let vertex = [posed.vertices_x[i], posed.vertices_y[i], posed.vertices_z[i]];
        let p = project(vertex, placement, camera, viewport.near_plane_z);
        if p.clipped {
            out.x[i] = CLIPPED;
            out.y[i] = CLIPPED;
        } else {
            out.x[i] = p.screen_x + half_w;
            out.y[i] = p.screen_y + half_h;
        }
        out.z[i] = p.z - origin.z;
        out.ortho_x[i] = p.ortho_x;
        out.ortho_y[i] = p.ortho_y;
        out.ortho_z[i] = p.z;
    }

    ProjectionOutcome::Visible
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Mesh, MeshFormat};

    fn at(z: i32) -> ModelPlacement {
        ModelPlacement {
            z,
            ..ModelPlacement::default()
        }
    }

    fn viewport() -> Viewport {
        Viewport {
            width: 200,
            height: 100,
            near_plane_z: 50,
            reject_offscreen: true,
        }
    }

    fn posed(vertices: &[[i32; 3]]) -> PosedMesh {
        let mut mesh = Mesh::empty(MeshFormat::Type2);
        for v in vertices {
            mesh.vertices_x.push(v[0]);
            mesh.vertices_y.push(v[1]);
            mesh.vertices_z.push(v[2]);
        }
        PosedMesh::from_mesh(&mesh)
    }

    #[test]
    fn test_near_plane_is_inclusive() {
        let camera = Camera::default();
        assert!(project([0, 0, 0], &at(50), &camera, 50).clipped);
        assert!(!project([0, 0, 0], &at(51), &camera, 50).clipped);
        assert!(project([0, 0, -10], &at(55), &camera, 50).clipped);
    }

    #[test]
    fn test_perspective_scale() {
        let camera = Camera::default();
        let p = project([1000, -500, 0], &at(1000), &camera, 50);
        // cot(45 degrees) = 1: x == z lands 512 pixels off centre
        assert!((p.screen_x - 512).abs() <= 1);
        assert!((p.screen_y + 256).abs() <= 1);
        assert_eq!((p.ortho_x, p.ortho_y, p.z), (1000, -500, 1000));
    }

    #[test]
    fn test_negative_offsets_round_down() {
        let camera = Camera::default();
        let right = project([3, 3, 0], &at(1000), &camera, 50);
        let left = project([-3, -3, 0], &at(1000), &camera, 50);
        // 3 * 512 / 1000 = 1.5: floors to 1 on the right and -2 on the left
        assert_eq!((right.screen_x, right.screen_y), (1, 1));
        assert_eq!((left.screen_x, left.screen_y), (-2, -2));
    }

    #[test]
    fn test_model_yaw() {
        let camera = Camera::default();
        let placement = ModelPlacement {
            z: 1000,
            yaw: 512,
            ..ModelPlacement::default()
        };
        let p = project([100, 0, 0], &placement, &camera, 50);
        assert!(p.ortho_x.abs() <= 1);
        assert!((p.z - 900).abs() <= 1);
    }

    #[test]
    fn test_camera_position_is_subtracted() {
        let camera = Camera {
            x: 40,
            z: -100,
            ..Camera::default()
        };
        let p = project([0, 0, 0], &at(400), &camera, 50);
        assert_eq!((p.ortho_x, p.z), (-40, 500));
    }

    #[test]
    fn test_project_vertices_relative_depth() {
        let mesh = posed(&[[0, 0, 0], [0, 0, 30], [0, 0, -2000]]);
        let mut out = ScreenVertices::default();
        let outcome = project_vertices(&mut out, &mesh, &at(1000), &Camera::default(), &viewport());
        assert_eq!(outcome, ProjectionOutcome::Visible);
        assert_eq!((out.x[0], out.y[0]), (100, 50));
        assert_eq!(out.z[..2], [0, 30]);
        assert_eq!(out.ortho_z[1], 1030);
        // Behind the camera
        assert_eq!(out.x[2], CLIPPED);
    }

    #[test]
    fn test_origin_clipped_marks_every_vertex() {
        let mesh = posed(&[[0, 0, 500], [10, 0, 600]]);
        let mut out = ScreenVertices::default();
        let outcome = project_vertices(&mut out, &mesh, &at(20), &Camera::default(), &viewport());
        assert_eq!(outcome, ProjectionOutcome::OriginClipped);
        assert!(out.x.iter().all(|&x| x == CLIPPED));
    }

    #[test]
    fn test_offscreen_rejection() {
        let mesh = posed(&[[0, 0, 0]]);
        let mut out = ScreenVertices::default();
        let placement = ModelPlacement {
            x: 1000,
            z: 1000,
            ..ModelPlacement::default()
        };
        let camera = Camera::default();
        assert_eq!(
            project_vertices(&mut out, &mesh, &placement, &camera, &viewport()),
            ProjectionOutcome::OffScreen
        );

        let keep = Viewport {
            reject_offscreen: false,
            ..viewport()
        };
        assert_eq!(
            project_vertices(&mut out, &mesh, &placement, &camera, &keep),
            ProjectionOutcome::Visible
        );
    }
}
