//! Mesh render pipeline
//! Project, sort and draw one lit mesh into a framebuffer

use serde::{Deserialize, Serialize};

use super::depth_sort::{BoundingCylinder, DepthSorter, PriorityMode};
use super::gouraud::{raster_flat, raster_gouraud, raster_gouraud_blend, raster_gouraud_zbuf};
use super::projection::{project_vertices, Camera, ModelPlacement, ProjectionOutcome, ScreenVertices, Viewport, CLIPPED};
use super::types::{Framebuffer, Palette};
use crate::anim::PosedMesh;
use crate::lighting::{FaceColors, FLAT, HIDDEN};
use crate::model::Mesh;

/// Stand-in for colours outside the HSL16 range
const INVALID_COLOR: i32 = 0xF123;

/// Per-call render settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Vertices at or nearer than this depth are clipped
    pub near_plane_z: i32,
    pub priority_mode: PriorityMode,
    /// Depth-test opaque faces instead of relying on draw order alone
    pub use_zbuffer: bool,
    /// Skip the mesh when its origin projects well outside the screen
    pub reject_offscreen: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            near_plane_z: 50,
            priority_mode: PriorityMode::Strict,
            use_zbuffer: false,
            reject_offscreen: false,
        }
    }
}

/// What one `render_mesh` call did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub projection: ProjectionOutcome,
    pub faces_drawn: usize,
    /// Hidden by render info or lighting
    pub faces_hidden: usize,
    pub faces_culled: usize,
    pub faces_clipped: usize,
    /// Depth outside the sortable range
    pub faces_out_of_range: usize,
    /// Lost to full depth slots or priority levels
    pub dropped_faces: usize,
}

impl FrameStats {
    /// Accumulate another mesh's stats into a frame total
    pub fn merge(&mut self, other: &FrameStats) {
        self.faces_drawn += other.faces_drawn;
        self.faces_hidden += other.faces_hidden;
        self.faces_culled += other.faces_culled;
        self.faces_clipped += other.faces_clipped;
        self.faces_out_of_range += other.faces_out_of_range;
        self.dropped_faces += other.dropped_faces;
    }
}

/// Scratch buffers for rendering, reused across meshes and frames.
/// Each thread that renders needs its own.
#[derive(Default)]
pub struct RenderContext {
    screen: ScreenVertices,
    sorter: DepthSorter,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Screen positions from the last `render_mesh`
    pub fn screen(&self) -> &ScreenVertices {
        &self.screen
    }

    /// Face indices in the order they were drawn by the last `render_mesh`
    pub fn draw_order(&self) -> &[usize] {
        self.sorter.order()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn render_mesh(
        &mut self,
        fb: &mut Framebuffer,
        mesh: &Mesh,
        posed: &PosedMesh,
        colors: &FaceColors,
        placement: &ModelPlacement,
        camera: &Camera,
        options: &RenderOptions,
    ) -> FrameStats {
        let mut stats = FrameStats::default();

        let cylinder = BoundingCylinder::from_vertices(&posed.vertices_x, &posed.vertices_y, &posed.vertices_z);
        let viewport = Viewport {
            width: fb.width as i32,
            height: fb.height as i32,
            near_plane_z: options.near_plane_z,
            reject_offscreen: options.reject_offscreen,
        };
        stats.projection = project_vertices(&mut self.screen, posed, placement, camera, &viewport);
        if stats.projection != ProjectionOutcome::Visible {
            log::trace!("mesh not drawn: {:?}", stats.projection);
            return stats;
        }

        let sort = self.sorter.sort(mesh, &self.screen, &cylinder, options.priority_mode);
        stats.faces_culled = sort.culled;
        stats.faces_clipped = sort.clipped;
        stats.faces_out_of_range = sort.out_of_range;
        stats.dropped_faces = sort.dropped;

        let palette = Palette::get();
        for &face in self.sorter.order() {
            if draw_face(fb, palette, mesh, posed, colors, &self.screen, face, options.use_zbuffer) {
                stats.faces_drawn += 1;
            } else {
                stats.faces_hidden += 1;
            }
        }

        stats
    }
}

fn guard_color(color: i32) -> i32 {
    if color > 0xFFFF {
        INVALID_COLOR
    } else {
        color
    }
}

/// Draw one sorted face; false when the face is not drawable
#[allow(clippy::too_many_arguments)]
fn draw_face(
    fb: &mut Framebuffer,
    palette: &Palette,
    mesh: &Mesh,
    posed: &PosedMesh,
    colors: &FaceColors,
    screen: &ScreenVertices,
    face: usize,
    use_zbuffer: bool,
) -> bool {
    if mesh.face_info(face) & 3 == 2 || colors.c[face] == HIDDEN {
        return false;
    }
    let [a, b, c] = mesh.face(face);
    if screen.x[a] == CLIPPED || screen.x[b] == CLIPPED || screen.x[c] == CLIPPED {
        return false;
    }

    let x = [screen.x[a], screen.x[b], screen.x[c]];
    let y = [screen.y[a], screen.y[b], screen.y[c]];
    let z = [screen.ortho_z[a], screen.ortho_z[b], screen.ortho_z[c]];

    // Textured faces carry bare lightness, which reads as grey through the palette
    let textured = mesh.face_texture(face) != -1;
    let alpha = posed.face_alphas.as_ref().map_or(0, |alphas| alphas[face]);
    let opacity = if !textured && alpha != 0 {
        0xFF - alpha as u32
    } else {
        0xFF
    };

    let shade = if colors.c[face] == FLAT {
        [guard_color(colors.a[face]); 3]
    } else {
        [
            guard_color(colors.a[face]),
            guard_color(colors.b[face]),
            guard_color(colors.c[face]),
        ]
    };

    if opacity < 0xFF {
        if colors.c[face] == FLAT {
            raster_flat(fb, x, y, palette.rgb(shade[0]), opacity);
        } else {
            raster_gouraud_blend(fb, palette, x, y, shade, opacity);
        }
    } else if use_zbuffer {
        raster_gouraud_zbuf(fb, palette, x, y, z, shade);
    } else if colors.c[face] == FLAT {
        raster_flat(fb, x, y, palette.rgb(shade[0]), 0xFF);
    } else {
        raster_gouraud(fb, palette, x, y, shade);
    }
    true
}
