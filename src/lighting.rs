//! Normals and per-face lighting
//!
//! Lighting runs on integer normals scaled to length 256 and produces three
//! HSL16 colours per face. Two sentinels ride in the third colour: -1 marks
//! a flat face (draw with colour A), -2 a face that is never drawn.

use serde::{Deserialize, Serialize};

use crate::anim::PosedMesh;
use crate::model::Mesh;
use crate::rasterizer::isqrt;

/// Third colour of a flat-shaded face
pub const FLAT: i32 = -1;
/// Third colour of a face that is skipped at draw time
pub const HIDDEN: i32 = -2;

const BASE_AMBIENT: i32 = 64;
const BASE_ATTENUATION: i32 = 768;
const LIGHTNESS_BOUND: i64 = 1 << 16;

/// Model lighting parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lighting {
    /// Added to the base ambient of 64
    pub ambient: i32,
    /// Low byte scales attenuation, 5 per step over a base of 768
    pub contrast: i32,
    /// Light vector; its length also scales attenuation
    pub light: [i32; 3],
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient: 0,
            contrast: 0,
            light: [-50, -10, -50],
        }
    }
}

impl Lighting {
    pub fn effective_ambient(&self) -> i32 {
        BASE_AMBIENT.saturating_add(self.ambient)
    }

    pub fn effective_attenuation(&self) -> i32 {
        let [x, y, z] = self.light.map(i64::from);
        let magnitude = isqrt((x * x).saturating_add(y * y).saturating_add(z * z)) as i64;
        let attenuation = (BASE_ATTENUATION + (self.contrast & 0xff) * 5) as i64;
        ((attenuation * magnitude) >> 8).min(i32::MAX as i64) as i32
    }
}

/// Summed unit normal; `face_count` faces contributed to it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Normal {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub face_count: i32,
}

#[derive(Debug, Clone, Default)]
pub struct Normals {
    pub vertices: Vec<Normal>,
    pub faces: Vec<Normal>,
}

/// Lit colours per face corner
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaceColors {
    pub a: Vec<i32>,
    pub b: Vec<i32>,
    pub c: Vec<i32>,
}

impl FaceColors {
    pub fn len(&self) -> usize {
        self.a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.a.is_empty()
    }
}

/// Packed HSL16 times a lightness: scales the 7-bit lightness and clamps it to 2..=126
pub fn mul_hsl(hsl: i32, lightness: i32) -> i32 {
    let lightness = (lightness * (hsl & 0x7f) >> 7).clamp(2, 126);
    (hsl & 0xff80) + lightness
}

/// Face normals for every face and vertex normals summed over every face
/// touching each vertex.
pub fn compute_normals(mesh: &Mesh, posed: &PosedMesh) -> Normals {
    let mut normals = Normals {
        vertices: vec![Normal::default(); posed.vertex_count()],
        faces: Vec::with_capacity(mesh.face_count()),
    };

    for face in 0..mesh.face_count() {
        let [a, b, c] = mesh.face(face);
        let vertex = |i: usize| {
            [
                posed.vertices_x[i] as i64,
                posed.vertices_y[i] as i64,
                posed.vertices_z[i] as i64,
            ]
        };
        let (va, vb, vc) = (vertex(a), vertex(b), vertex(c));
        let ab = [vb[0] - va[0], vb[1] - va[1], vb[2] - va[2]];
        let ac = [vc[0] - va[0], vc[1] - va[1], vc[2] - va[2]];

        let mut n = [
            ab[1] * ac[2] - ac[1] * ab[2],
            ab[2] * ac[0] - ac[2] * ab[0],
            ab[0] * ac[1] - ac[0] * ab[1],
        ];
        while n.iter().any(|v| v.abs() > 8192) {
            n = n.map(|v| v >> 1);
        }

        let magnitude = isqrt(n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).max(1) as i64;
        let n = n.map(|v| ((v << 8) / magnitude) as i32);
        let normal = Normal {
            x: n[0],
            y: n[1],
            z: n[2],
            face_count: 1,
        };
        normals.faces.push(normal);

        for corner in [a, b, c] {
            let v = &mut normals.vertices[corner];
            v.x += normal.x;
            v.y += normal.y;
            v.z += normal.z;
            v.face_count += 1;
        }
    }

    normals
}

/// Light every face of a posed mesh
pub fn light_mesh(mesh: &Mesh, posed: &PosedMesh, lighting: &Lighting) -> FaceColors {
    let normals = compute_normals(mesh, posed);
    let ambient = lighting.effective_ambient() as i64;
    let attenuation = lighting.effective_attenuation().max(1) as i64;
    let [lx, ly, lz] = lighting.light.map(i64::from);

    // Lightness is clamped to 2..=126 by `mul_hsl`; anything this far out
    // shades the same.
    let bound = |l: i64| l.clamp(-LIGHTNESS_BOUND, LIGHTNESS_BOUND) as i32;
    let dot = |n: &Normal| lx * n.x as i64 + ly * n.y as i64 + lz * n.z as i64;
    let vertex_light = |i: usize| {
        let n = &normals.vertices[i];
        bound(dot(n) / (attenuation * n.face_count.max(1) as i64) + ambient)
    };
    let face_light = |i: usize| bound(dot(&normals.faces[i]) / (attenuation + (attenuation >> 1)) + ambient);

    let fc = mesh.face_count();
    let mut colors = FaceColors {
        a: vec![0; fc],
        b: vec![0; fc],
        c: vec![0; fc],
    };

    for face in 0..fc {
        let alpha = posed.face_alphas.as_ref().map_or(0, |a| a[face] as i8);
        let face_type = match alpha {
            -2 => 3,
            -1 => 2,
            _ => mesh.face_info(face) & 3,
        };
        let hsl = mesh.face_colors[face] as i32;
        let textured = mesh.face_texture(face) != -1;
        let [a, b, c] = mesh.face(face);

        let shade = |l: i32| {
            if textured {
                l.clamp(2, 126)
            } else {
                mul_hsl(hsl, l)
            }
        };

        match face_type {
            0 => {
                colors.a[face] = shade(vertex_light(a));
                colors.b[face] = shade(vertex_light(b));
                colors.c[face] = shade(vertex_light(c));
            }
            1 => {
                let lit = shade(face_light(face));
                colors.a[face] = lit;
                colors.b[face] = lit;
                colors.c[face] = FLAT;
            }
            3 if !textured => {
                colors.a[face] = 128;
                colors.c[face] = HIDDEN;
            }
            _ => colors.c[face] = HIDDEN,
        }
    }

    colors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MeshFormat;

    /// Counter-clockwise triangle in the x/y plane, normal along +z
    fn triangle(info: u8) -> Mesh {
        let mut mesh = Mesh::empty(MeshFormat::Type1);
        mesh.vertices_x = vec![0, 10, 0];
        mesh.vertices_y = vec![0, 0, 10];
        mesh.vertices_z = vec![0, 0, 0];
        mesh.face_a = vec![0];
        mesh.face_b = vec![1];
        mesh.face_c = vec![2];
        // hue 5, saturation 3, lightness 100
        mesh.face_colors = vec![(5 << 10) | (3 << 7) | 100];
        mesh.face_infos = Some(vec![info]);
        mesh
    }

    #[test]
    fn test_mul_hsl() {
        let hsl = (5 << 10) | (3 << 7) | 100;
        assert_eq!(mul_hsl(hsl, 64), 5504 + 50);
        assert_eq!(mul_hsl(hsl, 0), 5504 + 2);
        assert_eq!(mul_hsl(hsl, 1000), 5504 + 126);
    }

    #[test]
    fn test_default_attenuation() {
        let lighting = Lighting::default();
        assert_eq!(lighting.effective_ambient(), 64);
        // |(-50, -10, -50)| = 71, 768 * 71 >> 8 = 213
        assert_eq!(lighting.effective_attenuation(), 213);
    }

    #[test]
    fn test_face_normal_is_normalized() {
        let mesh = triangle(0);
        let normals = compute_normals(&mesh, &PosedMesh::from_mesh(&mesh));
        assert_eq!(
            normals.faces[0],
            Normal {
                x: 0,
                y: 0,
                z: 256,
                face_count: 1
            }
        );
        assert_eq!(normals.vertices[2].face_count, 1);
        assert_eq!(normals.vertices[2].z, 256);
    }

    #[test]
    fn test_large_normal_is_reduced() {
        let mut mesh = triangle(0);
        mesh.vertices_x = vec![0, 100_000, 0];
        mesh.vertices_y = vec![0, 0, 100_000];
        let normals = compute_normals(&mesh, &PosedMesh::from_mesh(&mesh));
        assert_eq!(normals.faces[0].z, 256);
    }

    #[test]
    fn test_vertex_normals_include_flat_faces() {
        let mut mesh = triangle(0);
        // Second face (0, 2, 3) is flat and shares vertices 0 and 2
        mesh.vertices_x.push(-10);
        mesh.vertices_y.push(0);
        mesh.vertices_z.push(0);
        mesh.face_a.push(0);
        mesh.face_b.push(2);
        mesh.face_c.push(3);
        mesh.face_colors.push(mesh.face_colors[0]);
        mesh.face_infos = Some(vec![0, 1]);

        let normals = compute_normals(&mesh, &PosedMesh::from_mesh(&mesh));
        assert_eq!(normals.faces[1].z, 256);
        assert_eq!(
            normals.vertices[0],
            Normal {
                x: 0,
                y: 0,
                z: 512,
                face_count: 2
            }
        );
        assert_eq!(normals.vertices[1].face_count, 1);
        assert_eq!(normals.vertices[3].face_count, 1);
    }

    #[test]
    fn test_extreme_light_does_not_overflow() {
        let mesh = triangle(0);
        let lighting = Lighting {
            ambient: i32::MAX,
            contrast: 255,
            light: [i32::MAX, i32::MIN, i32::MAX],
        };
        assert!(lighting.effective_attenuation() > 0);
        let colors = light_mesh(&mesh, &PosedMesh::from_mesh(&mesh), &lighting);
        assert_eq!(colors.a, vec![5504 + 126]);
    }

    #[test]
    fn test_gouraud_face() {
        let mesh = triangle(0);
        let colors = light_mesh(&mesh, &PosedMesh::from_mesh(&mesh), &Lighting::default());
        // -12800 / 213 + 64 = 4, 4 * 100 >> 7 = 3
        assert_eq!(colors.a, vec![5504 + 3]);
        assert_eq!(colors.b, vec![5504 + 3]);
        assert_eq!(colors.c, vec![5504 + 3]);
    }

    #[test]
    fn test_flat_face() {
        let mesh = triangle(1);
        let colors = light_mesh(&mesh, &PosedMesh::from_mesh(&mesh), &Lighting::default());
        // -12800 / (213 + 106) + 64 = 24, 24 * 100 >> 7 = 18
        assert_eq!(colors.a, vec![5504 + 18]);
        assert_eq!(colors.c, vec![FLAT]);
    }

    #[test]
    fn test_hidden_and_black_faces() {
        let mesh = triangle(2);
        let colors = light_mesh(&mesh, &PosedMesh::from_mesh(&mesh), &Lighting::default());
        assert_eq!(colors.c, vec![HIDDEN]);

        let mesh = triangle(3);
        let colors = light_mesh(&mesh, &PosedMesh::from_mesh(&mesh), &Lighting::default());
        assert_eq!((colors.a[0], colors.c[0]), (128, HIDDEN));
    }

    #[test]
    fn test_alpha_sentinels_force_type() {
        let mut mesh = triangle(0);
        mesh.face_alphas = Some(vec![254]);
        let colors = light_mesh(&mesh, &PosedMesh::from_mesh(&mesh), &Lighting::default());
        assert_eq!((colors.a[0], colors.c[0]), (128, HIDDEN));

        mesh.face_alphas = Some(vec![255]);
        let colors = light_mesh(&mesh, &PosedMesh::from_mesh(&mesh), &Lighting::default());
        assert_eq!(colors.c[0], HIDDEN);
    }

    #[test]
    fn test_textured_face_keeps_lightness() {
        let mut mesh = triangle(0);
        mesh.face_textures = Some(vec![3]);
        let colors = light_mesh(&mesh, &PosedMesh::from_mesh(&mesh), &Lighting::default());
        assert_eq!(colors.a, vec![4]);

        let lighting = Lighting {
            light: [0, 0, 50],
            ..Lighting::default()
        };
        let colors = light_mesh(&mesh, &PosedMesh::from_mesh(&mesh), &lighting);
        // 12800 / (768 * 50 >> 8) + 64 = 149, clamped
        assert_eq!(colors.a, vec![126]);
    }
}
