//! Test fixture writer, the inverse of `decode_mesh`
//!
//! Faces are always written with compression mode 1. For the legacy and
//! Type2 formats a textured face stores its texture id in the colour slot,
//! so fixtures should give such faces colour 127 to round-trip exactly.

use super::{Mesh, MeshFormat};

pub(crate) fn write_smart(out: &mut Vec<u8>, value: i32) {
    if (-64..64).contains(&value) {
        out.push((value + 64) as u8);
    } else {
        assert!((-0x4000..0x4000).contains(&value), "smart short out of range: {}", value);
        out.extend(((value + 0xC000) as u16).to_be_bytes());
    }
}

fn write_u16(out: &mut Vec<u8>, value: u16) {
    out.extend(value.to_be_bytes());
}

fn flag(present: bool) -> u8 {
    present as u8
}

pub(crate) fn encode_mesh(mesh: &Mesh, format: MeshFormat) -> Vec<u8> {
    encode_mesh_with_animaya(mesh, format, None)
}

/// Encode with optional per-vertex (group, scale) weight lists, only
/// written by the formats that carry a sized vertex-group section.
pub(crate) fn encode_mesh_with_animaya(
    mesh: &Mesh,
    format: MeshFormat,
    animaya: Option<&[Vec<(u8, u8)>]>,
) -> Vec<u8> {
    let vc = mesh.vertex_count();
    let fc = mesh.face_count();
    let legacy_like = matches!(format, MeshFormat::Legacy | MeshFormat::Type2);
    let sized_groups = matches!(format, MeshFormat::Type2 | MeshFormat::Type3);

    // Vertices
    let mut vertex_flags = Vec::with_capacity(vc);
    let (mut vx, mut vy, mut vz) = (Vec::new(), Vec::new(), Vec::new());
    let (mut px, mut py, mut pz) = (0, 0, 0);
    for i in 0..vc {
        let mut bits = 0u8;
        let (x, y, z) = (mesh.vertices_x[i], mesh.vertices_y[i], mesh.vertices_z[i]);
        if x != px {
            bits |= 1;
            write_smart(&mut vx, x - px);
        }
        if y != py {
            bits |= 2;
            write_smart(&mut vy, y - py);
        }
        if z != pz {
            bits |= 4;
            write_smart(&mut vz, z - pz);
        }
        (px, py, pz) = (x, y, z);
        vertex_flags.push(bits);
    }

    // Faces
    let modes = vec![1u8; fc];
    let mut indices = Vec::new();
    let mut last = 0i32;
    for f in 0..fc {
        let (a, b, c) = (mesh.face_a[f] as i32, mesh.face_b[f] as i32, mesh.face_c[f] as i32);
        write_smart(&mut indices, a - last);
        write_smart(&mut indices, b - a);
        write_smart(&mut indices, c - b);
        last = c;
    }

    let mut colors = Vec::with_capacity(fc * 2);
    for f in 0..fc {
        let texture = mesh.face_texture(f);
        let color = if legacy_like && texture >= 0 {
            texture as u16
        } else {
            mesh.face_colors[f]
        };
        write_u16(&mut colors, color);
    }

    let priority = if mesh.face_priorities.is_some() {
        255
    } else {
        mesh.model_priority
    };

    let face_infos: Option<Vec<u8>> = if legacy_like {
        (mesh.face_infos.is_some() || mesh.face_textures.is_some()).then(|| {
            (0..fc)
                .map(|f| {
                    let mut render_type = mesh.face_info(f) & 1;
                    if mesh.face_texture(f) >= 0 {
                        let coord = mesh
                            .face_texture_coords
                            .as_ref()
                            .map_or(0, |c| c[f].max(0));
                        render_type |= 2 | (coord as u8) << 2;
                    }
                    render_type
                })
                .collect()
        })
    } else {
        mesh.face_infos.clone()
    };

    let mut vertex_groups = mesh.vertex_bones.clone().unwrap_or_default();
    let has_animaya = sized_groups && animaya.is_some();
    if let (true, Some(weights)) = (sized_groups, animaya) {
        for w in weights {
            vertex_groups.push(w.len() as u8);
            for &(group, scale) in w {
                vertex_groups.push(group);
                vertex_groups.push(scale);
            }
        }
    }

    let mut face_textures = Vec::new();
    let mut texture_coords = Vec::new();
    if !legacy_like {
        if let Some(textures) = &mesh.face_textures {
            for (f, &t) in textures.iter().enumerate() {
                write_u16(&mut face_textures, (t as i32 + 1) as u16);
                if t != -1 && !mesh.texture_mapping.is_empty() {
                    let coord = mesh.face_texture_coords.as_ref().map_or(-1, |c| c[f]);
                    texture_coords.push((coord + 1) as u8);
                }
            }
        }
    }

    // Texture triangles
    let kinds: Vec<u8> = mesh.texture_mapping.iter().map(|t| t.kind).collect();
    let mut simple = Vec::new();
    let mut complex = Vec::new();
    for t in &mesh.texture_mapping {
        let target = match t.kind {
            _ if legacy_like => &mut simple,
            0 => &mut simple,
            1..=3 => &mut complex,
            _ => continue,
        };
        write_u16(target, t.p);
        write_u16(target, t.m);
        write_u16(target, t.n);
    }
    let complex_count = kinds.iter().filter(|k| (1..=3).contains(*k)).count();
    let cube_count = kinds.iter().filter(|&&k| k == 2).count();
    let texture_params = vec![0u8; complex_count * (6 + 2 + 1 + 2) + cube_count * 2];

    // Body
    let mut out = Vec::new();
    let push_opt = |out: &mut Vec<u8>, section: &Option<Vec<u8>>| {
        if let Some(bytes) = section {
            out.extend(bytes);
        }
    };

    if !legacy_like {
        out.extend(&kinds);
    }
    out.extend(&vertex_flags);
    if !legacy_like {
        push_opt(&mut out, &face_infos);
    }
    out.extend(&modes);
    push_opt(&mut out, &mesh.face_priorities);
    push_opt(&mut out, &mesh.face_bones);
    if legacy_like {
        push_opt(&mut out, &face_infos);
    }
    if sized_groups {
        out.extend(&vertex_groups);
    } else {
        push_opt(&mut out, &mesh.vertex_bones);
    }
    push_opt(&mut out, &mesh.face_alphas);
    out.extend(&indices);
    if legacy_like {
        out.extend(&colors);
        out.extend(&simple);
        out.extend(&vx);
        out.extend(&vy);
        out.extend(&vz);
    } else {
        out.extend(&face_textures);
        out.extend(&texture_coords);
        out.extend(&colors);
        out.extend(&vx);
        out.extend(&vy);
        out.extend(&vz);
        out.extend(&simple);
        out.extend(&complex);
        out.extend(&texture_params);
    }

    // Trailer
    write_u16(&mut out, vc as u16);
    write_u16(&mut out, fc as u16);
    out.push(mesh.texture_mapping.len() as u8);
    let has_infos = flag(face_infos.is_some());
    let has_alphas = flag(mesh.face_alphas.is_some());
    let has_face_bones = flag(mesh.face_bones.is_some());
    let has_face_textures = flag(mesh.face_textures.is_some());
    let has_vertex_bones = flag(mesh.vertex_bones.is_some());
    let trailer_flags: Vec<u8> = match format {
        MeshFormat::Legacy => vec![has_infos, priority, has_alphas, has_face_bones, has_vertex_bones],
        MeshFormat::Type1 => vec![
            has_infos,
            priority,
            has_alphas,
            has_face_bones,
            has_face_textures,
            has_vertex_bones,
        ],
        MeshFormat::Type2 => vec![
            has_infos,
            priority,
            has_alphas,
            has_face_bones,
            has_vertex_bones,
            flag(has_animaya),
        ],
        MeshFormat::Type3 => vec![
            has_infos,
            priority,
            has_alphas,
            has_face_bones,
            has_face_textures,
            has_vertex_bones,
            flag(has_animaya),
        ],
    };
    out.extend(trailer_flags);
    write_u16(&mut out, vx.len() as u16);
    write_u16(&mut out, vy.len() as u16);
    write_u16(&mut out, vz.len() as u16);
    write_u16(&mut out, indices.len() as u16);
    match format {
        MeshFormat::Legacy => {}
        MeshFormat::Type1 => write_u16(&mut out, texture_coords.len() as u16),
        MeshFormat::Type2 => write_u16(&mut out, vertex_groups.len() as u16),
        MeshFormat::Type3 => {
            write_u16(&mut out, texture_coords.len() as u16);
            write_u16(&mut out, vertex_groups.len() as u16);
        }
    }
    if let Some(tag) = format.tag() {
        out.extend(tag);
    }

    out
}
