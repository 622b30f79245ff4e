//! Mesh decoders
//!
//! Each wire format has its own trailer layout and its own section order.
//! Both are resolved up front (`Header::parse`, `layout_*`) into a `Layout`
//! of validated byte ranges; reading the sections back is shared by all
//! four formats.

use std::ops::Range;

use super::buffer::{ByteReader, Sections};
use super::{DecodeError, Mesh, MeshFormat, TextureMapping};

/// Decode a mesh buffer, choosing the format from its trailing tag
pub fn decode_mesh(data: &[u8]) -> Result<Mesh, DecodeError> {
    let format = MeshFormat::detect(data);
    let trailer_len = format.trailer_len();
    if data.len() < trailer_len {
        return Err(DecodeError::TrailerTooShort {
            len: data.len(),
            needed: trailer_len,
        });
    }

    let limit = data.len() - trailer_len;
    let header = Header::parse(format, &data[limit..])?;
    let layout = match format {
        MeshFormat::Legacy => layout_legacy(&header, limit)?,
        MeshFormat::Type1 => layout_type1(&header, data, limit)?,
        MeshFormat::Type2 => layout_type2(&header, limit)?,
        MeshFormat::Type3 => layout_type3(&header, data, limit)?,
    };

    let mesh = assemble(format, &header, &layout, data)?;
    mesh.validate()?;

    log::debug!(
        "decoded {} mesh: {} vertices, {} faces, {} texture triangles",
        format.name(),
        mesh.vertex_count(),
        mesh.face_count(),
        mesh.texture_mapping.len()
    );

    Ok(mesh)
}

// ============================================================================
// Trailer
// ============================================================================

#[derive(Debug, Default)]
struct Header {
    vertex_count: usize,
    face_count: usize,
    texture_count: usize,
    has_face_infos: bool,
    /// 255 means per-face priorities follow
    priority: u8,
    has_alphas: bool,
    has_face_bones: bool,
    has_face_textures: bool,
    has_vertex_bones: bool,
    has_animaya: bool,
    vertex_x_len: usize,
    vertex_y_len: usize,
    vertex_z_len: usize,
    index_len: usize,
    texture_coord_len: usize,
    vertex_group_len: usize,
}

impl Header {
    fn parse(format: MeshFormat, trailer: &[u8]) -> Result<Self, DecodeError> {
        let mut r = ByteReader::new(trailer, "trailer");
        let mut h = Header {
            vertex_count: r.u16()? as usize,
            face_count: r.u16()? as usize,
            texture_count: r.u8()? as usize,
            ..Header::default()
        };

        match format {
            MeshFormat::Legacy => {
                h.has_face_infos = r.u8()? == 1;
                h.priority = r.u8()?;
                h.has_alphas = r.u8()? == 1;
                h.has_face_bones = r.u8()? == 1;
                h.has_vertex_bones = r.u8()? == 1;
            }
            MeshFormat::Type1 => {
                h.has_face_infos = r.u8()? == 1;
                h.priority = r.u8()?;
                h.has_alphas = r.u8()? == 1;
                h.has_face_bones = r.u8()? == 1;
                h.has_face_textures = r.u8()? == 1;
                h.has_vertex_bones = r.u8()? == 1;
            }
            MeshFormat::Type2 => {
                h.has_face_infos = r.u8()? == 1;
                h.priority = r.u8()?;
                h.has_alphas = r.u8()? == 1;
                h.has_face_bones = r.u8()? == 1;
                h.has_vertex_bones = r.u8()? == 1;
                h.has_animaya = r.u8()? == 1;
            }
            MeshFormat::Type3 => {
                h.has_face_infos = r.u8()? & 1 != 0;
                h.priority = r.u8()?;
                h.has_alphas = r.u8()? == 1;
                h.has_face_bones = r.u8()? == 1;
                h.has_face_textures = r.u8()? == 1;
                h.has_vertex_bones = r.u8()? == 1;
                h.has_animaya = r.u8()? == 1;
            }
        }

        h.vertex_x_len = r.u16()? as usize;
        h.vertex_y_len = r.u16()? as usize;
        h.vertex_z_len = r.u16()? as usize;
        h.index_len = r.u16()? as usize;

        match format {
            MeshFormat::Legacy => {}
            MeshFormat::Type1 => h.texture_coord_len = r.u16()? as usize,
            MeshFormat::Type2 => h.vertex_group_len = r.u16()? as usize,
            MeshFormat::Type3 => {
                h.texture_coord_len = r.u16()? as usize;
                h.vertex_group_len = r.u16()? as usize;
            }
        }

        Ok(h)
    }

    fn has_priorities(&self) -> bool {
        self.priority == 255
    }
}

// ============================================================================
// Section layouts
// ============================================================================

#[derive(Debug, Default)]
struct Layout {
    /// Render kind per texture triangle (Type1/Type3 only)
    texture_kinds: Vec<u8>,
    vertex_flags: Range<usize>,
    face_infos: Option<Range<usize>>,
    face_modes: Range<usize>,
    priorities: Option<Range<usize>>,
    face_bones: Option<Range<usize>>,
    vertex_groups: Option<Range<usize>>,
    alphas: Option<Range<usize>>,
    face_indices: Range<usize>,
    face_textures: Option<Range<usize>>,
    texture_coords: Option<Range<usize>>,
    colors: Range<usize>,
    vertex_x: Range<usize>,
    vertex_y: Range<usize>,
    vertex_z: Range<usize>,
    simple_textures: Range<usize>,
    complex_textures: Range<usize>,
}

// Struct fields below are evaluated in source order, which is the wire order.

fn layout_legacy(h: &Header, limit: usize) -> Result<Layout, DecodeError> {
    let (vc, fc) = (h.vertex_count, h.face_count);
    let mut s = Sections::new(limit);
    Ok(Layout {
        vertex_flags: s.take("vertex_flags", vc)?,
        face_modes: s.take("face_modes", fc)?,
        priorities: s.take_if("face_priorities", h.has_priorities(), fc)?,
        face_bones: s.take_if("face_bones", h.has_face_bones, fc)?,
        face_infos: s.take_if("face_render_types", h.has_face_infos, fc)?,
        vertex_groups: s.take_if("vertex_bones", h.has_vertex_bones, vc)?,
        alphas: s.take_if("face_alphas", h.has_alphas, fc)?,
        face_indices: s.take("face_indices", h.index_len)?,
        colors: s.take("face_colors", fc * 2)?,
        simple_textures: s.take("texture_triangles", h.texture_count * 6)?,
        vertex_x: s.take("vertex_x", h.vertex_x_len)?,
        vertex_y: s.take("vertex_y", h.vertex_y_len)?,
        vertex_z: s.take("vertex_z", h.vertex_z_len)?,
        ..Layout::default()
    })
}

fn layout_type2(h: &Header, limit: usize) -> Result<Layout, DecodeError> {
    let (vc, fc) = (h.vertex_count, h.face_count);
    let mut s = Sections::new(limit);
    Ok(Layout {
        vertex_flags: s.take("vertex_flags", vc)?,
        face_modes: s.take("face_modes", fc)?,
        priorities: s.take_if("face_priorities", h.has_priorities(), fc)?,
        face_bones: s.take_if("face_bones", h.has_face_bones, fc)?,
        face_infos: s.take_if("face_render_types", h.has_face_infos, fc)?,
        vertex_groups: Some(s.take("vertex_groups", h.vertex_group_len)?),
        alphas: s.take_if("face_alphas", h.has_alphas, fc)?,
        face_indices: s.take("face_indices", h.index_len)?,
        colors: s.take("face_colors", fc * 2)?,
        simple_textures: s.take("texture_triangles", h.texture_count * 6)?,
        vertex_x: s.take("vertex_x", h.vertex_x_len)?,
        vertex_y: s.take("vertex_y", h.vertex_y_len)?,
        vertex_z: s.take("vertex_z", h.vertex_z_len)?,
        ..Layout::default()
    })
}

/// Counts of (simple, complex, cube) texture triangles
fn count_texture_kinds(kinds: &[u8]) -> (usize, usize, usize) {
    let simple = kinds.iter().filter(|&&k| k == 0).count();
    let complex = kinds.iter().filter(|&&k| (1..=3).contains(&k)).count();
    let cube = kinds.iter().filter(|&&k| k == 2).count();
    (simple, complex, cube)
}

fn layout_type1(h: &Header, data: &[u8], limit: usize) -> Result<Layout, DecodeError> {
    let (vc, fc) = (h.vertex_count, h.face_count);
    let mut s = Sections::new(limit);
    let texture_kinds = data[s.take("texture_kinds", h.texture_count)?].to_vec();
    let (simple, complex, cube) = count_texture_kinds(&texture_kinds);

    let layout = Layout {
        texture_kinds,
        vertex_flags: s.take("vertex_flags", vc)?,
        face_infos: s.take_if("face_render_types", h.has_face_infos, fc)?,
        face_modes: s.take("face_modes", fc)?,
        priorities: s.take_if("face_priorities", h.has_priorities(), fc)?,
        face_bones: s.take_if("face_bones", h.has_face_bones, fc)?,
        vertex_groups: s.take_if("vertex_bones", h.has_vertex_bones, vc)?,
        alphas: s.take_if("face_alphas", h.has_alphas, fc)?,
        face_indices: s.take("face_indices", h.index_len)?,
        face_textures: s.take_if("face_textures", h.has_face_textures, fc * 2)?,
        texture_coords: Some(s.take("texture_coords", h.texture_coord_len)?),
        colors: s.take("face_colors", fc * 2)?,
        vertex_x: s.take("vertex_x", h.vertex_x_len)?,
        vertex_y: s.take("vertex_y", h.vertex_y_len)?,
        vertex_z: s.take("vertex_z", h.vertex_z_len)?,
        simple_textures: s.take("simple_textures", simple * 6)?,
        complex_textures: s.take("complex_textures", complex * 6)?,
        ..Layout::default()
    };

    // Projection parameters of complex triangles are not rendered, only bounds checked
    s.take("texture_scales", complex * 6)?;
    s.take("texture_rotations", complex * 2)?;
    s.take("texture_directions", complex)?;
    s.take("texture_translations", complex * 2 + cube * 2)?;

    Ok(layout)
}

fn layout_type3(h: &Header, data: &[u8], limit: usize) -> Result<Layout, DecodeError> {
    let (vc, fc) = (h.vertex_count, h.face_count);
    let mut s = Sections::new(limit);
    let texture_kinds = data[s.take("texture_kinds", h.texture_count)?].to_vec();
    let (simple, complex, cube) = count_texture_kinds(&texture_kinds);

    let layout = Layout {
        texture_kinds,
        vertex_flags: s.take("vertex_flags", vc)?,
        face_infos: s.take_if("face_render_types", h.has_face_infos, fc)?,
        face_modes: s.take("face_modes", fc)?,
        priorities: s.take_if("face_priorities", h.has_priorities(), fc)?,
        face_bones: s.take_if("face_bones", h.has_face_bones, fc)?,
        vertex_groups: Some(s.take("vertex_groups", h.vertex_group_len)?),
        alphas: s.take_if("face_alphas", h.has_alphas, fc)?,
        face_indices: s.take("face_indices", h.index_len)?,
        face_textures: s.take_if("face_textures", h.has_face_textures, fc * 2)?,
        texture_coords: Some(s.take("texture_coords", h.texture_coord_len)?),
        colors: s.take("face_colors", fc * 2)?,
        vertex_x: s.take("vertex_x", h.vertex_x_len)?,
        vertex_y: s.take("vertex_y", h.vertex_y_len)?,
        vertex_z: s.take("vertex_z", h.vertex_z_len)?,
        simple_textures: s.take("simple_textures", simple * 6)?,
        complex_textures: s.take("complex_textures", complex * 6)?,
        ..Layout::default()
    };

    s.take("texture_scales", complex * 6)?;
    s.take("texture_rotations", complex * 2)?;
    s.take("texture_directions", complex)?;
    s.take("texture_translations", complex * 2 + cube * 2)?;

    Ok(layout)
}

// ============================================================================
// Section readers
// ============================================================================

fn assemble(
    format: MeshFormat,
    h: &Header,
    layout: &Layout,
    data: &[u8],
) -> Result<Mesh, DecodeError> {
    let (vc, fc) = (h.vertex_count, h.face_count);
    let mut mesh = Mesh::empty(format);

    decode_vertices(&mut mesh, vc, layout, data)?;

    if let Some(range) = &layout.vertex_groups {
        let mut groups = ByteReader::over(data, range.clone(), "vertex_groups");
        if h.has_vertex_bones {
            mesh.vertex_bones = Some(groups.bytes(vc)?);
        }
        if h.has_animaya {
            skip_animaya(&mut groups, vc)?;
        }
    }

    let mut colors = ByteReader::over(data, layout.colors.clone(), "face_colors");
    mesh.face_colors = (0..fc).map(|_| colors.u16()).collect::<Result<_, _>>()?;

    match &layout.priorities {
        Some(range) => mesh.face_priorities = Some(data[range.clone()].to_vec()),
        None => mesh.model_priority = h.priority,
    }
    mesh.face_bones = layout.face_bones.clone().map(|r| data[r].to_vec());
    mesh.face_alphas = layout.alphas.clone().map(|r| data[r].to_vec());

    match format {
        MeshFormat::Legacy | MeshFormat::Type2 => {
            if let Some(range) = &layout.face_infos {
                apply_render_types(&mut mesh, &data[range.clone()]);
            }
        }
        MeshFormat::Type1 | MeshFormat::Type3 => {
            mesh.face_infos = layout.face_infos.clone().map(|r| data[r].to_vec());
            if let Some(range) = &layout.face_textures {
                decode_face_textures(&mut mesh, h, range.clone(), layout, data)?;
            }
        }
    }

    decode_face_indices(&mut mesh, fc, layout, data)?;

    match format {
        MeshFormat::Legacy | MeshFormat::Type2 => {
            let mut simple = ByteReader::over(data, layout.simple_textures.clone(), "texture_triangles");
            mesh.texture_mapping = (0..h.texture_count)
                .map(|_| read_mapping(&mut simple, 0))
                .collect::<Result<_, _>>()?;
            clear_self_mapped_coords(&mut mesh);
        }
        MeshFormat::Type1 | MeshFormat::Type3 => {
            let mut simple = ByteReader::over(data, layout.simple_textures.clone(), "simple_textures");
            let mut complex = ByteReader::over(data, layout.complex_textures.clone(), "complex_textures");
            mesh.texture_mapping = layout
                .texture_kinds
                .iter()
                .map(|&kind| match kind {
                    0 => read_mapping(&mut simple, kind),
                    1..=3 => read_mapping(&mut complex, kind),
                    _ => Ok(TextureMapping { kind, ..TextureMapping::default() }),
                })
                .collect::<Result<_, _>>()?;
        }
    }

    // Alpha animation needs a target even when the mesh ships no alphas
    if mesh.face_bones.is_some() && mesh.face_alphas.is_none() {
        mesh.face_alphas = Some(vec![0; fc]);
    }

    Ok(mesh)
}

fn decode_vertices(
    mesh: &mut Mesh,
    vertex_count: usize,
    layout: &Layout,
    data: &[u8],
) -> Result<(), DecodeError> {
    let mut flags = ByteReader::over(data, layout.vertex_flags.clone(), "vertex_flags");
    let mut xs = ByteReader::over(data, layout.vertex_x.clone(), "vertex_x");
    let mut ys = ByteReader::over(data, layout.vertex_y.clone(), "vertex_y");
    let mut zs = ByteReader::over(data, layout.vertex_z.clone(), "vertex_z");

    mesh.vertices_x = Vec::with_capacity(vertex_count);
    mesh.vertices_y = Vec::with_capacity(vertex_count);
    mesh.vertices_z = Vec::with_capacity(vertex_count);

    let (mut x, mut y, mut z) = (0i32, 0i32, 0i32);
    for _ in 0..vertex_count {
        let flag = flags.u8()?;
        if flag & 1 != 0 {
            x = x.wrapping_add(xs.smart_short()?);
        }
        if flag & 2 != 0 {
            y = y.wrapping_add(ys.smart_short()?);
        }
        if flag & 4 != 0 {
            z = z.wrapping_add(zs.smart_short()?);
        }
        mesh.vertices_x.push(x);
        mesh.vertices_y.push(y);
        mesh.vertices_z.push(z);
    }
    Ok(())
}

/// Replay the four-register index compression
fn decode_face_indices(
    mesh: &mut Mesh,
    face_count: usize,
    layout: &Layout,
    data: &[u8],
) -> Result<(), DecodeError> {
    let mut modes = ByteReader::over(data, layout.face_modes.clone(), "face_modes");
    let mut indices = ByteReader::over(data, layout.face_indices.clone(), "face_indices");
    let vertex_count = mesh.vertex_count();

    mesh.face_a = Vec::with_capacity(face_count);
    mesh.face_b = Vec::with_capacity(face_count);
    mesh.face_c = Vec::with_capacity(face_count);

    let (mut a, mut b, mut c, mut last) = (0i32, 0i32, 0i32, 0i32);
    for face in 0..face_count {
        let mode = modes.u8()?;
        match mode {
            1 => {
                a = indices.smart_short()? + last;
                b = indices.smart_short()? + a;
                c = indices.smart_short()? + b;
            }
            2 => {
                b = c;
                c = indices.smart_short()? + last;
            }
            3 => {
                a = c;
                c = indices.smart_short()? + last;
            }
            4 => {
                std::mem::swap(&mut a, &mut b);
                c = indices.smart_short()? + last;
            }
            _ => return Err(DecodeError::InvalidFaceMode { face, mode }),
        }
        last = c;

        for index in [a, b, c] {
            if index < 0 || index as usize >= vertex_count {
                return Err(DecodeError::FaceIndexOutOfRange {
                    face,
                    index: index as i64,
                    vertex_count,
                });
            }
        }
        mesh.face_a.push(a as u32);
        mesh.face_b.push(b as u32);
        mesh.face_c.push(c as u32);
    }
    Ok(())
}

/// Legacy/Type2 render-type byte: bit 0 flat shading, bit 1 textured with
/// the colour field holding the texture id and the high bits the coord.
fn apply_render_types(mesh: &mut Mesh, render_types: &[u8]) {
    let fc = render_types.len();
    let mut infos = vec![0u8; fc];
    let mut textures = vec![-1i16; fc];
    let mut coords = vec![-1i16; fc];
    let mut textured = false;

    for (i, &flag) in render_types.iter().enumerate() {
        if flag & 1 != 0 {
            infos[i] = 1;
        }
        if flag & 2 != 0 {
            textures[i] = mesh.face_colors[i] as i16;
            coords[i] = (flag >> 2) as i16;
            mesh.face_colors[i] = 127;
            textured = true;
        }
    }

    mesh.face_infos = Some(infos);
    if textured {
        mesh.face_textures = Some(textures);
        mesh.face_texture_coords = Some(coords);
    }
}

fn decode_face_textures(
    mesh: &mut Mesh,
    h: &Header,
    range: Range<usize>,
    layout: &Layout,
    data: &[u8],
) -> Result<(), DecodeError> {
    let fc = h.face_count;
    let mut reader = ByteReader::over(data, range, "face_textures");
    let textures: Vec<i16> = (0..fc)
        .map(|_| reader.u16().map(|t| (t as i32 - 1) as i16))
        .collect::<Result<_, _>>()?;

    if h.texture_count > 0 {
        let coords_range = layout.texture_coords.clone().unwrap_or_default();
        let mut reader = ByteReader::over(data, coords_range, "texture_coords");
        let mut coords = vec![-1i16; fc];
        for (coord, &texture) in coords.iter_mut().zip(&textures) {
            if texture != -1 {
                *coord = reader.u8()? as i16 - 1;
            }
        }
        mesh.face_texture_coords = Some(coords);
    }

    mesh.face_textures = Some(textures);
    Ok(())
}

fn read_mapping(reader: &mut ByteReader, kind: u8) -> Result<TextureMapping, DecodeError> {
    Ok(TextureMapping {
        kind,
        p: reader.u16()?,
        m: reader.u16()?,
        n: reader.u16()?,
    })
}

/// Per-vertex weight lists trail the bone bytes; they carry no data we render
fn skip_animaya(groups: &mut ByteReader, vertex_count: usize) -> Result<(), DecodeError> {
    for _ in 0..vertex_count {
        let count = groups.u8()? as usize;
        groups.skip(count * 2)?;
    }
    Ok(())
}

/// A face whose texture triangle is the face itself needs no coord
fn clear_self_mapped_coords(mesh: &mut Mesh) {
    let Some(coords) = mesh.face_texture_coords.as_mut() else {
        return;
    };

    let mut keep = false;
    for (i, coord) in coords.iter_mut().enumerate() {
        if *coord < 0 {
            continue;
        }
        match mesh.texture_mapping.get(*coord as usize) {
            Some(t)
                if mesh.face_a[i] == t.p as u32
                    && mesh.face_b[i] == t.m as u32
                    && mesh.face_c[i] == t.n as u32 =>
            {
                *coord = -1;
            }
            // out-of-range coords are kept so validation reports them
            _ => keep = true,
        }
    }

    if !keep {
        mesh.face_texture_coords = None;
    }
}
