//! Decoded mesh records
//!
//! Meshes arrive as opaque byte buffers in one of four wire formats. The
//! last two bytes select the format; everything else is laid out as a run
//! of fixed-order sections described by a trailer at the end of the buffer.
//!
//! The decoded `Mesh` is a struct-of-arrays whose lengths and face indices
//! are validated before it is handed out, so the rest of the pipeline can
//! index without further checks.

mod bones;
mod buffer;
mod decode;
#[cfg(test)]
pub(crate) mod encode;

pub use bones::BoneIndex;
pub use buffer::{ByteReader, Sections};
pub use decode::decode_mesh;

use thiserror::Error;

/// Number of render priority levels a face can carry
pub const PRIORITY_LEVELS: usize = 12;

/// Failure to turn bytes into a mesh, framemap or frame
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("buffer of {len} bytes is shorter than the {needed}-byte trailer")]
    TrailerTooShort { len: usize, needed: usize },

    #[error("section `{section}` ends at {end}, past the data region of {limit} bytes")]
    SectionOutOfBounds {
        section: &'static str,
        end: usize,
        limit: usize,
    },

    #[error("unexpected end of section `{section}` at offset {offset}")]
    UnexpectedEof { section: &'static str, offset: usize },

    #[error("face {face} references vertex {index}, mesh has {vertex_count}")]
    FaceIndexOutOfRange {
        face: usize,
        index: i64,
        vertex_count: usize,
    },

    #[error("face {face} has unknown index compression mode {mode}")]
    InvalidFaceMode { face: usize, mode: u8 },

    #[error("face {face} selects texture triangle {coord}, mesh has {texture_count}")]
    TextureIndexOutOfRange {
        face: usize,
        coord: i16,
        texture_count: usize,
    },

    #[error("face {face} has priority {priority}, at most {max} is supported")]
    InvalidPriority { face: usize, priority: u8, max: usize },

    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("frame slot {slot} is outside the framemap of {len} entries")]
    FramemapMismatch { slot: usize, len: usize },

    #[error("frame data consumed {consumed} of {len} bytes")]
    TrailingFrameData { consumed: usize, len: usize },
}

// ============================================================================
// Format
// ============================================================================

/// Wire format variants, selected by the trailing two bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    /// No tag: 18-byte trailer
    Legacy,
    /// Tag `FF FF`: 23-byte trailer, textured-triangle render kinds
    Type1,
    /// Tag `FF FE`: 23-byte trailer, sized vertex-group section
    Type2,
    /// Tag `FF FD`: 26-byte trailer, both of the above
    Type3,
}

impl MeshFormat {
    pub fn detect(data: &[u8]) -> Self {
        match data {
            [.., 0xFF, 0xFD] => MeshFormat::Type3,
            [.., 0xFF, 0xFE] => MeshFormat::Type2,
            [.., 0xFF, 0xFF] => MeshFormat::Type1,
            _ => MeshFormat::Legacy,
        }
    }

    pub fn trailer_len(self) -> usize {
        match self {
            MeshFormat::Legacy => 18,
            MeshFormat::Type1 | MeshFormat::Type2 => 23,
            MeshFormat::Type3 => 26,
        }
    }

    pub fn tag(self) -> Option<[u8; 2]> {
        match self {
            MeshFormat::Legacy => None,
            MeshFormat::Type1 => Some([0xFF, 0xFF]),
            MeshFormat::Type2 => Some([0xFF, 0xFE]),
            MeshFormat::Type3 => Some([0xFF, 0xFD]),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MeshFormat::Legacy => "legacy",
            MeshFormat::Type1 => "type1",
            MeshFormat::Type2 => "type2",
            MeshFormat::Type3 => "type3",
        }
    }
}

// ============================================================================
// Mesh
// ============================================================================

/// Basis of one texture triangle (three vertex indices)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureMapping {
    /// 0 = simple, 1..=3 = complex projections
    pub kind: u8,
    pub p: u16,
    pub m: u16,
    pub n: u16,
}

/// A decoded, immutable mesh
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub format: MeshFormat,

    pub vertices_x: Vec<i32>,
    pub vertices_y: Vec<i32>,
    pub vertices_z: Vec<i32>,
    /// Raw bone id per vertex
    pub vertex_bones: Option<Vec<u8>>,

    pub face_a: Vec<u32>,
    pub face_b: Vec<u32>,
    pub face_c: Vec<u32>,
    /// Packed HSL16 base colour (lightness 127 for textured faces)
    pub face_colors: Vec<u16>,
    /// Render info; `& 3` selects gouraud, flat, hidden or black
    pub face_infos: Option<Vec<u8>>,
    pub face_priorities: Option<Vec<u8>>,
    /// Priority shared by every face when `face_priorities` is absent
    pub model_priority: u8,
    /// 0 is opaque, 255 fully transparent
    pub face_alphas: Option<Vec<u8>>,
    /// Raw bone id per face, used by alpha animation
    pub face_bones: Option<Vec<u8>>,
    /// Texture id per face, -1 when untextured
    pub face_textures: Option<Vec<i16>>,
    /// Texture triangle per face, -1 when the face is its own basis
    pub face_texture_coords: Option<Vec<i16>>,

    pub texture_mapping: Vec<TextureMapping>,
}

impl Mesh {
    pub fn empty(format: MeshFormat) -> Self {
        Self {
            format,
            vertices_x: Vec::new(),
            vertices_y: Vec::new(),
            vertices_z: Vec::new(),
            vertex_bones: None,
            face_a: Vec::new(),
            face_b: Vec::new(),
            face_c: Vec::new(),
            face_colors: Vec::new(),
            face_infos: None,
            face_priorities: None,
            model_priority: 0,
            face_alphas: None,
            face_bones: None,
            face_textures: None,
            face_texture_coords: None,
            texture_mapping: Vec::new(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices_x.len()
    }

    pub fn face_count(&self) -> usize {
        self.face_a.len()
    }

    /// Vertex indices of face `i`
    pub fn face(&self, i: usize) -> [usize; 3] {
        [
            self.face_a[i] as usize,
            self.face_b[i] as usize,
            self.face_c[i] as usize,
        ]
    }

    pub fn face_info(&self, i: usize) -> u8 {
        self.face_infos.as_ref().map_or(0, |infos| infos[i])
    }

    pub fn face_priority(&self, i: usize) -> u8 {
        self.face_priorities
            .as_ref()
            .map_or(self.model_priority, |p| p[i])
    }

    pub fn face_texture(&self, i: usize) -> i16 {
        self.face_textures.as_ref().map_or(-1, |t| t[i])
    }

    /// Axis-aligned bounds as (min, max), `None` for a mesh without vertices
    pub fn bounds(&self) -> Option<([i32; 3], [i32; 3])> {
        if self.vertex_count() == 0 {
            return None;
        }
        let mut min = [i32::MAX; 3];
        let mut max = [i32::MIN; 3];
        for i in 0..self.vertex_count() {
            let v = [self.vertices_x[i], self.vertices_y[i], self.vertices_z[i]];
            for axis in 0..3 {
                min[axis] = min[axis].min(v[axis]);
                max[axis] = max[axis].max(v[axis]);
            }
        }
        Some((min, max))
    }

    /// Check every length and index invariant
    pub fn validate(&self) -> Result<(), DecodeError> {
        let vc = self.vertex_count();
        let fc = self.face_count();

        fn check_len<T>(name: &str, v: &Option<Vec<T>>, want: usize) -> Result<(), DecodeError> {
            match v {
                Some(v) if v.len() != want => Err(DecodeError::InvalidMesh(format!(
                    "{} has {} entries, expected {}",
                    name,
                    v.len(),
                    want
                ))),
                _ => Ok(()),
            }
        }

        if self.vertices_y.len() != vc || self.vertices_z.len() != vc {
            return Err(DecodeError::InvalidMesh(
                "vertex coordinate arrays differ in length".to_string(),
            ));
        }
        if self.face_b.len() != fc || self.face_c.len() != fc || self.face_colors.len() != fc {
            return Err(DecodeError::InvalidMesh(
                "face arrays differ in length".to_string(),
            ));
        }
        check_len("vertex_bones", &self.vertex_bones, vc)?;
        check_len("face_infos", &self.face_infos, fc)?;
        check_len("face_priorities", &self.face_priorities, fc)?;
        check_len("face_alphas", &self.face_alphas, fc)?;
        check_len("face_bones", &self.face_bones, fc)?;
        check_len("face_textures", &self.face_textures, fc)?;
        check_len("face_texture_coords", &self.face_texture_coords, fc)?;

        for face in 0..fc {
            for index in self.face(face) {
                if index >= vc {
                    return Err(DecodeError::FaceIndexOutOfRange {
                        face,
                        index: index as i64,
                        vertex_count: vc,
                    });
                }
            }
            let priority = self.face_priority(face);
            if priority as usize >= PRIORITY_LEVELS {
                return Err(DecodeError::InvalidPriority {
                    face,
                    priority,
                    max: PRIORITY_LEVELS - 1,
                });
            }
        }

        if let Some(coords) = &self.face_texture_coords {
            for (face, &coord) in coords.iter().enumerate() {
                if coord != -1 && (coord < 0 || coord as usize >= self.texture_mapping.len()) {
                    return Err(DecodeError::TextureIndexOutOfRange {
                        face,
                        coord,
                        texture_count: self.texture_mapping.len(),
                    });
                }
            }
        }

        for (i, t) in self.texture_mapping.iter().enumerate() {
            if [t.p, t.m, t.n].iter().any(|&v| v as usize >= vc) {
                return Err(DecodeError::InvalidMesh(format!(
                    "texture triangle {} references a vertex outside the mesh",
                    i
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Mesh {
        let mut mesh = Mesh::empty(MeshFormat::Legacy);
        mesh.vertices_x = vec![0, 10, 0];
        mesh.vertices_y = vec![0, 0, 10];
        mesh.vertices_z = vec![0, 0, 0];
        mesh.face_a = vec![0];
        mesh.face_b = vec![1];
        mesh.face_c = vec![2];
        mesh.face_colors = vec![0x1234];
        mesh
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(MeshFormat::detect(&[1, 2, 0xFF, 0xFD]), MeshFormat::Type3);
        assert_eq!(MeshFormat::detect(&[0xFF, 0xFE]), MeshFormat::Type2);
        assert_eq!(MeshFormat::detect(&[0xFF, 0xFF]), MeshFormat::Type1);
        assert_eq!(MeshFormat::detect(&[0xFF, 0xFC]), MeshFormat::Legacy);
        assert_eq!(MeshFormat::detect(&[0xFF]), MeshFormat::Legacy);
    }

    #[test]
    fn test_validate_ok() {
        assert!(triangle().validate().is_ok());
    }

    #[test]
    fn test_validate_face_index() {
        let mut mesh = triangle();
        mesh.face_c = vec![3];
        assert_eq!(
            mesh.validate(),
            Err(DecodeError::FaceIndexOutOfRange {
                face: 0,
                index: 3,
                vertex_count: 3
            })
        );
    }

    #[test]
    fn test_validate_optional_length() {
        let mut mesh = triangle();
        mesh.face_alphas = Some(vec![0, 0]);
        assert!(matches!(mesh.validate(), Err(DecodeError::InvalidMesh(_))));
    }

    #[test]
    fn test_bounds() {
        let (min, max) = triangle().bounds().unwrap();
        assert_eq!(min, [0, 0, 0]);
        assert_eq!(max, [10, 10, 0]);
        assert!(Mesh::empty(MeshFormat::Type1).bounds().is_none());
    }
}
