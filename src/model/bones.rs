//! Bone grouping
//!
//! Inverts the per-vertex and per-face bone ids into one member list per
//! bone, which is what frame transforms iterate.

use super::Mesh;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoneIndex {
    /// Vertex indices per bone id, `max id + 1` entries
    pub vertex_groups: Vec<Vec<usize>>,
    /// Face indices per bone id
    pub face_groups: Vec<Vec<usize>>,
}

fn group(ids: Option<&[u8]>) -> Vec<Vec<usize>> {
    let Some(ids) = ids else {
        return Vec::new();
    };
    let Some(&max) = ids.iter().max() else {
        return Vec::new();
    };

    let mut groups = vec![Vec::new(); max as usize + 1];
    for (index, &bone) in ids.iter().enumerate() {
        groups[bone as usize].push(index);
    }
    groups
}

impl BoneIndex {
    pub fn from_mesh(mesh: &Mesh) -> Self {
        Self {
            vertex_groups: group(mesh.vertex_bones.as_deref()),
            face_groups: group(mesh.face_bones.as_deref()),
        }
    }

    pub fn vertices(&self, bone: usize) -> &[usize] {
        self.vertex_groups.get(bone).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn faces(&self, bone: usize) -> &[usize] {
        self.face_groups.get(bone).map(Vec::as_slice).unwrap_or(&[])
    }
}
