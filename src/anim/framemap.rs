//! Framemap decoding

use crate::model::{ByteReader, DecodeError};

/// What a group set does when a frame op targets it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    /// Sets the pivot for the following ops
    Origin,
    Translate,
    Rotate,
    Scale,
    /// Fades face alphas
    Alpha,
    /// Unrecognised kind, applied as a no-op
    Other(u8),
}

impl From<u8> for TransformKind {
    fn from(value: u8) -> Self {
        match value {
            0 => TransformKind::Origin,
            1 => TransformKind::Translate,
            2 => TransformKind::Rotate,
            3 => TransformKind::Scale,
            5 => TransformKind::Alpha,
            other => TransformKind::Other(other),
        }
    }
}

/// Table of bone group sets and their transform kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framemap {
    pub id: u16,
    pub kinds: Vec<TransformKind>,
    /// Bone ids per group set
    pub bone_groups: Vec<Vec<u8>>,
}

impl Framemap {
    /// Wire layout: `len u8, kinds[len], group_len[len], groups...`
    pub fn decode(id: u16, data: &[u8]) -> Result<Self, DecodeError> {
        let mut r = ByteReader::new(data, "framemap");
        let len = r.u8()? as usize;
        let kinds = r.bytes(len)?.into_iter().map(TransformKind::from).collect();
        let group_lens = r.bytes(len)?;
        let bone_groups = group_lens
            .iter()
            .map(|&n| r.bytes(n as usize))
            .collect::<Result<_, _>>()?;

        if r.remaining() > 0 {
            log::debug!("framemap {}: ignoring {} trailing bytes", id, r.remaining());
        }

        Ok(Self {
            id,
            kinds,
            bone_groups,
        })
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_framemap() {
        let data = [3, 0, 2, 9, 1, 0, 2, 7, 4, 5];
        let map = Framemap::decode(12, &data).unwrap();
        assert_eq!(map.id, 12);
        assert_eq!(
            map.kinds,
            vec![
                TransformKind::Origin,
                TransformKind::Rotate,
                TransformKind::Other(9)
            ]
        );
        assert_eq!(map.bone_groups, vec![vec![7], vec![], vec![4, 5]]);
    }

    #[test]
    fn test_decode_truncated_groups() {
        let data = [1, 1, 3, 0, 1];
        assert!(matches!(
            Framemap::decode(0, &data),
            Err(DecodeError::UnexpectedEof { section: "framemap", .. })
        ));
    }
}
