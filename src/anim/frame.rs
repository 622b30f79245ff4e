//! Frame decoding
//!
//! A frame stores one flag byte per framemap slot; bits 1/2/4 say which of
//! x/y/z carry an explicit smart-short argument. Slots that are not
//! themselves an origin get the nearest preceding unused origin slot
//! replayed in front of them with zero arguments.

use super::framemap::{Framemap, TransformKind};
use crate::model::{ByteReader, DecodeError};

/// One transform applied to a framemap group set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformOp {
    pub group_set: usize,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub framemap_id: u16,
    pub ops: Vec<TransformOp>,
    /// Set when any op fades alphas
    pub showing: bool,
}

impl Frame {
    /// Framemap id stored in a frame buffer, without decoding the rest
    pub fn peek_framemap_id(data: &[u8]) -> Result<u16, DecodeError> {
        ByteReader::new(data, "frame_header").u16()
    }

    pub fn decode(data: &[u8], framemap: &Framemap) -> Result<Self, DecodeError> {
        let mut header = ByteReader::new(data, "frame_header");
        let framemap_id = header.u16()?;
        let len = header.u8()? as usize;
        let flags_end = 3 + len;
        if data.len() < flags_end {
            return Err(DecodeError::UnexpectedEof {
                section: "frame_flags",
                offset: data.len(),
            });
        }
        let flags = &data[3..flags_end];
        let mut args = ByteReader::new(&data[flags_end..], "frame_data");

        let mut ops = Vec::new();
        let mut showing = false;
        let mut last_used: Option<usize> = None;

        for (slot, &flag) in flags.iter().enumerate() {
            if flag == 0 {
                continue;
            }
            let kind = *framemap.kinds.get(slot).ok_or(DecodeError::FramemapMismatch {
                slot,
                len: framemap.len(),
            })?;

            if kind != TransformKind::Origin {
                let search_from = last_used.map_or(0, |used| used + 1);
                if let Some(origin) = (search_from..slot)
                    .rev()
                    .find(|&j| framemap.kinds[j] == TransformKind::Origin)
                {
                    ops.push(TransformOp {
                        group_set: origin,
                        x: 0,
                        y: 0,
                        z: 0,
                    });
                }
            }

            let default = if kind == TransformKind::Scale { 128 } else { 0 };
            let mut arg = |bit: u8| -> Result<i32, DecodeError> {
                if flag & bit != 0 {
                    args.smart_short()
                } else {
                    Ok(default)
                }
            };
            let x = arg(1)?;
            let y = arg(2)?;
            let z = arg(4)?;
            ops.push(TransformOp {
                group_set: slot,
                x,
                y,
                z,
            });

            if kind == TransformKind::Alpha {
                showing = true;
            }
            last_used = Some(slot);
        }

        if args.remaining() > 0 {
            return Err(DecodeError::TrailingFrameData {
                consumed: flags_end + args.position(),
                len: data.len(),
            });
        }

        Ok(Self {
            framemap_id,
            ops,
            showing,
        })
    }
}
