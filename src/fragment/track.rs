//! Keyframe track fragments (kinds 0x12 and 0x13).
//!
//! A track definition stores quantized keyframes: one 16-byte record per
//! frame, eight signed-16 fields in the order
//! `rot_w, rot_x, rot_y, rot_z, shift_x, shift_y, shift_z, shift_scale`.
//! Quantization is undone at decode time (see
//! [`BoneTransform::from_quantized`] for the sentinel rules), so the rest
//! of the crate only ever sees unit quaternions and plain translations.

use crate::animation::BoneTransform;
use crate::error::{Result, WldError};
use crate::field::{FieldReader, FieldValue};

/// 0x12 — one bone's keyframe sequence.
#[derive(Debug, Clone)]
pub struct TrackDefFragment {
    pub flags: u32,
    pub frames: Vec<BoneTransform>,
}

impl TrackDefFragment {
    pub(crate) fn decode(reader: &mut FieldReader<'_>) -> Result<Self> {
        let flags = reader.read_u32()?;
        let frame_count = reader.read_u32()? as usize;

        let mut frames = Vec::with_capacity(frame_count.min(reader.remaining() / 16));
        for row in reader.read_array("hhhhhhhh", frame_count)? {
            let [FieldValue::I16(rw), FieldValue::I16(rx), FieldValue::I16(ry), FieldValue::I16(rz), FieldValue::I16(sx), FieldValue::I16(sy), FieldValue::I16(sz), FieldValue::I16(scale)] =
                row.as_slice()
            else {
                return Err(WldError::StructuralCorruption(
                    "track keyframe record has unexpected shape".into(),
                ));
            };
            frames.push(BoneTransform::from_quantized(
                [*rw, *rx, *ry, *rz],
                [*sx, *sy, *sz],
                *scale,
            ));
        }

        Ok(Self { flags, frames })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

/// 0x13 — binds a track definition into an animation, with optional
/// per-frame delay.
#[derive(Debug, Clone)]
pub struct TrackFragment {
    /// Encoded reference to the 0x12 definition.
    pub track_def_ref: i32,
    pub flags: u32,
    /// Frame delay in milliseconds (flag bit 0).
    pub sleep: Option<u32>,
}

impl TrackFragment {
    const HAS_SLEEP: u32 = 0x01;

    pub(crate) fn decode(reader: &mut FieldReader<'_>) -> Result<Self> {
        let track_def_ref = reader.read_reference()?;
        let flags = reader.read_u32()?;
        let sleep = if flags & Self::HAS_SLEEP != 0 {
            Some(reader.read_u32()?)
        } else {
            None
        };
        Ok(Self {
            track_def_ref,
            flags,
            sleep,
        })
    }
}
