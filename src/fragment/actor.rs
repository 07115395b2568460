//! Actor fragments (kinds 0x14 and 0x15).

use crate::error::Result;
use crate::field::FieldReader;

/// One action of an actor definition: distance thresholds for its
/// level-of-detail switches.
#[derive(Debug, Clone)]
pub struct ActorAction {
    pub min_distances: Vec<f32>,
}

/// 0x14 — actor definition: the top-level object tying skeletons, meshes
/// and sprites into one placeable entity.
#[derive(Debug, Clone)]
pub struct ActorDefFragment {
    pub flags: u32,
    /// Name reference of the client callback driving this actor.
    pub callback_ref: i32,
    /// Initially selected action (flag bit 0).
    pub current_action: Option<u32>,
    /// Spawn placement `{x, y, z, rx, ry, rz}` (flag bit 1).
    pub location: Option<[f32; 6]>,
    pub actions: Vec<ActorAction>,
    /// References to the component fragments (skeleton/mesh/sprite
    /// instances) this actor is assembled from.
    pub component_refs: Vec<i32>,
}

impl ActorDefFragment {
    const HAS_CURRENT_ACTION: u32 = 0x01;
    const HAS_LOCATION: u32 = 0x02;

    pub(crate) fn decode(reader: &mut FieldReader<'_>) -> Result<Self> {
        let flags = reader.read_u32()?;
        let callback_ref = reader.read_reference()?;
        let action_count = reader.read_u32()? as usize;
        let component_count = reader.read_u32()? as usize;
        // Bounds reference; unused by this crate but part of the record.
        let _bounds_ref = reader.read_reference()?;

        let current_action = if flags & Self::HAS_CURRENT_ACTION != 0 {
            Some(reader.read_u32()?)
        } else {
            None
        };
        let location = if flags & Self::HAS_LOCATION != 0 {
            let mut loc = [0.0f32; 6];
            for slot in &mut loc {
                *slot = reader.read_f32()?;
            }
            Some(loc)
        } else {
            None
        };

        let mut actions = Vec::with_capacity(action_count.min(reader.remaining() / 4));
        for _ in 0..action_count {
            let lod_count = reader.read_u32()? as usize;
            let mut min_distances = Vec::with_capacity(lod_count.min(reader.remaining() / 4));
            for _ in 0..lod_count {
                min_distances.push(reader.read_f32()?);
            }
            actions.push(ActorAction { min_distances });
        }

        let mut component_refs = Vec::with_capacity(component_count.min(reader.remaining() / 4));
        for _ in 0..component_count {
            component_refs.push(reader.read_reference()?);
        }

        Ok(Self {
            flags,
            callback_ref,
            current_action,
            location,
            actions,
            component_refs,
        })
    }
}

/// 0x15 — actor instance.
#[derive(Debug, Clone)]
pub struct ActorFragment {
    pub def_ref: i32,
    pub flags: u32,
}

impl ActorFragment {
    pub(crate) fn decode(reader: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            def_ref: reader.read_reference()?,
            flags: reader.read_u32()?,
        })
    }
}
