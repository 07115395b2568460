//! Hierarchical skeleton fragments (kinds 0x10 and 0x11).
//!
//! A skeleton definition is an ordered node list; node 0 is the root and
//! each node names its children by index into the same list.  Nodes carry
//! the bone name, a track reference (the bind pose), and an optional
//! attached sprite/mesh reference.  The domain-level view — bind-pose
//! synthesis, animation attachment, pose sampling — lives in the crate's
//! `skeleton` module; this file only decodes the record.

use glam::Vec3;

use crate::error::Result;
use crate::field::FieldReader;

/// One node of a skeleton definition.
#[derive(Debug, Clone)]
pub struct SkeletonNodeDef {
    /// Encoded name reference (negative = string-table offset).
    pub name_ref: i32,
    pub flags: u32,
    /// Reference to the node's bind-pose track instance (0x13).
    pub track_ref: i32,
    /// Reference to an attached sprite or mesh, if any.
    pub sprite_ref: i32,
    /// Child node indices into the definition's node list.
    pub children: Vec<u32>,
}

/// 0x10 — skeleton definition.
#[derive(Debug, Clone)]
pub struct SkeletonDefFragment {
    pub flags: u32,
    /// Reference to a collision volume fragment, when present.
    pub collision_ref: i32,
    /// Model-space offset of the rig (flag bit 0).
    pub center_offset: Option<Vec3>,
    /// Culling radius (flag bit 1).
    pub bounding_radius: Option<f32>,
    pub nodes: Vec<SkeletonNodeDef>,
    /// References to the skin meshes driven by this rig (flag bit 9).
    pub mesh_refs: Vec<i32>,
    /// Per-skin link ids parallel to `mesh_refs`.
    pub mesh_link_ids: Vec<u32>,
}

impl SkeletonDefFragment {
    const HAS_CENTER_OFFSET: u32 = 0x01;
    const HAS_BOUNDING_RADIUS: u32 = 0x02;
    const HAS_MESH_REFS: u32 = 0x200;

    pub(crate) fn decode(reader: &mut FieldReader<'_>) -> Result<Self> {
        let flags = reader.read_u32()?;
        let node_count = reader.read_u32()? as usize;
        let collision_ref = reader.read_reference()?;

        let center_offset = if flags & Self::HAS_CENTER_OFFSET != 0 {
            Some(Vec3::new(
                reader.read_f32()?,
                reader.read_f32()?,
                reader.read_f32()?,
            ))
        } else {
            None
        };
        let bounding_radius = if flags & Self::HAS_BOUNDING_RADIUS != 0 {
            Some(reader.read_f32()?)
        } else {
            None
        };

        let mut nodes = Vec::with_capacity(node_count.min(reader.remaining() / 20));
        for _ in 0..node_count {
            let name_ref = reader.read_i32()?;
            let node_flags = reader.read_u32()?;
            let track_ref = reader.read_reference()?;
            let sprite_ref = reader.read_reference()?;
            let child_count = reader.read_u32()? as usize;
            let mut children = Vec::with_capacity(child_count.min(reader.remaining() / 4));
            for _ in 0..child_count {
                children.push(reader.read_u32()?);
            }
            nodes.push(SkeletonNodeDef {
                name_ref,
                flags: node_flags,
                track_ref,
                sprite_ref,
                children,
            });
        }

        let (mesh_refs, mesh_link_ids) = if flags & Self::HAS_MESH_REFS != 0 {
            let mesh_count = reader.read_u32()? as usize;
            let mut refs = Vec::with_capacity(mesh_count.min(reader.remaining() / 4));
            for _ in 0..mesh_count {
                refs.push(reader.read_reference()?);
            }
            let mut links = Vec::with_capacity(refs.len());
            for _ in 0..refs.len() {
                links.push(reader.read_u32()?);
            }
            (refs, links)
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(Self {
            flags,
            collision_ref,
            center_offset,
            bounding_radius,
            nodes,
            mesh_refs,
            mesh_link_ids,
        })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// 0x11 — skeleton instance.
#[derive(Debug, Clone)]
pub struct SkeletonFragment {
    pub def_ref: i32,
    pub flags: u32,
}

impl SkeletonFragment {
    pub(crate) fn decode(reader: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            def_ref: reader.read_reference()?,
            flags: reader.read_u32()?,
        })
    }
}
