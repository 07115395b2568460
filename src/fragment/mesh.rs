//! Mesh fragments (kinds 0x36 and 0x2D).
//!
//! # Payload layout (0x36)
//!
//! After the flags and reference block, a mesh definition carries its
//! center, bounding volume, ten u16 counts, and then the quantized
//! arrays in declaration order: vertices, texcoords, normals, colors,
//! polygons, vertex pieces, material groups, vertex materials, mesh-op
//! records.  All coordinates are local: the owning part's center vector
//! offsets them downstream, never here.
//!
//! # Quantization
//!
//! Bit-exact, by array:
//! - vertices: `i16 × 3`, scaled by `1 / 2^scale_exponent`;
//! - texcoords: `i16 × 2`, divided by 256;
//! - normals: `i8 × 3`, divided by 127 (not renormalized);
//! - colors: 4×u8 RGBA;
//! - polygons: `u16 × 4` `{flag, i0, i1, i2}`, flag discarded.
//!
//! # Range pairs
//!
//! Per-bone vertex pieces and per-material polygon groups are `(count,
//! id)` pairs consumed against a running cursor: each pair claims the next
//! `count` items for `id` and advances the cursor.  An id of 0 (or a
//! material whose render mode is 0 — the container checks that part)
//! marks an invisible group whose range still occupies cursor space so
//! that downstream offsets stay correct.

use glam::{Vec2, Vec3};

use crate::error::{Result, WldError};
use crate::field::{FieldReader, FieldValue};

/// Byte width of one mesh-op record (trailing data this crate skips).
const MESHOP_SIZE: usize = 12;

// ── Range views ───────────────────────────────────────────────────────────────

/// Contiguous run of vertices assigned to one bone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexPieceRange {
    pub start: usize,
    pub count: usize,
    pub bone: u16,
}

/// Contiguous run of polygons drawn with one palette material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialRange {
    pub material_id: u16,
    pub polygon_offset: usize,
    pub polygon_count: usize,
    /// Offset into the flattened triangle index list (polygons × 3).
    pub index_offset: usize,
    pub index_count: usize,
    /// False for material id 0.  The container additionally clears this
    /// for materials whose render mode is 0.
    pub visible: bool,
}

impl MaterialRange {
    /// Palette slot this range draws with; `None` for the id-0 sentinel.
    pub fn palette_slot(&self) -> Option<usize> {
        (self.material_id > 0).then(|| self.material_id as usize - 1)
    }
}

// ── 0x36 mesh definition ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MeshDefFragment {
    pub flags: u32,
    pub material_palette_ref: i32,
    pub animation_ref: i32,
    pub sprite_ref: i32,
    pub unknown_ref: i32,
    /// Offset the owning part applies to every vertex downstream.
    pub center: Vec3,
    pub max_distance: f32,
    pub min: Vec3,
    pub max: Vec3,
    pub scale_exponent: u16,
    pub vertices: Vec<Vec3>,
    pub texcoords: Vec<Vec2>,
    pub normals: Vec<Vec3>,
    pub colors: Vec<[u8; 4]>,
    /// Triangle index triples, flags already discarded.
    pub polygons: Vec<[u16; 3]>,
    /// Raw `(count, bone)` pairs in file order.
    pub vertex_pieces: Vec<(u16, u16)>,
    /// Raw `(polygon_count, material_id)` pairs in file order.
    pub material_groups: Vec<(u16, u16)>,
    /// Raw `(count, material_id)` pairs over vertices (skinned UV updates).
    pub vertex_materials: Vec<(u16, u16)>,
}

impl MeshDefFragment {
    pub(crate) fn decode(reader: &mut FieldReader<'_>) -> Result<Self> {
        let flags = reader.read_u32()?;
        let material_palette_ref = reader.read_reference()?;
        let animation_ref = reader.read_reference()?;
        let sprite_ref = reader.read_reference()?;
        let unknown_ref = reader.read_reference()?;

        let center = read_vec3(reader)?;
        for _ in 0..3 {
            reader.read_u32()?; // reserved
        }
        let max_distance = reader.read_f32()?;
        let min = read_vec3(reader)?;
        let max = read_vec3(reader)?;

        let vertex_count = reader.read_u16()? as usize;
        let texcoord_count = reader.read_u16()? as usize;
        let normal_count = reader.read_u16()? as usize;
        let color_count = reader.read_u16()? as usize;
        let polygon_count = reader.read_u16()? as usize;
        let vertex_piece_count = reader.read_u16()? as usize;
        let material_group_count = reader.read_u16()? as usize;
        let vertex_material_count = reader.read_u16()? as usize;
        let meshop_count = reader.read_u16()? as usize;
        let scale_exponent = reader.read_u16()?;

        let scale = 1.0 / (1u32 << (scale_exponent as u32 & 31)) as f32;

        let mut vertices = Vec::with_capacity(vertex_count);
        for _ in 0..vertex_count {
            let (x, y, z) = (reader.read_i16()?, reader.read_i16()?, reader.read_i16()?);
            vertices.push(Vec3::new(x as f32, y as f32, z as f32) * scale);
        }

        let mut texcoords = Vec::with_capacity(texcoord_count);
        for _ in 0..texcoord_count {
            let (u, v) = (reader.read_i16()?, reader.read_i16()?);
            texcoords.push(Vec2::new(u as f32 / 256.0, v as f32 / 256.0));
        }

        let mut normals = Vec::with_capacity(normal_count);
        for _ in 0..normal_count {
            let (x, y, z) = (reader.read_i8()?, reader.read_i8()?, reader.read_i8()?);
            normals.push(Vec3::new(
                x as f32 / 127.0,
                y as f32 / 127.0,
                z as f32 / 127.0,
            ));
        }

        let mut colors = Vec::with_capacity(color_count);
        for row in reader.read_array("BBBB", color_count)? {
            let [FieldValue::U8(r), FieldValue::U8(g), FieldValue::U8(b), FieldValue::U8(a)] =
                row.as_slice()
            else {
                return Err(WldError::StructuralCorruption(
                    "mesh color record has unexpected shape".into(),
                ));
            };
            colors.push([*r, *g, *b, *a]);
        }

        let mut polygons = Vec::with_capacity(polygon_count);
        for row in reader.read_array("HHHH", polygon_count)? {
            let [FieldValue::U16(_flag), FieldValue::U16(i0), FieldValue::U16(i1), FieldValue::U16(i2)] =
                row.as_slice()
            else {
                return Err(WldError::StructuralCorruption(
                    "mesh polygon record has unexpected shape".into(),
                ));
            };
            polygons.push([*i0, *i1, *i2]);
        }

        let vertex_pieces = read_pairs(reader, vertex_piece_count)?;
        let material_groups = read_pairs(reader, material_group_count)?;
        let vertex_materials = read_pairs(reader, vertex_material_count)?;

        reader.skip(meshop_count * MESHOP_SIZE)?;

        Ok(Self {
            flags,
            material_palette_ref,
            animation_ref,
            sprite_ref,
            unknown_ref,
            center,
            max_distance,
            min,
            max,
            scale_exponent,
            vertices,
            texcoords,
            normals,
            colors,
            polygons,
            vertex_pieces,
            material_groups,
            vertex_materials,
        })
    }

    /// Resolve the `(count, bone)` pairs into absolute vertex ranges.
    pub fn vertex_piece_ranges(&self) -> Vec<VertexPieceRange> {
        let mut cursor = 0usize;
        self.vertex_pieces
            .iter()
            .map(|&(count, bone)| {
                let range = VertexPieceRange {
                    start: cursor,
                    count: count as usize,
                    bone,
                };
                cursor += count as usize;
                range
            })
            .collect()
    }

    /// The bone owning vertex `index`, per the piece ranges.
    pub fn bone_of_vertex(&self, index: usize) -> Option<u16> {
        self.vertex_piece_ranges()
            .iter()
            .find(|r| index >= r.start && index < r.start + r.count)
            .map(|r| r.bone)
    }

    /// Resolve the `(polygon_count, material_id)` pairs into draw ranges.
    ///
    /// Invisible groups (material id 0) keep their cursor span and come
    /// back with `visible == false`.
    pub fn material_ranges(&self) -> Vec<MaterialRange> {
        let mut cursor = 0usize;
        self.material_groups
            .iter()
            .map(|&(count, material_id)| {
                let range = MaterialRange {
                    material_id,
                    polygon_offset: cursor,
                    polygon_count: count as usize,
                    index_offset: cursor * 3,
                    index_count: count as usize * 3,
                    visible: material_id != 0,
                };
                cursor += count as usize;
                range
            })
            .collect()
    }

    /// Local-space bounding box.
    ///
    /// The stored corners are returned verbatim unless they are degenerate
    /// (zero extent) while vertices exist, in which case the box is
    /// recomputed from the dequantized vertices.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        if self.min != self.max || self.vertices.is_empty() {
            return (self.min, self.max);
        }
        let mut min = self.vertices[0];
        let mut max = self.vertices[0];
        for &v in &self.vertices[1..] {
            min = min.min(v);
            max = max.max(v);
        }
        (min, max)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }
}

/// 0x2D — mesh instance.
#[derive(Debug, Clone)]
pub struct MeshFragment {
    pub def_ref: i32,
    pub flags: u32,
}

impl MeshFragment {
    pub(crate) fn decode(reader: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            def_ref: reader.read_reference()?,
            flags: reader.read_u32()?,
        })
    }
}

fn read_vec3(reader: &mut FieldReader<'_>) -> Result<Vec3> {
    Ok(Vec3::new(
        reader.read_f32()?,
        reader.read_f32()?,
        reader.read_f32()?,
    ))
}

fn read_pairs(reader: &mut FieldReader<'_>, count: usize) -> Result<Vec<(u16, u16)>> {
    let mut pairs = Vec::with_capacity(count.min(reader.remaining() / 4));
    for _ in 0..count {
        let a = reader.read_u16()?;
        let b = reader.read_u16()?;
        pairs.push((a, b));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal 0x36 payload with the given arrays.
    pub(crate) fn mesh_payload(
        scale_exponent: u16,
        vertices: &[[i16; 3]],
        polygons: &[[u16; 4]],
        vertex_pieces: &[(u16, u16)],
        material_groups: &[(u16, u16)],
    ) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0u32.to_le_bytes()); // flags
        for r in [1i32, 0, 0, 0] {
            buf.extend_from_slice(&r.to_le_bytes()); // palette + unused refs
        }
        for f in [0.0f32; 3] {
            buf.extend_from_slice(&f.to_le_bytes()); // center
        }
        for r in [0u32; 3] {
            buf.extend_from_slice(&r.to_le_bytes()); // reserved
        }
        for f in [0.0f32; 7] {
            buf.extend_from_slice(&f.to_le_bytes()); // max_distance + min + max
        }
        let counts = [
            vertices.len() as u16,
            0, // texcoords
            0, // normals
            0, // colors
            polygons.len() as u16,
            vertex_pieces.len() as u16,
            material_groups.len() as u16,
            0, // vertex materials
            0, // meshops
            scale_exponent,
        ];
        for c in counts {
            buf.extend_from_slice(&c.to_le_bytes());
        }
        for v in vertices {
            for c in v {
                buf.extend_from_slice(&c.to_le_bytes());
            }
        }
        for p in polygons {
            for c in p {
                buf.extend_from_slice(&c.to_le_bytes());
            }
        }
        for &(a, b) in vertex_pieces.iter().chain(material_groups) {
            buf.extend_from_slice(&a.to_le_bytes());
            buf.extend_from_slice(&b.to_le_bytes());
        }
        buf
    }

    #[test]
    fn vertices_scale_by_exponent() {
        // 2^2 = 4: raw 8 becomes 2.0.
        let payload = mesh_payload(2, &[[8, -8, 0]], &[], &[], &[]);
        let mesh = MeshDefFragment::decode(&mut FieldReader::new(&payload)).unwrap();
        assert_eq!(mesh.vertices[0], Vec3::new(2.0, -2.0, 0.0));
    }

    #[test]
    fn vertex_pieces_claim_running_ranges() {
        let payload = mesh_payload(0, &[[0; 3]; 5], &[], &[(3, 7), (2, 9)], &[]);
        let mesh = MeshDefFragment::decode(&mut FieldReader::new(&payload)).unwrap();
        let ranges = mesh.vertex_piece_ranges();
        assert_eq!(
            ranges,
            vec![
                VertexPieceRange {
                    start: 0,
                    count: 3,
                    bone: 7
                },
                VertexPieceRange {
                    start: 3,
                    count: 2,
                    bone: 9
                },
            ]
        );
        assert_eq!(mesh.bone_of_vertex(2), Some(7));
        assert_eq!(mesh.bone_of_vertex(3), Some(9));
        assert_eq!(mesh.bone_of_vertex(5), None);
    }

    #[test]
    fn material_ranges_count_indices_and_flag_invisible() {
        let polygons = [[0u16, 0, 1, 2]; 5];
        let payload = mesh_payload(0, &[[0; 3]; 3], &polygons, &[], &[(2, 0), (3, 4)]);
        let mesh = MeshDefFragment::decode(&mut FieldReader::new(&payload)).unwrap();
        let ranges = mesh.material_ranges();
        assert_eq!(ranges.len(), 2);
        assert!(!ranges[0].visible);
        assert_eq!(ranges[0].index_count, 6);
        assert_eq!(ranges[1].index_offset, 6);
        assert_eq!(ranges[1].index_count, 9);
        assert_eq!(ranges[1].material_id, 4);
    }

    #[test]
    fn degenerate_bounds_recompute_from_vertices() {
        let payload = mesh_payload(0, &[[1, 2, 3], [-4, 0, 5]], &[], &[], &[]);
        let mesh = MeshDefFragment::decode(&mut FieldReader::new(&payload)).unwrap();
        let (min, max) = mesh.bounds();
        assert_eq!(min, Vec3::new(-4.0, 0.0, 3.0));
        assert_eq!(max, Vec3::new(1.0, 2.0, 5.0));
    }

    #[test]
    fn truncated_vertex_array_fails() {
        let mut payload = mesh_payload(0, &[[0; 3]], &[], &[], &[]);
        payload.truncate(payload.len() - 2);
        assert!(MeshDefFragment::decode(&mut FieldReader::new(&payload)).is_err());
    }
}
