use glam::{Quat, Vec3};
use proptest::prelude::*;

use wld::animation::{BoneTransform, FPS};
use wld::container::{MAGIC, VERSION_OLD};
use wld::fragment::{MaterialPaletteFragment, MeshDefFragment, TrackDefFragment};
use wld::manifest::Manifest;
use wld::skeleton::BIND_POSE;
use wld::{Ref, Skeleton, StringTable, WldContainer};

// ── Synthetic container builder ───────────────────────────────────────────────

struct ContainerBuilder {
    strings: Vec<u8>,
    fragments: Vec<(u32, i32, Vec<u8>)>,
}

impl ContainerBuilder {
    fn new() -> Self {
        Self {
            strings: vec![0],
            fragments: Vec::new(),
        }
    }

    /// Intern a string and return the (negative) reference encoding.
    fn add_string(&mut self, s: &str) -> i32 {
        let offset = self.strings.len();
        self.strings.extend_from_slice(s.as_bytes());
        self.strings.push(0);
        -(offset as i32)
    }

    /// Append a fragment and return its (positive, 1-based) reference.
    fn add_fragment(&mut self, kind: u32, name_ref: i32, payload: Vec<u8>) -> i32 {
        self.fragments.push((kind, name_ref, payload));
        self.fragments.len() as i32
    }

    fn build(&self) -> Vec<u8> {
        let encoded = wld::strings::decode(&self.strings); // scramble
        let mut data = Vec::new();
        for v in [
            MAGIC,
            VERSION_OLD,
            self.fragments.len() as u32,
            0,
            0,
            encoded.len() as u32,
            0,
        ] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        data.extend_from_slice(&encoded);
        for (kind, name_ref, payload) in &self.fragments {
            data.extend_from_slice(&(payload.len() as u32 + 4).to_le_bytes());
            data.extend_from_slice(&kind.to_le_bytes());
            data.extend_from_slice(&name_ref.to_le_bytes());
            data.extend_from_slice(payload);
        }
        data
    }
}

// ── Payload builders ──────────────────────────────────────────────────────────

fn track_def_payload(frames: &[[i16; 8]]) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&0u32.to_le_bytes());
    p.extend_from_slice(&(frames.len() as u32).to_le_bytes());
    for frame in frames {
        for v in frame {
            p.extend_from_slice(&v.to_le_bytes());
        }
    }
    p
}

/// One frame with identity rotation and zero translation (both sentinels).
const IDENTITY_FRAME: [i16; 8] = [0; 8];

fn track_instance_payload(def_ref: i32, sleep: Option<u32>) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&def_ref.to_le_bytes());
    p.extend_from_slice(&(sleep.is_some() as u32).to_le_bytes());
    if let Some(ms) = sleep {
        p.extend_from_slice(&ms.to_le_bytes());
    }
    p
}

fn skeleton_def_payload(nodes: &[(i32, i32, &[u32])]) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&0u32.to_le_bytes()); // flags
    p.extend_from_slice(&(nodes.len() as u32).to_le_bytes());
    p.extend_from_slice(&0i32.to_le_bytes()); // collision
    for (name_ref, track_ref, children) in nodes {
        p.extend_from_slice(&name_ref.to_le_bytes());
        p.extend_from_slice(&0u32.to_le_bytes());
        p.extend_from_slice(&track_ref.to_le_bytes());
        p.extend_from_slice(&0i32.to_le_bytes()); // sprite
        p.extend_from_slice(&(children.len() as u32).to_le_bytes());
        for c in *children {
            p.extend_from_slice(&c.to_le_bytes());
        }
    }
    p
}

fn material_def_payload(render_mode: u32, sprite_ref: i32) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&0u32.to_le_bytes());
    p.extend_from_slice(&render_mode.to_le_bytes());
    p.extend_from_slice(&0u32.to_le_bytes());
    p.extend_from_slice(&1.0f32.to_le_bytes());
    p.extend_from_slice(&0.75f32.to_le_bytes());
    p.extend_from_slice(&sprite_ref.to_le_bytes());
    p
}

fn palette_payload(material_refs: &[i32]) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&0u32.to_le_bytes());
    p.extend_from_slice(&(material_refs.len() as u32).to_le_bytes());
    for r in material_refs {
        p.extend_from_slice(&r.to_le_bytes());
    }
    p
}

#[allow(clippy::too_many_arguments)]
fn mesh_def_payload(
    palette_ref: i32,
    scale_exponent: u16,
    vertices: &[[i16; 3]],
    polygons: &[[u16; 4]],
    vertex_pieces: &[(u16, u16)],
    material_groups: &[(u16, u16)],
) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&0u32.to_le_bytes()); // flags
    p.extend_from_slice(&palette_ref.to_le_bytes());
    for r in [0i32; 3] {
        p.extend_from_slice(&r.to_le_bytes()); // animation/sprite/unknown refs
    }
    for f in [0.0f32; 3] {
        p.extend_from_slice(&f.to_le_bytes()); // center
    }
    for v in [0u32; 3] {
        p.extend_from_slice(&v.to_le_bytes()); // reserved
    }
    for f in [0.0f32; 7] {
        p.extend_from_slice(&f.to_le_bytes()); // max distance + min + max
    }
    for c in [
        vertices.len() as u16,
        0,
        0,
        0,
        polygons.len() as u16,
        vertex_pieces.len() as u16,
        material_groups.len() as u16,
        0,
        0,
        scale_exponent,
    ] {
        p.extend_from_slice(&c.to_le_bytes());
    }
    for v in vertices {
        for c in v {
            p.extend_from_slice(&c.to_le_bytes());
        }
    }
    for poly in polygons {
        for c in poly {
            p.extend_from_slice(&c.to_le_bytes());
        }
    }
    for &(a, b) in vertex_pieces.iter().chain(material_groups) {
        p.extend_from_slice(&a.to_le_bytes());
        p.extend_from_slice(&b.to_le_bytes());
    }
    p
}

/// One 3-vertex/1-triangle mesh plus a single-node rig with a 1-frame
/// identity bind pose — the smallest world that exercises every layer.
fn minimal_world() -> (Vec<u8>, usize, usize) {
    let mut b = ContainerBuilder::new();

    let track_name = b.add_string("HUMROOT_TRACK");
    let skel_name = b.add_string("HUM_HS_DEF");
    let mesh_name = b.add_string("HUM_DMSPRITEDEF");
    let mat_name = b.add_string("HUM0001_MDF");

    let track_def = b.add_fragment(0x12, track_name, track_def_payload(&[IDENTITY_FRAME]));
    let track = b.add_fragment(0x13, track_name, track_instance_payload(track_def, None));
    let skel = b.add_fragment(0x10, skel_name, skeleton_def_payload(&[(skel_name, track, &[])]));

    let material = b.add_fragment(0x30, mat_name, material_def_payload(0x01, 0));
    let palette = b.add_fragment(0x31, 0, palette_payload(&[material]));
    let mesh = b.add_fragment(
        0x36,
        mesh_name,
        mesh_def_payload(
            palette,
            0,
            &[[0, 0, 0], [1, 0, 0], [0, 1, 0]],
            &[[0, 0, 1, 2]],
            &[(3, 0)],
            &[(1, 1)],
        ),
    );

    (b.build(), skel as usize - 1, mesh as usize - 1)
}

// ── End-to-end ────────────────────────────────────────────────────────────────

#[test]
fn minimal_world_decodes_end_to_end() {
    let (data, skel_index, mesh_index) = minimal_world();
    let container = WldContainer::parse(&data).unwrap();
    assert_eq!(container.len(), 6);

    let mesh: &MeshDefFragment = container.fetch_at(mesh_index).unwrap();
    assert_eq!(mesh.vertex_count(), 3);
    assert_eq!(mesh.polygon_count(), 1);
    assert_eq!(mesh.polygons[0], [0, 1, 2]);

    let meshes: Vec<(usize, &MeshDefFragment)> = container.iter_kind().collect();
    assert_eq!(meshes.len(), 1);
    assert_eq!(meshes[0].0, mesh_index);

    let skeleton = Skeleton::from_container(&container, skel_index).unwrap();
    assert_eq!(skeleton.node_count(), 1);
    assert_eq!(skeleton.model_code.as_deref(), Some("HUM"));

    let pose = skeleton.pose_at_frame(BIND_POSE, 0.0).unwrap();
    assert_eq!(pose.len(), 1);
    assert_eq!(pose[0].rotation, Quat::IDENTITY);
    assert_eq!(pose[0].translation, Vec3::ZERO);
}

#[test]
fn animation_tracks_attach_and_pose() {
    let (data, skel_index, _) = minimal_world();

    // A second world carrying a walk cycle for the root bone.
    let mut b = ContainerBuilder::new();
    let track_name = b.add_string("HUMROOT_TRACK");
    let skel_name = b.add_string("HUM_HS_DEF");
    let walk_name = b.add_string("C05HUMROOT_TRACK");

    let track_def = b.add_fragment(0x12, track_name, track_def_payload(&[IDENTITY_FRAME]));
    let track = b.add_fragment(0x13, track_name, track_instance_payload(track_def, None));
    let skel = b.add_fragment(0x10, skel_name, skeleton_def_payload(&[(skel_name, track, &[])]));

    // Two frames: identity, then translation (1, 0, 0) at scale 256.
    let walk_def = b.add_fragment(
        0x12,
        walk_name,
        track_def_payload(&[IDENTITY_FRAME, [0, 0, 0, 0, 256, 0, 0, 256]]),
    );
    b.add_fragment(0x13, walk_name, track_instance_payload(walk_def, Some(100)));

    let container = WldContainer::parse(&b.build()).unwrap();
    let mut skeleton = Skeleton::from_container(&container, skel as usize - 1).unwrap();
    assert_eq!(skeleton.attach_container_tracks(&container), 1);

    let anim = &skeleton.animations["C05"];
    assert_eq!(anim.frame_count, 2);
    assert_eq!(anim.sleep, Some(100));

    let start = skeleton.pose_at_frame("C05", 0.0).unwrap();
    let mid = skeleton.pose_at_frame("C05", 0.5).unwrap();
    assert_eq!(start[0].translation, Vec3::ZERO);
    assert!((mid[0].translation - Vec3::new(0.5, 0.0, 0.0)).length() < 1e-5);

    // Wrap: sampling at frame_count equals sampling at zero.
    let wrapped = skeleton.pose_at_frame("C05", 2.0).unwrap();
    assert_eq!(start[0].translation, wrapped[0].translation);

    // Time periodicity at the fixed playback rate.
    let t0 = skeleton.pose_at_time("C05", 0.12).unwrap();
    let t1 = skeleton.pose_at_time("C05", 0.12 + 2.0 / FPS).unwrap();
    assert!((t0[0].translation - t1[0].translation).length() < 1e-4);

    // The original world (without the walk cycle) is untouched by all this.
    let plain = WldContainer::parse(&data).unwrap();
    let plain_skel = Skeleton::from_container(&plain, skel_index).unwrap();
    assert_eq!(plain_skel.animations.len(), 1);
}

#[test]
fn two_node_rig_composes_hierarchically() {
    let mut b = ContainerBuilder::new();
    let root_name = b.add_string("ELFROOT_TRACK");
    let chest_name = b.add_string("ELFCHEST_TRACK");
    let skel_name = b.add_string("ELF_HS_DEF");

    let root_def = b.add_fragment(0x12, root_name, track_def_payload(&[IDENTITY_FRAME]));
    let root = b.add_fragment(0x13, root_name, track_instance_payload(root_def, None));
    // Child local translation (1, 0, 0) at scale 256.
    let chest_def = b.add_fragment(
        0x12,
        chest_name,
        track_def_payload(&[[0, 0, 0, 0, 256, 0, 0, 256]]),
    );
    let chest = b.add_fragment(0x13, chest_name, track_instance_payload(chest_def, None));
    let skel = b.add_fragment(
        0x10,
        skel_name,
        skeleton_def_payload(&[(skel_name, root, &[1]), (chest_name, chest, &[])]),
    );

    let container = WldContainer::parse(&b.build()).unwrap();
    let mut skeleton = Skeleton::from_container(&container, skel as usize - 1).unwrap();

    let pose = skeleton.pose_at_frame(BIND_POSE, 0.0).unwrap();
    assert_eq!(pose[1].translation, Vec3::new(1.0, 0.0, 0.0));

    // Move the root and the child follows.
    skeleton.add_track(
        "P01",
        "P01ELFROOT_TRACK",
        vec![BoneTransform::new(
            Quat::IDENTITY,
            Vec3::new(2.0, 0.0, 0.0),
        )],
        None,
    );
    let pose = skeleton.pose_at_frame("P01", 0.0).unwrap();
    assert_eq!(pose[0].translation, Vec3::new(2.0, 0.0, 0.0));
    assert_eq!(pose[1].translation, Vec3::new(3.0, 0.0, 0.0));
}

#[test]
fn cyclic_skeleton_is_rejected() {
    let mut b = ContainerBuilder::new();
    let name = b.add_string("BUG_HS_DEF");
    // Node 0 and node 1 each name the other as a child.
    let skel = b.add_fragment(
        0x10,
        name,
        skeleton_def_payload(&[(name, 0, &[1]), (name, 0, &[0])]),
    );
    let container = WldContainer::parse(&b.build()).unwrap();
    assert!(Skeleton::from_container(&container, skel as usize - 1).is_err());
}

// ── Reference resolution ──────────────────────────────────────────────────────

#[test]
fn reference_resolution_matches_encoding_rules() {
    let (data, _, mesh_index) = minimal_world();
    let container = WldContainer::parse(&data).unwrap();

    assert_eq!(container.resolve(0), Ref::Null);

    // Positional: 1-based onto the global file-order list.
    let n = container.len() as i32;
    for k in 1..=n {
        assert_eq!(container.resolve(k), Ref::ByIndex(k as usize - 1));
    }
    assert_eq!(container.resolve(n + 1), Ref::Unresolved);

    // Named: negated string-table byte offsets.
    assert_eq!(container.resolve(-1), Ref::Named("HUMROOT_TRACK".into()));
    assert_eq!(container.resolve(-(1 << 20)), Ref::Unresolved);

    // Name references chase to the fragment carrying that name.
    let by_name = container.resolve_index(-(("HUMROOT_TRACK\0HUM_HS_DEF\0".len() + 1) as i32));
    assert_eq!(by_name, container.index_of_name("HUM_DMSPRITEDEF"));
    assert_eq!(by_name, Some(mesh_index));
}

#[test]
fn draw_ranges_apply_palette_visibility() {
    let mut b = ContainerBuilder::new();
    let visible = b.add_fragment(0x30, 0, material_def_payload(0x01, 0));
    let invisible = b.add_fragment(0x30, 0, material_def_payload(0x00, 0));
    let palette = b.add_fragment(0x31, 0, palette_payload(&[visible, invisible]));
    let mesh = b.add_fragment(
        0x36,
        0,
        mesh_def_payload(
            palette,
            0,
            &[[0, 0, 0], [1, 0, 0], [0, 1, 0]],
            &[[0, 0, 1, 2], [0, 0, 2, 1], [0, 1, 2, 0]],
            &[],
            &[(1, 0), (1, 1), (1, 2)],
        ),
    );

    let container = WldContainer::parse(&b.build()).unwrap();
    let mesh: &MeshDefFragment = container.fetch_at(mesh as usize - 1).unwrap();
    let palette: &MaterialPaletteFragment = container.fetch(mesh.material_palette_ref).unwrap();
    assert_eq!(palette.len(), 2);

    let ranges = container.draw_ranges(mesh);
    assert_eq!(ranges.len(), 3);
    // Group 1: the id-0 sentinel — invisible, still occupying cursor space.
    assert!(!ranges[0].visible);
    // Group 2: palette slot 0, render mode 1 — drawn.
    assert!(ranges[1].visible);
    assert_eq!(ranges[1].index_offset, 3);
    // Group 3: palette slot 1, render mode 0 — suppressed by the palette.
    assert!(!ranges[2].visible);
    assert_eq!(ranges[2].index_offset, 6);
}

#[test]
fn quantized_rotations_decode_to_unit_norm() {
    let mut b = ContainerBuilder::new();
    let frames = [
        [16384, 2000, -1000, 500, 0, 0, 0, 0],
        [-20000, 12000, 7000, -3000, 0, 0, 0, 0],
        IDENTITY_FRAME,
    ];
    let def = b.add_fragment(0x12, 0, track_def_payload(&frames));
    let container = WldContainer::parse(&b.build()).unwrap();
    let def: &TrackDefFragment = container.fetch_at(def as usize - 1).unwrap();
    for (raw, frame) in frames.iter().zip(&def.frames) {
        if raw[0] == 0 {
            assert_eq!(frame.rotation, Quat::IDENTITY);
        } else {
            assert!((frame.rotation.length() - 1.0).abs() < 1e-5);
        }
    }
}

// ── Manifest ──────────────────────────────────────────────────────────────────

#[test]
fn manifest_round_trips_through_json() {
    let (data, _, _) = minimal_world();
    let container = WldContainer::parse(&data).unwrap();
    let manifest = Manifest::from_container(&container);

    assert_eq!(manifest.fragment_count, 6);
    assert_eq!(manifest.kind_counts["mesh-def"], 1);
    assert_eq!(manifest.kind_counts["skeleton-def"], 1);
    assert_eq!(manifest.meshes.len(), 1);
    assert_eq!(manifest.meshes[0].vertices, 3);
    assert_eq!(manifest.skeletons[0].nodes, 1);

    let bytes = manifest.to_bytes().unwrap();
    let restored = Manifest::from_bytes(&bytes).unwrap();
    assert_eq!(restored, manifest);
}

// ── Properties ────────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn xor_codec_is_self_inverse(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let twice = wld::strings::decode(&wld::strings::decode(&data));
        prop_assert_eq!(twice, data);
    }

    #[test]
    fn string_lookup_never_panics(
        data in proptest::collection::vec(any::<u8>(), 0..128),
        offset in any::<usize>(),
    ) {
        let table = StringTable::from_decoded(data.clone());
        let result = table.lookup(offset);
        if offset >= data.len() {
            prop_assert!(result.is_none());
        } else {
            let text = result.unwrap();
            prop_assert!(!text.contains('\0'));
        }
    }

    #[test]
    fn quantized_rotation_norm_property(
        w in 1i16..=i16::MAX, x in any::<i16>(), y in any::<i16>(), z in any::<i16>(),
    ) {
        let t = BoneTransform::from_quantized([w, x, y, z], [0, 0, 0], 0);
        prop_assert!((t.rotation.length() - 1.0).abs() < 1e-5);
    }
}
