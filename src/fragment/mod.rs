//! Fragment registry: kind tags, headers, and per-kind decode dispatch.
//!
//! # Identity rules
//!
//! Every record in a .wld container is a *fragment*: a 12-byte header
//! `{size: u32, kind: u32, name_ref: i32}` followed by `size - 4` payload
//! bytes (`size` is measured from immediately after `kind`, so the next
//! header starts at `header_start + 8 + size`).
//!
//! The kind tag set is closed and frozen; dispatch is a compile-time
//! `match` over [`FragmentKind`].  Tags outside the set decode as
//! [`FragmentBody::Generic`] — kind and name are kept, the payload is
//! skipped, and the record still occupies its file-order slot so that
//! positional references stay stable.

pub mod actor;
pub mod material;
pub mod mesh;
pub mod skeleton;
pub mod track;

use crate::error::{Result, WldError};
use crate::field::FieldReader;

pub use actor::{ActorAction, ActorDefFragment, ActorFragment};
pub use material::{
    BitmapNameFragment, MaterialDefFragment, MaterialPaletteFragment, SpriteDefFragment,
    SpriteFragment, TransparencyMode,
};
pub use mesh::{MaterialRange, MeshDefFragment, MeshFragment, VertexPieceRange};
pub use skeleton::{SkeletonDefFragment, SkeletonFragment, SkeletonNodeDef};
pub use track::{TrackDefFragment, TrackFragment};

// ── Kind tags ─────────────────────────────────────────────────────────────────

/// Closed set of fragment kinds this crate decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FragmentKind {
    /// 0x03 — bitmap filename list.
    BitmapName,
    /// 0x04 — sprite definition (texture frame set).
    SpriteDef,
    /// 0x05 — sprite instance.
    Sprite,
    /// 0x10 — hierarchical skeleton definition.
    SkeletonDef,
    /// 0x11 — skeleton instance.
    Skeleton,
    /// 0x12 — keyframe track definition.
    TrackDef,
    /// 0x13 — track instance.
    Track,
    /// 0x14 — actor definition.
    ActorDef,
    /// 0x15 — actor instance.
    Actor,
    /// 0x2D — mesh instance.
    Mesh,
    /// 0x30 — material definition.
    MaterialDef,
    /// 0x31 — material palette.
    MaterialPalette,
    /// 0x36 — mesh definition.
    MeshDef,
}

impl FragmentKind {
    /// Every known kind, in tag order.
    pub const ALL: [FragmentKind; 13] = [
        FragmentKind::BitmapName,
        FragmentKind::SpriteDef,
        FragmentKind::Sprite,
        FragmentKind::SkeletonDef,
        FragmentKind::Skeleton,
        FragmentKind::TrackDef,
        FragmentKind::Track,
        FragmentKind::ActorDef,
        FragmentKind::Actor,
        FragmentKind::Mesh,
        FragmentKind::MaterialDef,
        FragmentKind::MaterialPalette,
        FragmentKind::MeshDef,
    ];

    /// Resolve an on-disk kind tag.  `None` for tags outside the closed set.
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0x03 => Some(FragmentKind::BitmapName),
            0x04 => Some(FragmentKind::SpriteDef),
            0x05 => Some(FragmentKind::Sprite),
            0x10 => Some(FragmentKind::SkeletonDef),
            0x11 => Some(FragmentKind::Skeleton),
            0x12 => Some(FragmentKind::TrackDef),
            0x13 => Some(FragmentKind::Track),
            0x14 => Some(FragmentKind::ActorDef),
            0x15 => Some(FragmentKind::Actor),
            0x2D => Some(FragmentKind::Mesh),
            0x30 => Some(FragmentKind::MaterialDef),
            0x31 => Some(FragmentKind::MaterialPalette),
            0x36 => Some(FragmentKind::MeshDef),
            _ => None,
        }
    }

    /// The on-disk tag for this kind.
    pub fn tag(self) -> u32 {
        match self {
            FragmentKind::BitmapName => 0x03,
            FragmentKind::SpriteDef => 0x04,
            FragmentKind::Sprite => 0x05,
            FragmentKind::SkeletonDef => 0x10,
            FragmentKind::Skeleton => 0x11,
            FragmentKind::TrackDef => 0x12,
            FragmentKind::Track => 0x13,
            FragmentKind::ActorDef => 0x14,
            FragmentKind::Actor => 0x15,
            FragmentKind::Mesh => 0x2D,
            FragmentKind::MaterialDef => 0x30,
            FragmentKind::MaterialPalette => 0x31,
            FragmentKind::MeshDef => 0x36,
        }
    }

    /// Human-readable name (for diagnostics only — never parsed).
    pub fn name(self) -> &'static str {
        match self {
            FragmentKind::BitmapName => "bitmap-name",
            FragmentKind::SpriteDef => "sprite-def",
            FragmentKind::Sprite => "sprite",
            FragmentKind::SkeletonDef => "skeleton-def",
            FragmentKind::Skeleton => "skeleton",
            FragmentKind::TrackDef => "track-def",
            FragmentKind::Track => "track",
            FragmentKind::ActorDef => "actor-def",
            FragmentKind::Actor => "actor",
            FragmentKind::Mesh => "mesh",
            FragmentKind::MaterialDef => "material-def",
            FragmentKind::MaterialPalette => "material-palette",
            FragmentKind::MeshDef => "mesh-def",
        }
    }
}

// ── Fragment header ───────────────────────────────────────────────────────────

/// On-disk size of one fragment header.
pub const FRAGMENT_HEADER_SIZE: usize = 12;

#[derive(Debug, Clone, Copy)]
pub struct FragmentHeader {
    /// Byte count from immediately after `kind` to the end of the payload.
    pub size: u32,
    pub kind: u32,
    /// Encoded name reference (negative = string-table offset).
    pub name_ref: i32,
}

impl FragmentHeader {
    pub fn read(reader: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            size: reader.read_u32()?,
            kind: reader.read_u32()?,
            name_ref: reader.read_i32()?,
        })
    }

    /// Payload byte count after `name_ref`.  `size` covers `name_ref` plus
    /// the payload, so anything below 4 cannot describe a fragment.
    pub fn payload_len(&self) -> Result<usize> {
        (self.size as usize).checked_sub(4).ok_or_else(|| {
            WldError::StructuralCorruption(format!(
                "fragment header declares size {} (minimum 4)",
                self.size
            ))
        })
    }
}

// ── Decoded bodies ────────────────────────────────────────────────────────────

/// One decoded fragment payload.
#[derive(Debug, Clone)]
pub enum FragmentBody {
    BitmapName(BitmapNameFragment),
    SpriteDef(SpriteDefFragment),
    Sprite(SpriteFragment),
    SkeletonDef(SkeletonDefFragment),
    Skeleton(SkeletonFragment),
    TrackDef(TrackDefFragment),
    Track(TrackFragment),
    ActorDef(ActorDefFragment),
    Actor(ActorFragment),
    Mesh(MeshFragment),
    MaterialDef(MaterialDefFragment),
    MaterialPalette(MaterialPaletteFragment),
    MeshDef(MeshDefFragment),
    /// Kind outside the closed set: payload skipped, file-order slot kept.
    Generic,
}

impl FragmentBody {
    /// The kind this body decoded as; `None` for [`FragmentBody::Generic`].
    pub fn kind(&self) -> Option<FragmentKind> {
        Some(match self {
            FragmentBody::BitmapName(_) => FragmentKind::BitmapName,
            FragmentBody::SpriteDef(_) => FragmentKind::SpriteDef,
            FragmentBody::Sprite(_) => FragmentKind::Sprite,
            FragmentBody::SkeletonDef(_) => FragmentKind::SkeletonDef,
            FragmentBody::Skeleton(_) => FragmentKind::Skeleton,
            FragmentBody::TrackDef(_) => FragmentKind::TrackDef,
            FragmentBody::Track(_) => FragmentKind::Track,
            FragmentBody::ActorDef(_) => FragmentKind::ActorDef,
            FragmentBody::Actor(_) => FragmentKind::Actor,
            FragmentBody::Mesh(_) => FragmentKind::Mesh,
            FragmentBody::MaterialDef(_) => FragmentKind::MaterialDef,
            FragmentBody::MaterialPalette(_) => FragmentKind::MaterialPalette,
            FragmentBody::MeshDef(_) => FragmentKind::MeshDef,
            FragmentBody::Generic => return None,
        })
    }
}

/// Decode one payload by kind tag.
///
/// Unknown tags yield [`FragmentBody::Generic`] without touching the
/// payload; known tags that fail to decode abort the whole load (the
/// container wraps the error with the fragment's file-order index).
pub fn decode_body(kind: u32, payload: &[u8]) -> Result<FragmentBody> {
    let mut reader = FieldReader::new(payload);
    let body = match FragmentKind::from_tag(kind) {
        Some(FragmentKind::BitmapName) => {
            FragmentBody::BitmapName(BitmapNameFragment::decode(&mut reader)?)
        }
        Some(FragmentKind::SpriteDef) => {
            FragmentBody::SpriteDef(SpriteDefFragment::decode(&mut reader)?)
        }
        Some(FragmentKind::Sprite) => FragmentBody::Sprite(SpriteFragment::decode(&mut reader)?),
        Some(FragmentKind::SkeletonDef) => {
            FragmentBody::SkeletonDef(SkeletonDefFragment::decode(&mut reader)?)
        }
        Some(FragmentKind::Skeleton) => {
            FragmentBody::Skeleton(SkeletonFragment::decode(&mut reader)?)
        }
        Some(FragmentKind::TrackDef) => {
            FragmentBody::TrackDef(TrackDefFragment::decode(&mut reader)?)
        }
        Some(FragmentKind::Track) => FragmentBody::Track(TrackFragment::decode(&mut reader)?),
        Some(FragmentKind::ActorDef) => {
            FragmentBody::ActorDef(ActorDefFragment::decode(&mut reader)?)
        }
        Some(FragmentKind::Actor) => FragmentBody::Actor(ActorFragment::decode(&mut reader)?),
        Some(FragmentKind::Mesh) => FragmentBody::Mesh(MeshFragment::decode(&mut reader)?),
        Some(FragmentKind::MaterialDef) => {
            FragmentBody::MaterialDef(MaterialDefFragment::decode(&mut reader)?)
        }
        Some(FragmentKind::MaterialPalette) => {
            FragmentBody::MaterialPalette(MaterialPaletteFragment::decode(&mut reader)?)
        }
        Some(FragmentKind::MeshDef) => {
            FragmentBody::MeshDef(MeshDefFragment::decode(&mut reader)?)
        }
        None => FragmentBody::Generic,
    };
    Ok(body)
}

// ── Typed downcast ────────────────────────────────────────────────────────────

/// Narrowing from [`FragmentBody`] to one concrete fragment type.
///
/// The closed-enum substitute for virtual downcasts: narrowing returns
/// `None` on a kind mismatch instead of failing, and the container builds
/// its typed `fetch` on top of this.
pub trait FragmentVariant: Sized {
    const KIND: FragmentKind;

    fn from_body(body: &FragmentBody) -> Option<&Self>;
}

macro_rules! impl_fragment_variant {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl FragmentVariant for $ty {
                const KIND: FragmentKind = FragmentKind::$variant;

                fn from_body(body: &FragmentBody) -> Option<&Self> {
                    match body {
                        FragmentBody::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
            }
        )+
    };
}

impl_fragment_variant! {
    BitmapNameFragment => BitmapName,
    SpriteDefFragment => SpriteDef,
    SpriteFragment => Sprite,
    SkeletonDefFragment => SkeletonDef,
    SkeletonFragment => Skeleton,
    TrackDefFragment => TrackDef,
    TrackFragment => Track,
    ActorDefFragment => ActorDef,
    ActorFragment => Actor,
    MeshFragment => Mesh,
    MaterialDefFragment => MaterialDef,
    MaterialPaletteFragment => MaterialPalette,
    MeshDefFragment => MeshDef,
}
